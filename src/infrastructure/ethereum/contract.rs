//! ABI bindings for the attendance registry contract

use alloy::primitives::LogData;
use alloy_sol_types::{sol, SolEvent};

use crate::domain::short_address;

sol! {
    interface IAttendanceRegistry {
        #[derive(Debug, PartialEq, Eq)]
        struct AttendanceEntry {
            address student;
            uint256 timestamp;
            uint8 status;
            uint256 verifiersCount;
            string logMessage;
        }

        function registerStudent(string name) external;
        function submitAttendance() external;
        function verifyAttendance(address studentAddress, uint256 logIndex) external;

        function getTop3Students() external view returns (string[] names, uint256[] percentages);
        function getAttendanceLog() external view returns (AttendanceEntry[] logs);
        function students(address student) external view returns (
            string name,
            uint256 totalAttendance,
            uint256 totalLateOrAbsent,
            uint256 totalChecks
        );

        event StudentRegistered(address studentAddress, string name);
        event AttendanceSubmitted(address studentAddress, uint8 status, string message);
        event AttendanceVerified(address studentAddress, uint256 logIndex, address verifier);
    }
}

use IAttendanceRegistry::{AttendanceSubmitted, AttendanceVerified, StudentRegistered};

/// One-line summary of a registry event emitted by a mined transaction
pub fn describe_event(data: &LogData) -> Option<String> {
    if let Ok(event) = StudentRegistered::decode_log_data(data) {
        return Some(format!(
            "{} registered as '{}'",
            short_address(&event.studentAddress),
            event.name
        ));
    }
    if let Ok(event) = AttendanceSubmitted::decode_log_data(data) {
        return Some(format!(
            "{} submitted attendance (status {}): {}",
            short_address(&event.studentAddress),
            event.status,
            event.message
        ));
    }
    if let Ok(event) = AttendanceVerified::decode_log_data(data) {
        return Some(format!(
            "{} verified entry #{} of {}",
            short_address(&event.verifier),
            event.logIndex,
            short_address(&event.studentAddress)
        ));
    }
    None
}

#[cfg(test)]
mod tests {
    use super::IAttendanceRegistry::*;
    use super::describe_event;
    use alloy::primitives::{Address, LogData, U256};
    use alloy_sol_types::{SolCall, SolEvent};

    #[test]
    fn test_selectors_match_deployed_abi() {
        assert_eq!(registerStudentCall::SIGNATURE, "registerStudent(string)");
        assert_eq!(submitAttendanceCall::SIGNATURE, "submitAttendance()");
        assert_eq!(
            verifyAttendanceCall::SIGNATURE,
            "verifyAttendance(address,uint256)"
        );
        assert_eq!(getTop3StudentsCall::SIGNATURE, "getTop3Students()");
        assert_eq!(getAttendanceLogCall::SIGNATURE, "getAttendanceLog()");
        assert_eq!(studentsCall::SIGNATURE, "students(address)");
    }

    #[test]
    fn test_event_signatures() {
        assert_eq!(StudentRegistered::SIGNATURE, "StudentRegistered(address,string)");
        assert_eq!(
            AttendanceSubmitted::SIGNATURE,
            "AttendanceSubmitted(address,uint8,string)"
        );
        assert_eq!(
            AttendanceVerified::SIGNATURE,
            "AttendanceVerified(address,uint256,address)"
        );
    }

    #[test]
    fn test_describe_registry_events() {
        let student = Address::repeat_byte(0xa1);
        let registered = StudentRegistered {
            studentAddress: student,
            name: "Kim".into(),
        };
        let text = describe_event(&registered.encode_log_data()).unwrap();
        assert!(text.ends_with("registered as 'Kim'"));

        let verified = AttendanceVerified {
            studentAddress: student,
            logIndex: U256::from(4),
            verifier: Address::repeat_byte(0xb2),
        };
        let text = describe_event(&verified.encode_log_data()).unwrap();
        assert!(text.contains("verified entry #4"));

        assert_eq!(describe_event(&LogData::default()), None);
    }
}
