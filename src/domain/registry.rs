//! Attendance registry data model
//!
//! Everything here is derived from backend query results. The client never
//! mutates a record, it only re-reads and re-derives display forms.

use std::fmt;

use alloy::primitives::Address;
use chrono::{DateTime, Local, TimeZone};

/// Wallet account identity
pub type Account = Address;

/// Divisor applied to the backend's ×10000 percentage to get a 2-decimal percent
pub const PERCENT_DIVISOR: u64 = 100;

/// Raw status value the backend uses for an on-time submission
pub const STATUS_ON_TIME: u8 = 1;

/// Registration record as stored by the backend
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StudentRecord {
    /// Empty means the account never registered
    pub name: String,
    pub total_attendance: u64,
    pub total_late_or_absent: u64,
    pub total_checks: u64,
}

impl StudentRecord {
    /// The backend's not-registered sentinel is an empty name
    pub fn is_registered(&self) -> bool {
        !self.name.is_empty()
    }
}

/// Attendance percentage as transmitted by the backend (scaled by 10000)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct Percentage {
    raw: u64,
}

impl Percentage {
    pub fn from_raw(raw: u64) -> Self {
        Self { raw }
    }

}

impl fmt::Display for Percentage {
    /// Always exactly two decimal digits, e.g. 9550 -> "95.50"
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{:02}",
            self.raw / PERCENT_DIVISOR,
            self.raw % PERCENT_DIVISOR
        )
    }
}

/// One row of the ranked leaderboard
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaderboardEntry {
    /// 1-based position in backend order
    pub rank: usize,
    pub name: String,
    pub percentage: Percentage,
}

impl LeaderboardEntry {
    pub fn display(&self) -> String {
        format!("{}. {}: {}%", self.rank, self.name, self.percentage)
    }
}

/// Outcome recorded for one attendance submission
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttendanceStatus {
    OnTime,
    /// Any non-1 value; the raw byte is kept for diagnostics
    LateOrAbsent(u8),
}

impl AttendanceStatus {
    pub fn from_raw(raw: u8) -> Self {
        if raw == STATUS_ON_TIME {
            AttendanceStatus::OnTime
        } else {
            AttendanceStatus::LateOrAbsent(raw)
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            AttendanceStatus::OnTime => "on-time",
            AttendanceStatus::LateOrAbsent(_) => "late/absent",
        }
    }
}

/// Entry of the backend's append-only attendance log
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    /// Position in the backend log, used as the verification key
    pub index: usize,
    pub student: Account,
    /// Seconds since the Unix epoch
    pub timestamp: u64,
    pub status: AttendanceStatus,
    pub verifiers_count: u64,
    pub message: String,
}

impl LogRecord {
    pub fn timestamp_millis(&self) -> u64 {
        self.timestamp.saturating_mul(1000)
    }

    pub fn recorded_at(&self) -> Option<DateTime<Local>> {
        let millis = i64::try_from(self.timestamp_millis()).ok()?;
        Local.timestamp_millis_opt(millis).single()
    }

    pub fn recorded_at_display(&self) -> String {
        self.recorded_at()
            .map(|at| at.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| format!("t={}", self.timestamp))
    }
}

/// Display order for the log feed: latest entry first.
///
/// Pure; callers re-derive it from the chronological sequence on every fetch.
pub fn latest_first(log: &[LogRecord]) -> Vec<LogRecord> {
    log.iter().rev().cloned().collect()
}

/// `0x1234...abcd` form of an address
pub fn short_address(account: &Account) -> String {
    let full = account.to_string();
    if full.len() <= 10 {
        return full;
    }
    format!("{}...{}", &full[..6], &full[full.len() - 4..])
}
