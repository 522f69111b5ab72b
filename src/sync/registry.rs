//! Typed façade over the registry contract
//!
//! Holds handles only: every call encodes a request, hands it to the ledger
//! or the wallet, and shapes the answer into domain types.

use std::sync::Arc;

use alloy::primitives::{Address, Bytes, U256};
use alloy::rpc::types::TransactionRequest;
use alloy_sol_types::SolCall;
use tracing::debug;

use crate::core::SyncError;
use crate::domain::{
    Account, AttendanceStatus, LeaderboardEntry, LedgerReader, LogRecord, Percentage, PendingTx,
    StudentRecord, WalletProvider,
};
use crate::infrastructure::ethereum::contract::IAttendanceRegistry::{
    getAttendanceLogCall, getTop3StudentsCall, registerStudentCall, studentsCall,
    submitAttendanceCall, verifyAttendanceCall, AttendanceEntry,
};

#[derive(Clone)]
pub struct RegistryClient {
    contract: Address,
    reader: Arc<dyn LedgerReader>,
    wallet: Option<Arc<dyn WalletProvider>>,
}

impl RegistryClient {
    pub fn new(
        contract: Address,
        reader: Arc<dyn LedgerReader>,
        wallet: Option<Arc<dyn WalletProvider>>,
    ) -> Self {
        Self {
            contract,
            reader,
            wallet,
        }
    }

    pub fn contract(&self) -> Address {
        self.contract
    }

    pub fn endpoint_name(&self) -> String {
        self.reader.endpoint_name()
    }

    // === Reads ===

    /// An unregistered account comes back with an empty name, not an error
    pub async fn fetch_registration(&self, account: Account) -> Result<StudentRecord, SyncError> {
        let record = self
            .read("registration", studentsCall { student: account })
            .await?;
        Ok(StudentRecord {
            name: record.name,
            total_attendance: record.totalAttendance.saturating_to(),
            total_late_or_absent: record.totalLateOrAbsent.saturating_to(),
            total_checks: record.totalChecks.saturating_to(),
        })
    }

    /// Ranked entries in backend order; may be empty
    pub async fn fetch_leaderboard(&self) -> Result<Vec<LeaderboardEntry>, SyncError> {
        let ranking = self.read("leaderboard", getTop3StudentsCall {}).await?;
        leaderboard_from(ranking.names, ranking.percentages)
    }

    /// Full log in backend (chronological) order
    pub async fn fetch_log(&self) -> Result<Vec<LogRecord>, SyncError> {
        let entries = self.read("attendance log", getAttendanceLogCall {}).await?;
        Ok(log_from(entries))
    }

    // === Writes ===

    pub async fn register(&self, from: Account, name: &str) -> Result<PendingTx, SyncError> {
        self.write(
            from,
            registerStudentCall {
                name: name.to_string(),
            },
        )
        .await
    }

    pub async fn submit_attendance(&self, from: Account) -> Result<PendingTx, SyncError> {
        self.write(from, submitAttendanceCall {}).await
    }

    pub async fn verify_attendance(
        &self,
        from: Account,
        student: Account,
        log_index: usize,
    ) -> Result<PendingTx, SyncError> {
        self.write(
            from,
            verifyAttendanceCall {
                studentAddress: student,
                logIndex: U256::from(log_index),
            },
        )
        .await
    }

    async fn read<C: SolCall>(&self, what: &str, call: C) -> Result<C::Return, SyncError> {
        let request = TransactionRequest::default()
            .to(self.contract)
            .input(Bytes::from(call.abi_encode()).into());
        let data = self
            .reader
            .call(request)
            .await
            .map_err(|err| SyncError::from_read(what, err))?;
        C::abi_decode_returns(&data)
            .map_err(|err| SyncError::ReadFailed(format!("{what}: malformed response: {err}")))
    }

    async fn write<C: SolCall>(&self, from: Account, call: C) -> Result<PendingTx, SyncError> {
        let wallet = self.wallet.as_ref().ok_or(SyncError::ProviderUnavailable)?;
        let request = TransactionRequest::default()
            .from(from)
            .to(self.contract)
            .input(Bytes::from(call.abi_encode()).into());
        let pending = wallet
            .send_transaction(request)
            .await
            .map_err(SyncError::from_write)?;
        debug!(
            method = C::SIGNATURE,
            from = %from,
            tx = %pending.tx_hash(),
            "transaction broadcast"
        );
        Ok(pending)
    }
}

fn leaderboard_from(
    names: Vec<String>,
    percentages: Vec<U256>,
) -> Result<Vec<LeaderboardEntry>, SyncError> {
    if names.len() != percentages.len() {
        return Err(SyncError::ReadFailed(format!(
            "leaderboard: {} names but {} percentages",
            names.len(),
            percentages.len()
        )));
    }
    Ok(names
        .into_iter()
        .zip(percentages)
        .enumerate()
        .map(|(position, (name, raw))| LeaderboardEntry {
            rank: position + 1,
            name,
            percentage: Percentage::from_raw(raw.saturating_to()),
        })
        .collect())
}

fn log_from(entries: Vec<AttendanceEntry>) -> Vec<LogRecord> {
    entries
        .into_iter()
        .enumerate()
        .map(|(index, entry)| LogRecord {
            index,
            student: entry.student,
            timestamp: entry.timestamp.saturating_to(),
            status: AttendanceStatus::from_raw(entry.status),
            verifiers_count: entry.verifiersCount.saturating_to(),
            message: entry.logMessage,
        })
        .collect()
}
