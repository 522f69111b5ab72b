//! Domain layer - registry data model and the ports the sync core depends on

pub mod ports;
pub mod registry;

pub use ports::{Finalized, LedgerReader, PendingTx, ProviderError, WalletProvider};
pub use registry::{
    latest_first, short_address, Account, AttendanceStatus, LeaderboardEntry, LogRecord,
    Percentage, StudentRecord,
};
