//! Error taxonomy of the sync core
//!
//! Every error is caught where the async operation was awaited and turned
//! into the status line; none of these reach the renderer as a failure.

use thiserror::Error;

use crate::domain::ProviderError;

/// User-triggered mutation kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ActionKind {
    Register,
    Submit,
    Verify,
}

impl ActionKind {
    pub fn title(&self) -> &'static str {
        match self {
            ActionKind::Register => "Registration",
            ActionKind::Submit => "Attendance submission",
            ActionKind::Verify => "Verification",
        }
    }
}

/// Client-side precondition that was not met; nothing was sent
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("connect a wallet first")]
    NotConnected,
    #[error("registry views are still loading")]
    ViewsNotLoaded,
    #[error("enter a name to register")]
    EmptyName,
    #[error("this account is already registered")]
    AlreadyRegistered,
    #[error("register this account first")]
    NotRegistered,
    #[error("you cannot verify your own attendance")]
    SelfVerification,
    #[error("log entry #{0} is not in the current view")]
    UnknownLogEntry(usize),
    #[error("{} is already in progress", .0.title())]
    AlreadyPending(ActionKind),
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SyncError {
    /// No wallet provider present; permanent for this session
    #[error("no wallet provider found; install or start a wallet-enabled node")]
    ProviderUnavailable,
    /// User declined wallet access; may retry
    #[error("wallet connection failed: {0}")]
    ConnectionRejected(String),
    #[error("{0}")]
    ValidationFailed(#[from] ValidationError),
    /// Signing declined or reverted; message is the provider's, verbatim
    #[error("{0}")]
    TransactionRejected(String),
    /// A registration/leaderboard/log read failed; the cached views are kept
    #[error("failed to load registry data: {0}")]
    ReadFailed(String),
}

impl SyncError {
    pub fn is_permanent(&self) -> bool {
        matches!(self, SyncError::ProviderUnavailable)
    }

    pub(crate) fn from_write(err: ProviderError) -> Self {
        match err {
            ProviderError::Unavailable => SyncError::ProviderUnavailable,
            ProviderError::Rejected(message) | ProviderError::Transport(message) => {
                SyncError::TransactionRejected(message)
            }
        }
    }

    pub(crate) fn from_read(what: &str, err: ProviderError) -> Self {
        match err {
            ProviderError::Unavailable => SyncError::ProviderUnavailable,
            other => SyncError::ReadFailed(format!("{what}: {other}")),
        }
    }

    pub(crate) fn from_connect(err: ProviderError) -> Self {
        match err {
            ProviderError::Unavailable => SyncError::ProviderUnavailable,
            ProviderError::Rejected(message) | ProviderError::Transport(message) => {
                SyncError::ConnectionRejected(message)
            }
        }
    }
}
