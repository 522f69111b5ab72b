//! Boundaries to the ledger node and the wallet
//!
//! The sync core only talks to the outside world through these traits;
//! `infrastructure::ethereum` provides the alloy implementations.

use std::fmt;

use alloy::primitives::{Bytes, TxHash};
use alloy::rpc::types::TransactionRequest;
use futures::future::BoxFuture;
use thiserror::Error;
use tokio::sync::mpsc;

use super::registry::Account;

/// Failure reported by a node or wallet boundary
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProviderError {
    /// No wallet/node is reachable at all
    #[error("wallet provider unavailable")]
    Unavailable,
    /// The request was refused: user declined, node refused to sign, or the
    /// transaction reverted. Carries the provider's message verbatim.
    #[error("{0}")]
    Rejected(String),
    /// Transport or decoding failure
    #[error("{0}")]
    Transport(String),
}

/// Receipt summary of a finalized transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Finalized {
    pub tx_hash: TxHash,
    pub block_number: Option<u64>,
}

/// Handle to a broadcast transaction.
///
/// Awaiting [`PendingTx::finalized`] is the only signal that the mutation is
/// visible to reads.
pub struct PendingTx {
    tx_hash: TxHash,
    confirmation: BoxFuture<'static, Result<Finalized, ProviderError>>,
}

impl PendingTx {
    pub fn new(
        tx_hash: TxHash,
        confirmation: BoxFuture<'static, Result<Finalized, ProviderError>>,
    ) -> Self {
        Self {
            tx_hash,
            confirmation,
        }
    }

    pub fn tx_hash(&self) -> TxHash {
        self.tx_hash
    }

    pub async fn finalized(self) -> Result<Finalized, ProviderError> {
        self.confirmation.await
    }
}

impl fmt::Debug for PendingTx {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingTx")
            .field("tx_hash", &self.tx_hash)
            .finish_non_exhaustive()
    }
}

/// Read-only access to contract state (`eth_call`)
#[async_trait::async_trait]
pub trait LedgerReader: Send + Sync + 'static {
    async fn call(&self, request: TransactionRequest) -> Result<Bytes, ProviderError>;

    /// Endpoint display name
    fn endpoint_name(&self) -> String;
}

/// Account source and transaction signer
#[async_trait::async_trait]
pub trait WalletProvider: Send + Sync + 'static {
    /// Ask the wallet for access; the first account is the active one
    async fn request_accounts(&self) -> Result<Vec<Account>, ProviderError>;

    /// Stream of `accountsChanged` notifications
    fn subscribe_accounts(&self) -> mpsc::Receiver<Vec<Account>>;

    /// Sign and broadcast; resolves once the node accepted the transaction
    async fn send_transaction(&self, request: TransactionRequest)
        -> Result<PendingTx, ProviderError>;

    /// Make `account` the active (first reported) account, if the wallet
    /// supports switching from the client side
    fn select_account(&self, _account: Account) -> Result<(), ProviderError> {
        Err(ProviderError::Rejected(
            "account switching is controlled by the wallet".into(),
        ))
    }
}
