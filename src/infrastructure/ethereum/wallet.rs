//! Node-managed wallet
//!
//! The connected node holds the keys (`eth_accounts` / `eth_sendTransaction`),
//! the way a dev node or an unlocked client does. Account changes are picked
//! up by polling and surfaced as `accountsChanged`-style notifications.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use alloy::providers::PendingTransactionError;
use alloy::rpc::types::TransactionRequest;
use futures::FutureExt;
use tokio::sync::{mpsc, Notify};
use tracing::{debug, info, warn};

use crate::domain::{short_address, Account, Finalized, PendingTx, ProviderError, WalletProvider};

use super::contract::describe_event;
use super::provider::{classify, AlloyProvider};

const NOTIFICATION_BUFFER: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WalletSettings {
    pub poll_interval: Duration,
    pub confirmations: u64,
    /// `None` waits for the receipt indefinitely
    pub timeout: Option<Duration>,
}

impl Default for WalletSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(1000),
            confirmations: 1,
            timeout: None,
        }
    }
}

pub struct NodeWallet {
    provider: Arc<AlloyProvider>,
    settings: WalletSettings,
    selected: Arc<Mutex<Option<Account>>>,
    known: Arc<Mutex<Vec<Account>>>,
    nudge: Arc<Notify>,
}

impl NodeWallet {
    pub fn new(provider: Arc<AlloyProvider>, settings: WalletSettings) -> Self {
        Self {
            provider,
            settings,
            selected: Arc::new(Mutex::new(None)),
            known: Arc::new(Mutex::new(Vec::new())),
            nudge: Arc::new(Notify::new()),
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Put the selected account first, keeping the node's order otherwise
pub fn order_accounts(mut accounts: Vec<Account>, selected: Option<Account>) -> Vec<Account> {
    if let Some(selected) = selected {
        if let Some(position) = accounts.iter().position(|account| *account == selected) {
            let account = accounts.remove(position);
            accounts.insert(0, account);
        }
    }
    accounts
}

#[async_trait::async_trait]
impl WalletProvider for NodeWallet {
    async fn request_accounts(&self) -> Result<Vec<Account>, ProviderError> {
        let accounts = self.provider.accounts().await?;
        let accounts = order_accounts(accounts, *lock(&self.selected));
        *lock(&self.known) = accounts.clone();
        Ok(accounts)
    }

    fn subscribe_accounts(&self) -> mpsc::Receiver<Vec<Account>> {
        let (tx, rx) = mpsc::channel(NOTIFICATION_BUFFER);
        let provider = Arc::clone(&self.provider);
        let selected = Arc::clone(&self.selected);
        let known = Arc::clone(&self.known);
        let nudge = Arc::clone(&self.nudge);
        let poll_interval = self.settings.poll_interval;

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(poll_interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            let mut last: Option<Vec<Account>> = None;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {}
                    _ = nudge.notified() => {}
                }

                let accounts = match provider.accounts().await {
                    Ok(accounts) => order_accounts(accounts, *lock(&selected)),
                    Err(err) => {
                        debug!(error = %err, "account poll failed");
                        continue;
                    }
                };
                *lock(&known) = accounts.clone();

                // The first poll only records a baseline
                let changed = last.as_ref().is_some_and(|prev| *prev != accounts);
                last = Some(accounts.clone());
                if changed && tx.send(accounts).await.is_err() {
                    break;
                }
            }
            debug!("account polling stopped");
        });

        rx
    }

    async fn send_transaction(&self, request: TransactionRequest) -> Result<PendingTx, ProviderError> {
        let pending = self.provider.send_transaction(request).await?;
        let tx_hash = *pending.tx_hash();
        info!(%tx_hash, "transaction broadcast");

        let WalletSettings {
            confirmations,
            timeout,
            ..
        } = self.settings;
        let confirmation = async move {
            let receipt = pending
                .with_required_confirmations(confirmations)
                .with_timeout(timeout)
                .get_receipt()
                .await
                .map_err(|err| pending_error(&err))?;
            if !receipt.status() {
                warn!(%tx_hash, "transaction reverted");
                return Err(ProviderError::Rejected(format!(
                    "transaction {tx_hash} reverted"
                )));
            }
            for log in receipt.inner.logs() {
                if let Some(event) = describe_event(log.data()) {
                    debug!(%tx_hash, %event, "registry event");
                }
            }
            Ok(Finalized {
                tx_hash,
                block_number: receipt.block_number,
            })
        }
        .boxed();

        Ok(PendingTx::new(tx_hash, confirmation))
    }

    fn select_account(&self, account: Account) -> Result<(), ProviderError> {
        if !lock(&self.known).contains(&account) {
            return Err(ProviderError::Rejected(format!(
                "account {} is not managed by the node",
                short_address(&account)
            )));
        }
        *lock(&self.selected) = Some(account);
        self.nudge.notify_one();
        Ok(())
    }
}

fn pending_error(err: &PendingTransactionError) -> ProviderError {
    match err {
        PendingTransactionError::TransportError(err) => classify(err),
        other => ProviderError::Transport(other.to_string()),
    }
}
