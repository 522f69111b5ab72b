//! Top-level sync controller
//!
//! The orchestrator is the only caller of the registry's read operations. It
//! refreshes on first account acquisition, on every account notification and
//! after every successful action.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use alloy::primitives::Address;
use futures::future::try_join3;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::core::{SyncError, ValidationError};
use crate::domain::{Account, LedgerReader, WalletProvider};

use super::identity::{AccountChange, IdentityTracker, SessionTicket};
use super::registry::RegistryClient;
use super::view_cache::{StatusLevel, StatusMessage, SyncState, ViewCache, Views};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    Applied { version: u64 },
    /// The account changed, or a later refresh landed, while the reads were
    /// in flight
    Discarded,
}

struct Shared {
    cache: Arc<ViewCache>,
    identity: IdentityTracker,
    registry: RegistryClient,
    refresh_sequence: AtomicU64,
}

#[derive(Clone)]
pub struct SyncOrchestrator {
    shared: Arc<Shared>,
}

impl SyncOrchestrator {
    pub fn new(
        contract: Address,
        reader: Arc<dyn LedgerReader>,
        wallet: Option<Arc<dyn WalletProvider>>,
    ) -> Self {
        let cache = Arc::new(ViewCache::new());
        let identity = IdentityTracker::new(wallet.clone(), Arc::clone(&cache));
        let registry = RegistryClient::new(contract, reader, wallet);
        if identity.wallet().is_err() {
            cache.set_status(
                None,
                StatusMessage::new(StatusLevel::Error, SyncError::ProviderUnavailable.to_string()),
            );
        }
        Self {
            shared: Arc::new(Shared {
                cache,
                identity,
                registry,
                refresh_sequence: AtomicU64::new(0),
            }),
        }
    }

    /// Current immutable snapshot
    pub fn state(&self) -> Arc<SyncState> {
        self.shared.cache.get()
    }

    /// Snapshot version notifications
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.shared.cache.subscribe()
    }

    pub fn identity(&self) -> &IdentityTracker {
        &self.shared.identity
    }

    pub fn registry(&self) -> &RegistryClient {
        &self.shared.registry
    }

    /// Set the status line; ticketed messages are dropped once stale
    pub fn report(&self, ticket: Option<&SessionTicket>, level: StatusLevel, text: impl Into<String>) {
        let text = text.into();
        if !self
            .shared
            .cache
            .set_status(ticket, StatusMessage::new(level, text.clone()))
        {
            debug!(%text, "dropping status for a replaced account");
        }
    }

    /// Request wallet access and load the views for the acquired account
    pub async fn connect(&self) -> Result<Option<RefreshOutcome>, SyncError> {
        let change = match self.identity().request_accounts().await {
            Ok(change) => change,
            Err(err) => {
                warn!(error = %err, "wallet connection failed");
                self.report(None, StatusLevel::Error, err.to_string());
                return Err(err);
            }
        };
        let Some(ticket) = change.ticket() else {
            self.report(None, StatusLevel::Warn, "The wallet reported no accounts");
            return Ok(None);
        };
        info!(
            account = %ticket.account,
            generation = ticket.generation,
            endpoint = %self.registry().endpoint_name(),
            contract = %self.registry().contract(),
            "wallet connected"
        );
        self.refresh_for(&ticket).await.map(Some)
    }

    /// Adopt an `accountsChanged` notification without waiting for the
    /// follow-up refresh
    pub fn apply_accounts(&self, accounts: Vec<Account>) -> AccountChange {
        let change = self.identity().apply_accounts(accounts);
        if change.switched() && change.current.is_none() {
            self.report(None, StatusLevel::Warn, "Wallet disconnected");
        }
        change
    }

    /// Adopt an `accountsChanged` notification and refresh for the new
    /// active account
    pub async fn on_accounts_changed(
        &self,
        accounts: Vec<Account>,
    ) -> Result<Option<RefreshOutcome>, SyncError> {
        let change = self.apply_accounts(accounts);
        match change.ticket() {
            Some(ticket) => self.refresh_for(&ticket).await.map(Some),
            None => Ok(None),
        }
    }

    /// Drain the wallet's account notifications until the wallet goes away.
    ///
    /// Each refresh runs as its own task so a slow refresh for an old account
    /// never delays adopting the next switch.
    pub async fn listen_for_account_changes(self, mut notifications: mpsc::Receiver<Vec<Account>>) {
        while let Some(accounts) = notifications.recv().await {
            let change = self.apply_accounts(accounts);
            let Some(ticket) = change.ticket() else {
                continue;
            };
            let sync = self.clone();
            tokio::spawn(async move {
                if let Err(err) = sync.refresh_for(&ticket).await {
                    debug!(error = %err, "refresh after account change failed");
                }
            });
        }
        debug!("wallet account notifications closed");
    }

    /// Ask the wallet to make `account` active; the change arrives as a
    /// regular notification
    pub fn switch_account(&self, account: Account) -> Result<(), SyncError> {
        let wallet = self.identity().wallet()?;
        wallet
            .select_account(account)
            .map_err(SyncError::from_connect)
            .inspect_err(|err| self.report(None, StatusLevel::Warn, err.to_string()))
    }

    /// User-triggered refresh, e.g. after a failed read
    pub async fn refresh(&self) -> Result<RefreshOutcome, SyncError> {
        let Some(ticket) = self.identity().ticket() else {
            let err = SyncError::from(ValidationError::NotConnected);
            self.report(None, StatusLevel::Warn, err.to_string());
            return Err(err);
        };
        let outcome = self.refresh_for(&ticket).await?;
        if matches!(outcome, RefreshOutcome::Applied { .. }) {
            self.report(Some(&ticket), StatusLevel::Info, "Registry views up to date");
        }
        Ok(outcome)
    }

    /// Re-fetch leaderboard, log and registration for `ticket` and swap them
    /// in together. On any read failure the previous snapshot stays.
    pub async fn refresh_for(&self, ticket: &SessionTicket) -> Result<RefreshOutcome, SyncError> {
        let sequence = self.shared.refresh_sequence.fetch_add(1, Ordering::SeqCst) + 1;
        let registry = self.registry();
        let reads = try_join3(
            registry.fetch_leaderboard(),
            registry.fetch_log(),
            registry.fetch_registration(ticket.account),
        )
        .await;

        let (leaderboard, log, registration) = match reads {
            Ok(views) => views,
            Err(_) if !self.identity().is_current(ticket) => {
                debug!(account = %ticket.account, "discarding failed refresh for a replaced account");
                return Ok(RefreshOutcome::Discarded);
            }
            Err(_) if self.shared.cache.is_overtaken(sequence) => {
                debug!(account = %ticket.account, sequence, "discarding failed refresh overtaken by a newer one");
                return Ok(RefreshOutcome::Discarded);
            }
            Err(err) => {
                warn!(account = %ticket.account, error = %err, "refresh failed");
                self.report(Some(ticket), StatusLevel::Error, err.to_string());
                return Err(err);
            }
        };

        let views = Views {
            leaderboard,
            log,
            registration,
        };
        match self.shared.cache.replace(ticket, sequence, views) {
            Ok(version) => {
                debug!(account = %ticket.account, sequence, version, "views refreshed");
                Ok(RefreshOutcome::Applied { version })
            }
            Err(stale) => {
                info!(%stale, "discarding stale refresh");
                Ok(RefreshOutcome::Discarded)
            }
        }
    }
}
