//! Active-account tracking
//!
//! The tracker owns the account generation counter. Every switch of the
//! active account bumps it and invalidates the view cache while the identity
//! lock is held, so a ticket can never be issued for an account whose views
//! have not been invalidated yet.

use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tokio::sync::{mpsc, watch};
use tracing::{info, warn};

use crate::core::SyncError;
use crate::domain::{Account, WalletProvider};

use super::view_cache::ViewCache;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityStatus {
    /// No wallet provider exists; never retried
    Unavailable,
    Disconnected,
    Active(Account),
}

impl IdentityStatus {
    pub fn account(&self) -> Option<Account> {
        match self {
            IdentityStatus::Active(account) => Some(*account),
            _ => None,
        }
    }
}

/// Account context an operation was started in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionTicket {
    pub account: Account,
    pub generation: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountChange {
    pub previous: Option<Account>,
    pub current: Option<Account>,
    pub generation: u64,
}

impl AccountChange {
    pub fn switched(&self) -> bool {
        self.previous != self.current
    }

    pub fn ticket(&self) -> Option<SessionTicket> {
        self.current.map(|account| SessionTicket {
            account,
            generation: self.generation,
        })
    }
}

#[derive(Debug)]
struct IdentityInner {
    status: IdentityStatus,
    generation: u64,
}

pub struct IdentityTracker {
    wallet: Option<Arc<dyn WalletProvider>>,
    cache: Arc<ViewCache>,
    inner: RwLock<IdentityInner>,
    changes: watch::Sender<IdentityStatus>,
}

impl IdentityTracker {
    pub fn new(wallet: Option<Arc<dyn WalletProvider>>, cache: Arc<ViewCache>) -> Self {
        let status = if wallet.is_some() {
            IdentityStatus::Disconnected
        } else {
            IdentityStatus::Unavailable
        };
        cache.invalidate(0, status, Vec::new());
        let (changes, _) = watch::channel(status);
        Self {
            wallet,
            cache,
            inner: RwLock::new(IdentityInner {
                status,
                generation: 0,
            }),
            changes,
        }
    }

    pub fn wallet(&self) -> Result<&Arc<dyn WalletProvider>, SyncError> {
        self.wallet.as_ref().ok_or(SyncError::ProviderUnavailable)
    }

    pub fn status(&self) -> IdentityStatus {
        self.read().status
    }

    pub fn current_account(&self) -> Option<Account> {
        self.read().status.account()
    }

    /// Ticket for the active account, if any
    pub fn ticket(&self) -> Option<SessionTicket> {
        let inner = self.read();
        inner.status.account().map(|account| SessionTicket {
            account,
            generation: inner.generation,
        })
    }

    pub fn is_current(&self, ticket: &SessionTicket) -> bool {
        let inner = self.read();
        inner.generation == ticket.generation && inner.status.account() == Some(ticket.account)
    }

    /// Subscription point for account changes
    pub fn on_account_changed(&self) -> watch::Receiver<IdentityStatus> {
        self.changes.subscribe()
    }

    /// Ask the wallet for account access and adopt the answer
    pub async fn request_accounts(&self) -> Result<AccountChange, SyncError> {
        let wallet = self.wallet()?;
        let accounts = wallet
            .request_accounts()
            .await
            .map_err(SyncError::from_connect)?;
        Ok(self.apply_accounts(accounts))
    }

    /// The wallet's `accountsChanged` stream
    pub fn account_notifications(&self) -> Result<mpsc::Receiver<Vec<Account>>, SyncError> {
        Ok(self.wallet()?.subscribe_accounts())
    }

    /// Adopt a wallet account list. Only the first entry is considered active.
    pub fn apply_accounts(&self, accounts: Vec<Account>) -> AccountChange {
        let mut inner = self.write();
        let previous = inner.status.account();
        let current = accounts.first().copied();

        if inner.status == IdentityStatus::Unavailable {
            warn!("ignoring account list from an unavailable wallet provider");
            return AccountChange {
                previous,
                current: previous,
                generation: inner.generation,
            };
        }

        if previous == current {
            self.cache.update_accounts(accounts);
            return AccountChange {
                previous,
                current,
                generation: inner.generation,
            };
        }

        inner.generation += 1;
        inner.status = match current {
            Some(account) => IdentityStatus::Active(account),
            None => IdentityStatus::Disconnected,
        };
        self.cache
            .invalidate(inner.generation, inner.status, accounts);
        self.changes.send_replace(inner.status);

        info!(
            previous = ?previous,
            current = ?current,
            generation = inner.generation,
            "active account changed"
        );

        AccountChange {
            previous,
            current,
            generation: inner.generation,
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, IdentityInner> {
        self.inner.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, IdentityInner> {
        self.inner.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{PendingTx, ProviderError};
    use alloy::primitives::Address;
    use alloy::rpc::types::TransactionRequest;

    struct FixedWallet {
        accounts: Result<Vec<Account>, ProviderError>,
    }

    #[async_trait::async_trait]
    impl WalletProvider for FixedWallet {
        async fn request_accounts(&self) -> Result<Vec<Account>, ProviderError> {
            self.accounts.clone()
        }

        fn subscribe_accounts(&self) -> mpsc::Receiver<Vec<Account>> {
            mpsc::channel(1).1
        }

        async fn send_transaction(
            &self,
            _request: TransactionRequest,
        ) -> Result<PendingTx, ProviderError> {
            Err(ProviderError::Rejected("read-only".into()))
        }
    }

    fn tracker(accounts: Result<Vec<Account>, ProviderError>) -> (IdentityTracker, Arc<ViewCache>) {
        let cache = Arc::new(ViewCache::new());
        let wallet: Arc<dyn WalletProvider> = Arc::new(FixedWallet { accounts });
        (IdentityTracker::new(Some(wallet), Arc::clone(&cache)), cache)
    }

    #[test]
    fn test_missing_wallet_is_unavailable() {
        let cache = Arc::new(ViewCache::new());
        let tracker = IdentityTracker::new(None, Arc::clone(&cache));
        assert_eq!(tracker.status(), IdentityStatus::Unavailable);
        assert_eq!(cache.get().identity, IdentityStatus::Unavailable);
        assert_eq!(
            tracker.account_notifications().unwrap_err(),
            SyncError::ProviderUnavailable
        );

        let change = tracker.apply_accounts(vec![Address::repeat_byte(1)]);
        assert!(!change.switched());
        assert_eq!(tracker.status(), IdentityStatus::Unavailable);
    }

    #[test]
    fn test_first_account_is_active() {
        let (tracker, cache) = tracker(Ok(Vec::new()));
        let a = Address::repeat_byte(1);
        let b = Address::repeat_byte(2);

        let change = tracker.apply_accounts(vec![a, b]);
        assert!(change.switched());
        assert_eq!(tracker.current_account(), Some(a));
        assert_eq!(change.generation, 1);
        assert_eq!(cache.get().active_account, Some(a));
        assert_eq!(cache.get().accounts, vec![a, b]);
    }

    #[test]
    fn test_same_account_keeps_generation() {
        let (tracker, _cache) = tracker(Ok(Vec::new()));
        let a = Address::repeat_byte(1);
        tracker.apply_accounts(vec![a]);
        let ticket = tracker.ticket().unwrap();

        let change = tracker.apply_accounts(vec![a, Address::repeat_byte(9)]);
        assert!(!change.switched());
        assert!(tracker.is_current(&ticket));
    }

    #[test]
    fn test_switch_invalidates_old_ticket() {
        let (tracker, cache) = tracker(Ok(Vec::new()));
        let mut changes = tracker.on_account_changed();
        tracker.apply_accounts(vec![Address::repeat_byte(1)]);
        let old = tracker.ticket().unwrap();

        tracker.apply_accounts(vec![Address::repeat_byte(2)]);
        assert!(!tracker.is_current(&old));
        assert_eq!(cache.generation(), 2);
        assert!(changes.has_changed().unwrap());
        assert_eq!(
            *changes.borrow_and_update(),
            IdentityStatus::Active(Address::repeat_byte(2))
        );

        let change = tracker.apply_accounts(Vec::new());
        assert_eq!(change.current, None);
        assert_eq!(tracker.status(), IdentityStatus::Disconnected);
        assert!(tracker.ticket().is_none());
    }

    #[tokio::test]
    async fn test_request_accounts_rejection() {
        let (tracker, _cache) = tracker(Err(ProviderError::Rejected(
            "User rejected the request.".into(),
        )));
        let err = tracker.request_accounts().await.unwrap_err();
        assert_eq!(
            err,
            SyncError::ConnectionRejected("User rejected the request.".into())
        );
        assert_eq!(tracker.status(), IdentityStatus::Disconnected);
    }

    #[tokio::test]
    async fn test_request_accounts_connects() {
        let a = Address::repeat_byte(7);
        let (tracker, _cache) = tracker(Ok(vec![a]));
        let change = tracker.request_accounts().await.unwrap();
        assert_eq!(change.ticket().map(|t| t.account), Some(a));
    }
}
