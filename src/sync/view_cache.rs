//! Snapshot store for the derived registry views
//!
//! All mutation goes through [`ViewCache::replace`] (a refresh) or
//! [`ViewCache::invalidate`] (an account switch). Each mutation builds a new
//! immutable [`SyncState`] and swaps it in under the lock, so readers never
//! observe a leaderboard from one refresh next to a log from another.

use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Local};
use thiserror::Error;
use tokio::sync::watch;

use crate::domain::{latest_first, Account, LeaderboardEntry, LogRecord, StudentRecord};

use super::identity::{IdentityStatus, SessionTicket};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusLevel {
    Info,
    Warn,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusMessage {
    pub text: String,
    pub level: StatusLevel,
}

impl StatusMessage {
    pub fn new(level: StatusLevel, text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            level,
        }
    }
}

/// The three derived views, always swapped together
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Views {
    pub leaderboard: Vec<LeaderboardEntry>,
    /// Backend (chronological) order
    pub log: Vec<LogRecord>,
    pub registration: StudentRecord,
}

/// Immutable snapshot of everything the renderer may show
#[derive(Debug, Clone, PartialEq)]
pub struct SyncState {
    pub identity: IdentityStatus,
    /// Accounts last reported by the wallet; the first one is active
    pub accounts: Vec<Account>,
    pub active_account: Option<Account>,
    /// Account generation this snapshot belongs to
    pub generation: u64,
    pub is_registered: bool,
    pub student: Option<StudentRecord>,
    pub leaderboard: Vec<LeaderboardEntry>,
    /// Backend order, as fetched
    pub log: Vec<LogRecord>,
    /// Display order, derived from `log` by the refresh that produced it
    pub log_latest_first: Vec<LogRecord>,
    pub status: Option<StatusMessage>,
    pub version: u64,
    pub refreshed_at: Option<DateTime<Local>>,
}

impl Default for SyncState {
    fn default() -> Self {
        Self {
            identity: IdentityStatus::Disconnected,
            accounts: Vec::new(),
            active_account: None,
            generation: 0,
            is_registered: false,
            student: None,
            leaderboard: Vec::new(),
            log: Vec::new(),
            log_latest_first: Vec::new(),
            status: None,
            version: 0,
            refreshed_at: None,
        }
    }
}

impl SyncState {
    pub fn is_connected(&self) -> bool {
        self.active_account.is_some()
    }

    /// Whether views for the active account have been loaded at least once
    pub fn is_loaded(&self) -> bool {
        self.student.is_some()
    }

    pub fn student_name(&self) -> Option<&str> {
        self.student
            .as_ref()
            .map(|s| s.name.as_str())
            .filter(|name| !name.is_empty())
    }

    pub fn log_entry(&self, index: usize) -> Option<&LogRecord> {
        self.log.iter().find(|entry| entry.index == index)
    }

    pub fn can_register(&self, name_input: &str) -> bool {
        self.is_connected() && self.is_loaded() && !self.is_registered && !name_input.trim().is_empty()
    }

    pub fn can_submit(&self) -> bool {
        self.is_connected() && self.is_registered
    }

    /// Client-side mirror of the backend's verification policy; the backend
    /// remains the authority.
    pub fn can_verify(&self, entry: &LogRecord) -> bool {
        match self.active_account {
            Some(account) => self.is_registered && entry.student != account,
            None => false,
        }
    }
}

/// Why a refresh result was refused
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum StaleResult {
    #[error("result for {account} (generation {generation}) arrived after an account switch")]
    Replaced { account: Account, generation: u64 },
    #[error("refresh {sequence} for {account} was overtaken by refresh {applied}")]
    Overtaken {
        account: Account,
        sequence: u64,
        applied: u64,
    },
}

#[derive(Debug)]
struct CacheInner {
    generation: u64,
    /// Sequence number of the last refresh swapped in
    applied_sequence: u64,
    state: Arc<SyncState>,
}

#[derive(Debug)]
pub struct ViewCache {
    inner: RwLock<CacheInner>,
    changes: watch::Sender<u64>,
}

impl Default for ViewCache {
    fn default() -> Self {
        Self::new()
    }
}

impl ViewCache {
    pub fn new() -> Self {
        let (changes, _) = watch::channel(0);
        Self {
            inner: RwLock::new(CacheInner {
                generation: 0,
                applied_sequence: 0,
                state: Arc::new(SyncState::default()),
            }),
            changes,
        }
    }

    /// Current snapshot
    pub fn get(&self) -> Arc<SyncState> {
        Arc::clone(&self.read().state)
    }

    pub fn generation(&self) -> u64 {
        self.read().generation
    }

    /// Receives the snapshot version after every mutation
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.changes.subscribe()
    }

    /// Whether a refresh numbered `sequence` has been overtaken by a later
    /// one that already landed
    pub fn is_overtaken(&self, sequence: u64) -> bool {
        sequence < self.read().applied_sequence
    }

    /// Swap in freshly fetched views for `ticket`'s account.
    ///
    /// `sequence` is taken before the reads are issued. Refuses if the
    /// account generation moved on since the ticket was issued, or if a
    /// refresh that started later has already been applied.
    pub fn replace(
        &self,
        ticket: &SessionTicket,
        sequence: u64,
        views: Views,
    ) -> Result<u64, StaleResult> {
        let mut inner = self.write();
        if inner.generation != ticket.generation
            || inner.state.active_account != Some(ticket.account)
        {
            return Err(StaleResult::Replaced {
                account: ticket.account,
                generation: ticket.generation,
            });
        }
        if sequence < inner.applied_sequence {
            return Err(StaleResult::Overtaken {
                account: ticket.account,
                sequence,
                applied: inner.applied_sequence,
            });
        }
        inner.applied_sequence = sequence;

        let Views {
            leaderboard,
            log,
            registration,
        } = views;
        let previous = &inner.state;
        let next = SyncState {
            identity: previous.identity,
            accounts: previous.accounts.clone(),
            active_account: previous.active_account,
            generation: inner.generation,
            is_registered: registration.is_registered(),
            student: Some(registration),
            leaderboard,
            log_latest_first: latest_first(&log),
            log,
            status: previous.status.clone(),
            version: previous.version + 1,
            refreshed_at: Some(Local::now()),
        };
        Ok(self.swap(&mut inner, next))
    }

    /// Drop every view of the previous account and adopt a new identity
    pub(crate) fn invalidate(
        &self,
        generation: u64,
        identity: IdentityStatus,
        accounts: Vec<Account>,
    ) -> u64 {
        let mut inner = self.write();
        inner.generation = generation;
        let next = SyncState {
            identity,
            active_account: match identity {
                IdentityStatus::Active(account) => Some(account),
                _ => None,
            },
            accounts,
            generation,
            status: inner.state.status.clone(),
            version: inner.state.version + 1,
            ..SyncState::default()
        };
        self.swap(&mut inner, next)
    }

    /// Record a new account list whose active account did not change
    pub(crate) fn update_accounts(&self, accounts: Vec<Account>) {
        let mut inner = self.write();
        if inner.state.accounts == accounts {
            return;
        }
        let mut next = SyncState::clone(&inner.state);
        next.accounts = accounts;
        next.version += 1;
        self.swap(&mut inner, next);
    }

    /// Set the status line.
    ///
    /// With a ticket the message is dropped when it belongs to a replaced
    /// account context. Returns whether the message was applied.
    pub fn set_status(&self, ticket: Option<&SessionTicket>, status: StatusMessage) -> bool {
        let mut inner = self.write();
        if let Some(ticket) = ticket {
            if inner.generation != ticket.generation {
                return false;
            }
        }
        if inner.state.status.as_ref() == Some(&status) {
            return true;
        }
        let mut next = SyncState::clone(&inner.state);
        next.status = Some(status);
        next.version += 1;
        self.swap(&mut inner, next);
        true
    }

    fn swap(&self, inner: &mut CacheInner, next: SyncState) -> u64 {
        let version = next.version;
        inner.state = Arc::new(next);
        self.changes.send_replace(version);
        version
    }

    fn read(&self) -> RwLockReadGuard<'_, CacheInner> {
        self.inner.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, CacheInner> {
        self.inner.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
