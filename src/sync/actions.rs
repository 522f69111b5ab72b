//! User-triggered mutations: register, submit attendance, verify attendance
//!
//! Each action walks `Idle -> Validating -> Pending -> {Succeeded, Failed}`.
//! Its side effects are one write, one wait for finalization and one
//! refresh, in that order.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use alloy::primitives::TxHash;
use tracing::{info, warn};

use crate::core::{ActionKind, SyncError, ValidationError};
use crate::domain::{Account, Finalized};

use super::identity::SessionTicket;
use super::orchestrator::{RefreshOutcome, SyncOrchestrator};
use super::view_cache::{StatusLevel, SyncState};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionPhase {
    Idle,
    Validating,
    Pending,
    Succeeded,
    Failed,
}

impl ActionPhase {
    pub fn is_in_flight(&self) -> bool {
        matches!(self, ActionPhase::Validating | ActionPhase::Pending)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionReport {
    pub kind: ActionKind,
    pub tx_hash: TxHash,
    pub block_number: Option<u64>,
    pub refresh: RefreshOutcome,
}

/// A validated mutation, ready to be sent
#[derive(Debug, Clone, PartialEq, Eq)]
enum Mutation {
    Register { name: String },
    Submit,
    Verify { student: Account, log_index: usize },
}

impl Mutation {
    fn pending_text(&self) -> String {
        match self {
            Mutation::Register { .. } => "Registering…".into(),
            Mutation::Submit => "Submitting attendance…".into(),
            Mutation::Verify { .. } => "Verifying attendance…".into(),
        }
    }

    fn success_text(&self) -> String {
        match self {
            Mutation::Register { name } => format!("'{name}' registered"),
            Mutation::Submit => "Attendance submitted, awaiting peer verification".into(),
            Mutation::Verify { .. } => "Attendance verified".into(),
        }
    }
}

type Phases = Arc<Mutex<HashMap<ActionKind, ActionPhase>>>;

/// Marks one action kind as in flight; resets it to idle if dropped before
/// being settled (e.g. the task was cancelled)
struct InFlight {
    phases: Phases,
    kind: ActionKind,
    settled: bool,
}

impl InFlight {
    fn advance(&self, phase: ActionPhase) {
        lock(&self.phases).insert(self.kind, phase);
    }

    fn settle(mut self, phase: ActionPhase) {
        self.advance(phase);
        self.settled = true;
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        if !self.settled {
            lock(&self.phases).insert(self.kind, ActionPhase::Idle);
        }
    }
}

fn lock(phases: &Phases) -> MutexGuard<'_, HashMap<ActionKind, ActionPhase>> {
    phases.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[derive(Clone)]
pub struct ActionController {
    sync: SyncOrchestrator,
    phases: Phases,
}

impl ActionController {
    pub fn new(sync: SyncOrchestrator) -> Self {
        Self {
            sync,
            phases: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn phase(&self, kind: ActionKind) -> ActionPhase {
        lock(&self.phases)
            .get(&kind)
            .copied()
            .unwrap_or(ActionPhase::Idle)
    }

    pub async fn register(&self, name: &str) -> Result<ActionReport, SyncError> {
        let name = name.trim().to_string();
        self.execute(ActionKind::Register, move |state| {
            if name.is_empty() {
                return Err(ValidationError::EmptyName);
            }
            if !state.is_loaded() {
                return Err(ValidationError::ViewsNotLoaded);
            }
            if state.is_registered {
                return Err(ValidationError::AlreadyRegistered);
            }
            Ok(Mutation::Register { name })
        })
        .await
    }

    pub async fn submit_attendance(&self) -> Result<ActionReport, SyncError> {
        self.execute(ActionKind::Submit, |state| {
            if !state.is_registered {
                return Err(ValidationError::NotRegistered);
            }
            Ok(Mutation::Submit)
        })
        .await
    }

    /// Verify someone else's log entry, addressed by its backend index
    pub async fn verify_attendance(&self, log_index: usize) -> Result<ActionReport, SyncError> {
        self.execute(ActionKind::Verify, move |state| {
            if !state.is_registered {
                return Err(ValidationError::NotRegistered);
            }
            let entry = state
                .log_entry(log_index)
                .ok_or(ValidationError::UnknownLogEntry(log_index))?;
            if state.active_account == Some(entry.student) {
                return Err(ValidationError::SelfVerification);
            }
            Ok(Mutation::Verify {
                student: entry.student,
                log_index,
            })
        })
        .await
    }

    fn begin(&self, kind: ActionKind) -> Result<InFlight, ValidationError> {
        let mut phases = lock(&self.phases);
        if phases.get(&kind).is_some_and(ActionPhase::is_in_flight) {
            return Err(ValidationError::AlreadyPending(kind));
        }
        phases.insert(kind, ActionPhase::Validating);
        Ok(InFlight {
            phases: Arc::clone(&self.phases),
            kind,
            settled: false,
        })
    }

    async fn execute<F>(&self, kind: ActionKind, prepare: F) -> Result<ActionReport, SyncError>
    where
        F: FnOnce(&SyncState) -> Result<Mutation, ValidationError>,
    {
        let guard = match self.begin(kind) {
            Ok(guard) => guard,
            Err(err) => {
                info!(?kind, "rejecting duplicate action while one is pending");
                return Err(err.into());
            }
        };

        let (ticket, mutation) = match self.validate(prepare) {
            Ok(validated) => validated,
            Err((ticket, err)) => {
                guard.settle(ActionPhase::Failed);
                self.sync
                    .report(ticket.as_ref(), StatusLevel::Warn, err.to_string());
                return Err(err.into());
            }
        };

        guard.advance(ActionPhase::Pending);
        self.sync
            .report(Some(&ticket), StatusLevel::Info, mutation.pending_text());
        info!(?kind, account = %ticket.account, "action pending");

        let finalized = match self.send_and_wait(&ticket, &mutation).await {
            Ok(finalized) => finalized,
            Err(err) => {
                guard.settle(ActionPhase::Failed);
                warn!(?kind, error = %err, "action failed");
                self.sync.report(
                    Some(&ticket),
                    StatusLevel::Error,
                    format!("{} failed: {err}", kind.title()),
                );
                return Err(err);
            }
        };

        let refresh = self.sync.refresh_for(&ticket).await;
        guard.settle(ActionPhase::Succeeded);
        info!(?kind, tx = %finalized.tx_hash, "action finalized");

        match refresh {
            Ok(refresh) => {
                if refresh != RefreshOutcome::Discarded {
                    self.sync
                        .report(Some(&ticket), StatusLevel::Info, mutation.success_text());
                }
                Ok(ActionReport {
                    kind,
                    tx_hash: finalized.tx_hash,
                    block_number: finalized.block_number,
                    refresh,
                })
            }
            Err(err) => {
                self.sync.report(
                    Some(&ticket),
                    StatusLevel::Warn,
                    format!("{} ({err})", mutation.success_text()),
                );
                Err(err)
            }
        }
    }

    fn validate<F>(
        &self,
        prepare: F,
    ) -> Result<(SessionTicket, Mutation), (Option<SessionTicket>, ValidationError)>
    where
        F: FnOnce(&SyncState) -> Result<Mutation, ValidationError>,
    {
        let ticket = self
            .sync
            .identity()
            .ticket()
            .ok_or((None, ValidationError::NotConnected))?;
        let state = self.sync.state();
        if state.generation != ticket.generation {
            return Err((Some(ticket), ValidationError::NotConnected));
        }
        let mutation = prepare(&state).map_err(|err| (Some(ticket), err))?;
        Ok((ticket, mutation))
    }

    /// One write, then wait for finalization
    async fn send_and_wait(
        &self,
        ticket: &SessionTicket,
        mutation: &Mutation,
    ) -> Result<Finalized, SyncError> {
        let registry = self.sync.registry();
        let pending = match mutation {
            Mutation::Register { name } => registry.register(ticket.account, name).await?,
            Mutation::Submit => registry.submit_attendance(ticket.account).await?,
            Mutation::Verify {
                student,
                log_index,
            } => {
                registry
                    .verify_attendance(ticket.account, *student, *log_index)
                    .await?
            }
        };
        pending.finalized().await.map_err(SyncError::from_write)
    }
}
