//! Runtime bridge - connects sync TUI thread with async Tokio runtime
//!
//! The terminal thread never awaits anything: it sends [`RuntimeCommand`]s and
//! drains [`RuntimeEvent`]s between frames. The worker thread owns the Tokio
//! runtime and the sync core.

use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread;

use anyhow::Context;
use tokio::runtime::Runtime;

use crate::domain::Account;
use crate::infrastructure::runtime::worker::{run_async_worker, WorkerSettings};
use crate::sync::SyncState;

/// Commands sent from the TUI to the async worker
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuntimeCommand {
    /// Request wallet access and load the views
    Connect,
    /// Ask the wallet to make another of its accounts active
    SwitchAccount { account: Account },
    Register { name: String },
    SubmitAttendance,
    /// Verify the log entry at this backend index
    VerifyAttendance { log_index: usize },
    /// Re-fetch all views for the active account
    Refresh,
    /// Shutdown the worker
    Shutdown,
}

/// Events sent from the async worker to the TUI
#[derive(Debug, Clone)]
pub enum RuntimeEvent {
    /// The worker picked an endpoint and is ready for commands
    Ready {
        endpoint: String,
        contract: String,
        node: Option<String>,
    },
    /// A new snapshot was published
    State(Arc<SyncState>),
    /// Error outside the sync core (startup, worker exit)
    Error { message: String },
}

/// Bridge between sync TUI thread and async Tokio runtime
pub struct RuntimeBridge {
    cmd_tx: Sender<RuntimeCommand>,
    evt_rx: Receiver<RuntimeEvent>,
}

impl RuntimeBridge {
    /// Start the worker thread for the given settings
    pub fn new(settings: WorkerSettings) -> anyhow::Result<Self> {
        let (cmd_tx, cmd_rx) = mpsc::channel::<RuntimeCommand>();
        let (evt_tx, evt_rx) = mpsc::channel::<RuntimeEvent>();

        let rt = Runtime::new().context("Failed to create Tokio runtime")?;
        thread::Builder::new()
            .name("rollcall-runtime".into())
            .spawn(move || {
                rt.block_on(async {
                    if let Err(err) = run_async_worker(settings, cmd_rx, evt_tx.clone()).await {
                        let _ = evt_tx.send(RuntimeEvent::Error {
                            message: format!("Worker exited: {:#}", err),
                        });
                    }
                });
            })
            .context("Failed to spawn runtime thread")?;

        Ok(Self { cmd_tx, evt_rx })
    }

    /// Send a command to the async worker
    pub fn send(&self, cmd: RuntimeCommand) -> anyhow::Result<()> {
        self.cmd_tx
            .send(cmd)
            .map_err(|_| anyhow::anyhow!("Worker channel closed"))
    }

    /// Poll for events (non-blocking)
    pub fn poll_events(&self) -> Vec<RuntimeEvent> {
        let mut events = Vec::new();
        while let Ok(evt) = self.evt_rx.try_recv() {
            events.push(evt);
        }
        events
    }
}

impl Drop for RuntimeBridge {
    fn drop(&mut self) {
        let _ = self.cmd_tx.send(RuntimeCommand::Shutdown);
    }
}
