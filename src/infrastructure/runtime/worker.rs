//! Async worker - runs in Tokio runtime and drives the sync core

use std::sync::mpsc::{Receiver, Sender};
use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::Address;
use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::domain::{LedgerReader, WalletProvider};
use crate::infrastructure::ethereum::{
    create_provider, AlloyProvider, NodeWallet, ProviderConfig, UnreachableLedger, WalletSettings,
};
use crate::infrastructure::runtime::bridge::{RuntimeCommand, RuntimeEvent};
use crate::sync::{ActionController, SyncOrchestrator};

const COMMAND_POLL: Duration = Duration::from_millis(10);

#[derive(Debug, Clone)]
pub struct WorkerSettings {
    /// Tried in order; the first reachable one is used
    pub endpoints: Vec<ProviderConfig>,
    pub contract: Address,
    pub wallet: WalletSettings,
}

struct Connection {
    reader: Arc<dyn LedgerReader>,
    wallet: Option<Arc<dyn WalletProvider>>,
    endpoint: String,
    node: Option<String>,
}

/// Run the async worker loop
pub async fn run_async_worker(
    settings: WorkerSettings,
    cmd_rx: Receiver<RuntimeCommand>,
    evt_tx: Sender<RuntimeEvent>,
) -> Result<()> {
    if settings.endpoints.is_empty() {
        anyhow::bail!("No endpoints configured");
    }

    let connection = open_connection(&settings, &evt_tx).await;
    let sync = SyncOrchestrator::new(settings.contract, connection.reader, connection.wallet);
    let actions = ActionController::new(sync.clone());

    let _ = evt_tx.send(RuntimeEvent::Ready {
        endpoint: connection.endpoint,
        contract: settings.contract.to_string(),
        node: connection.node,
    });

    if let Ok(notifications) = sync.identity().account_notifications() {
        tokio::spawn(sync.clone().listen_for_account_changes(notifications));
    }

    let mut changes = sync.subscribe();
    changes.mark_changed();

    loop {
        while let Ok(cmd) = cmd_rx.try_recv() {
            if cmd == RuntimeCommand::Shutdown {
                info!("worker shutting down");
                return Ok(());
            }
            dispatch(cmd, &sync, &actions);
        }

        if changes.has_changed().unwrap_or(false) {
            changes.borrow_and_update();
            if evt_tx.send(RuntimeEvent::State(sync.state())).is_err() {
                // TUI is gone
                return Ok(());
            }
        }

        tokio::time::sleep(COMMAND_POLL).await;
    }
}

/// Every command runs as its own task; failures are already on the status line
fn dispatch(cmd: RuntimeCommand, sync: &SyncOrchestrator, actions: &ActionController) {
    debug!(?cmd, "dispatching command");
    match cmd {
        RuntimeCommand::Connect => {
            let sync = sync.clone();
            tokio::spawn(async move {
                if let Err(err) = sync.connect().await {
                    debug!(error = %err, "connect failed");
                }
            });
        }
        RuntimeCommand::SwitchAccount { account } => {
            if let Err(err) = sync.switch_account(account) {
                debug!(error = %err, "account switch refused");
            }
        }
        RuntimeCommand::Register { name } => {
            let actions = actions.clone();
            tokio::spawn(async move {
                if let Err(err) = actions.register(&name).await {
                    debug!(error = %err, "register did not complete");
                }
            });
        }
        RuntimeCommand::SubmitAttendance => {
            let actions = actions.clone();
            tokio::spawn(async move {
                if let Err(err) = actions.submit_attendance().await {
                    debug!(error = %err, "submit did not complete");
                }
            });
        }
        RuntimeCommand::VerifyAttendance { log_index } => {
            let actions = actions.clone();
            tokio::spawn(async move {
                if let Err(err) = actions.verify_attendance(log_index).await {
                    debug!(error = %err, "verify did not complete");
                }
            });
        }
        RuntimeCommand::Refresh => {
            let sync = sync.clone();
            tokio::spawn(async move {
                if let Err(err) = sync.refresh().await {
                    debug!(error = %err, "manual refresh failed");
                }
            });
        }
        RuntimeCommand::Shutdown => {}
    }
}

/// Try each endpoint in order. When none answers, the core runs without a
/// wallet and reports the provider as unavailable.
async fn open_connection(settings: &WorkerSettings, evt_tx: &Sender<RuntimeEvent>) -> Connection {
    for config in &settings.endpoints {
        match connect_to_endpoint(config.clone()).await {
            Ok((provider, node)) => {
                info!(endpoint = %provider.endpoint(), %node, "connected to node");
                let wallet = NodeWallet::new(Arc::clone(&provider), settings.wallet);
                return Connection {
                    endpoint: provider.endpoint().to_string(),
                    node: Some(node),
                    wallet: Some(Arc::new(wallet)),
                    reader: provider,
                };
            }
            Err(err) => {
                warn!(endpoint = %config.display(), error = %format!("{err:#}"), "endpoint unreachable");
                let _ = evt_tx.send(RuntimeEvent::Error {
                    message: format!("Connection failed ({}): {:#}", config.display(), err),
                });
            }
        }
    }

    let endpoint = settings
        .endpoints
        .first()
        .map(ProviderConfig::display)
        .unwrap_or_default();
    Connection {
        reader: Arc::new(UnreachableLedger::new(endpoint.clone())),
        wallet: None,
        endpoint,
        node: None,
    }
}

/// Connect to an endpoint and identify the node behind it
async fn connect_to_endpoint(config: ProviderConfig) -> Result<(Arc<AlloyProvider>, String)> {
    let provider = create_provider(config).await?;
    let version = provider
        .client_version()
        .await
        .context("Failed to get client version")?;
    Ok((Arc::new(provider), detect_node_kind(&version)))
}

/// Detect node kind from client version string
fn detect_node_kind(version: &str) -> String {
    let lower = version.to_lowercase();
    if lower.contains("anvil") {
        "anvil".to_string()
    } else if lower.contains("hardhat") {
        "hardhat".to_string()
    } else if lower.contains("reth") {
        "reth".to_string()
    } else if lower.contains("geth") || lower.contains("go-ethereum") {
        "geth".to_string()
    } else {
        version.to_string()
    }
}
