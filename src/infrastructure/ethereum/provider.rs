//! Ethereum node provider and Alloy implementations
//!
//! One enum variant per transport, all sharing the same filled provider type
//! so contract calls and transaction submission look identical everywhere.

use std::path::PathBuf;

use alloy::network::Ethereum;
use alloy::primitives::{Address, Bytes};
use alloy::providers::{
    fillers::{BlobGasFiller, ChainIdFiller, FillProvider, GasFiller, JoinFill, NonceFiller},
    Identity, PendingTransactionBuilder, Provider, ProviderBuilder, RootProvider,
};
use alloy::rpc::types::TransactionRequest;
use alloy::transports::TransportError;
use anyhow::{Context, Result};

use crate::domain::{LedgerReader, ProviderError};

/// Provider configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderConfig {
    /// HTTP JSON-RPC endpoint
    Http(String),
    /// WebSocket endpoint
    WebSocket(String),
    /// IPC socket path (Unix only)
    #[cfg(unix)]
    Ipc(PathBuf),
}

impl ProviderConfig {
    /// Get display name for this endpoint
    pub fn display(&self) -> String {
        match self {
            ProviderConfig::Http(url) => url.clone(),
            ProviderConfig::WebSocket(url) => url.clone(),
            #[cfg(unix)]
            ProviderConfig::Ipc(path) => path.display().to_string(),
        }
    }
}

type NodeFillProvider = FillProvider<
    JoinFill<
        Identity,
        JoinFill<GasFiller, JoinFill<BlobGasFiller, JoinFill<NonceFiller, ChainIdFiller>>>,
    >,
    RootProvider,
    Ethereum,
>;

/// Enum-based provider that keeps the endpoint it was built from
pub enum AlloyProvider {
    Http {
        provider: NodeFillProvider,
        endpoint: String,
    },
    WebSocket {
        provider: NodeFillProvider,
        endpoint: String,
    },
    #[cfg(unix)]
    Ipc {
        provider: NodeFillProvider,
        endpoint: String,
    },
}

/// Create a provider from configuration
pub async fn create_provider(config: ProviderConfig) -> Result<AlloyProvider> {
    match config {
        ProviderConfig::Http(url) => {
            let rpc_url = url.parse().context("Invalid HTTP URL")?;
            let provider = ProviderBuilder::new().connect_http(rpc_url);
            Ok(AlloyProvider::Http {
                provider,
                endpoint: url,
            })
        }
        ProviderConfig::WebSocket(url) => {
            let provider = ProviderBuilder::new()
                .connect(&url)
                .await
                .context("Failed to create WebSocket provider")?;
            Ok(AlloyProvider::WebSocket {
                provider,
                endpoint: url,
            })
        }
        #[cfg(unix)]
        ProviderConfig::Ipc(path) => {
            use alloy::providers::IpcConnect;
            let ipc_path = path.to_string_lossy().to_string();
            let ipc = IpcConnect::new(ipc_path);
            let provider = ProviderBuilder::new()
                .connect_ipc(ipc)
                .await
                .context("Failed to create IPC provider")?;
            Ok(AlloyProvider::Ipc {
                provider,
                endpoint: path.display().to_string(),
            })
        }
    }
}

// Macro to reduce code duplication for provider method implementations
macro_rules! impl_provider_method {
    ($self:ident, $method:ident $(, $arg:expr)*) => {
        match $self {
            AlloyProvider::Http { provider, .. } => provider.$method($($arg),*).await,
            AlloyProvider::WebSocket { provider, .. } => provider.$method($($arg),*).await,
            #[cfg(unix)]
            AlloyProvider::Ipc { provider, .. } => provider.$method($($arg),*).await,
        }
    };
}

impl AlloyProvider {
    /// Client version, used as the node label
    pub async fn client_version(&self) -> Result<String, ProviderError> {
        impl_provider_method!(self, get_client_version).map_err(|err| classify(&err))
    }

    /// Accounts managed by the node (`eth_accounts`)
    pub async fn accounts(&self) -> Result<Vec<Address>, ProviderError> {
        impl_provider_method!(self, get_accounts).map_err(|err| classify(&err))
    }

    /// Broadcast through `eth_sendTransaction`; the node signs for `from`
    pub async fn send_transaction(
        &self,
        request: TransactionRequest,
    ) -> Result<PendingTransactionBuilder<Ethereum>, ProviderError> {
        impl_provider_method!(self, send_transaction, request).map_err(|err| classify(&err))
    }

    pub fn endpoint(&self) -> &str {
        match self {
            AlloyProvider::Http { endpoint, .. } => endpoint,
            AlloyProvider::WebSocket { endpoint, .. } => endpoint,
            #[cfg(unix)]
            AlloyProvider::Ipc { endpoint, .. } => endpoint,
        }
    }
}

#[async_trait::async_trait]
impl LedgerReader for AlloyProvider {
    async fn call(&self, request: TransactionRequest) -> Result<Bytes, ProviderError> {
        match self {
            AlloyProvider::Http { provider, .. } => provider.call(request).await,
            AlloyProvider::WebSocket { provider, .. } => provider.call(request).await,
            #[cfg(unix)]
            AlloyProvider::Ipc { provider, .. } => provider.call(request).await,
        }
        .map_err(|err| classify(&err))
    }

    fn endpoint_name(&self) -> String {
        self.endpoint().to_string()
    }
}

/// Stand-in reader used when no node could be reached at startup
pub struct UnreachableLedger {
    endpoint: String,
}

impl UnreachableLedger {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait::async_trait]
impl LedgerReader for UnreachableLedger {
    async fn call(&self, _request: TransactionRequest) -> Result<Bytes, ProviderError> {
        Err(ProviderError::Unavailable)
    }

    fn endpoint_name(&self) -> String {
        self.endpoint.clone()
    }
}

/// JSON-RPC error responses carry the node's message (revert reason, user
/// rejection); everything else is a transport failure
pub(crate) fn classify(err: &TransportError) -> ProviderError {
    match err.as_error_resp() {
        Some(payload) => ProviderError::Rejected(payload.message.to_string()),
        None => ProviderError::Transport(err.to_string()),
    }
}
