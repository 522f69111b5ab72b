//! Ethereum infrastructure - Alloy provider, node wallet and contract bindings

pub mod contract;
mod provider;
mod wallet;

pub use provider::{create_provider, AlloyProvider, ProviderConfig, UnreachableLedger};
pub use wallet::{order_accounts, NodeWallet, WalletSettings};
