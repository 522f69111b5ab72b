//! Infrastructure layer - External service integrations
//!
//! This layer contains:
//! - Alloy-based node provider and node-managed wallet
//! - `sol!` bindings for the registry contract
//! - Tokio runtime bridge between the terminal and the sync core

pub mod ethereum;
pub mod runtime;
