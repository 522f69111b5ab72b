//! Rollcall: a terminal client for an on-chain attendance registry
//!
//! - `domain`: registry data model and the ports to the node and wallet
//! - `core`: error taxonomy and the `:` command parser
//! - `sync`: identity, view cache, actions and the refresh orchestrator
//! - `infrastructure`: alloy provider, node wallet, runtime bridge
//! - `app` / `ui`: terminal state and rendering

pub mod app;
pub mod config;
pub mod core;
pub mod domain;
pub mod infrastructure;
pub mod sync;
pub mod ui;
