//! State synchronization and transaction lifecycle
//!
//! - `identity`: active account and the account generation counter
//! - `registry`: typed calls against the registry contract
//! - `view_cache`: the replace-only snapshot of derived views
//! - `actions`: register / submit / verify with a per-kind in-flight guard
//! - `orchestrator`: decides when to refresh and wires the pieces together

mod actions;
mod identity;
mod orchestrator;
mod registry;
mod view_cache;

pub use actions::{ActionController, ActionPhase, ActionReport};
pub use identity::{AccountChange, IdentityStatus, IdentityTracker, SessionTicket};
pub use orchestrator::{RefreshOutcome, SyncOrchestrator};
pub use registry::RegistryClient;
pub use view_cache::{StaleResult, StatusLevel, StatusMessage, SyncState, ViewCache, Views};
