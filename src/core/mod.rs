pub mod command;
pub mod error;

pub use command::{parse_command, Command};
pub use error::{ActionKind, SyncError, ValidationError};
