//! Linkage CLI - manage relations from the command line.
//!
//! Every command runs with administrative accountability against a local
//! database directory and prints pretty JSON.

pub mod commands;
pub mod config;
pub mod error;

pub use commands::{execute, run};
pub use config::{Args, Command, RelationsCommand, TablesCommand, DEFAULT_LOG_FILTER};
pub use error::{CliError, CliResult};
