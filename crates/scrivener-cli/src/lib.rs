//! Scrivener CLI library.
//!
//! Runs research sessions in-process against a local session database and
//! renders their status and reports for the terminal.

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod output;

pub use cli::{Cli, Command};
pub use config::Config;
pub use error::{CliError, Result};
pub use output::Formatter;
