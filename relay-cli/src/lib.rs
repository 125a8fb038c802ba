//! # relay-cli
//!
//! Argument parsing, config loading and subcommand wiring for the `relay` binary.

pub mod app;
pub mod cli;
pub mod config;

pub use cli::{Cli, Commands};
pub use config::RelayConfig;
