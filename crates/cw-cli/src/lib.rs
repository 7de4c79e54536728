//! Call relay CLI library.
//!
//! This crate provides the CLI interface for the call-state relay.

mod cli;
pub mod commands;
mod config;
pub mod scenario;

pub use cli::{Cli, Commands};
pub use config::Config;
