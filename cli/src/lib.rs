//! # bookied
//!
//! Operator tool for the bookie trigger service.
//!
//! ## Commands
//!
//! - `bookied approve` - Enqueue a self-approval pass for the worker
//! - `bookied replay` - Re-send recorded messages to the trigger endpoint
//!
//! Default accounts and the queue come from the service configuration
//! (`config/default.toml`, `config/local.toml`, `APP__*` variables).

#![forbid(unsafe_code)]
// CLI uses print! macros intentionally
#![allow(clippy::print_stdout)]

pub mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use common::config::Settings;

/// Bookie operator command-line interface.
#[derive(Debug, Parser)]
#[command(name = "bookied")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Enqueue approval of our own pending proposals.
    Approve(commands::approve::ApproveArgs),
    /// Replay a file of recorded messages against the trigger endpoint.
    Replay(commands::replay::ReplayArgs),
}

/// Run a parsed command. Settings are loaded only by commands that use them.
pub async fn run<F>(command: Commands, load_settings: F) -> Result<()>
where
    F: FnOnce() -> Result<Settings>,
{
    match command {
        Commands::Approve(args) => {
            let config = load_settings()?;
            commands::approve::execute(args, &config).await
        }
        Commands::Replay(args) => commands::replay::execute(args).await,
    }
}
