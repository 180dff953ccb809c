//! The main entry point for the `bookied` CLI binary.

use anyhow::Result;
use clap::Parser;

use bookied_cli::Cli;
use common::{bootstrap, telemetry};

fn main() -> Result<()> {
    telemetry::init_cli_logging("warn");

    let cli = Cli::parse();

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    runtime.block_on(bookied_cli::run(cli.command, bootstrap::load_settings))
}
