//! Provisioner CLI
//!
//! Command line client for the cluster provisioning service.

use clap::Parser;

use provisioner_cli::{logging, Cli};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Keep the guard alive so buffered file logs are flushed on exit
    let _log_guard = logging::init_tracing();

    let cli = Cli::parse();
    cli.run().await?;
    Ok(())
}
