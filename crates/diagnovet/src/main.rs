//! Diagnovet administrative command line.
//!
//! Builds the configured repository once and runs one command against it.

mod commands;
mod config;

use clap::Parser;
use diagnovet_persistence::RepositorySelector;
use tracing::info;

use crate::commands::Command;
use crate::config::{AppConfig, init_logging};

#[derive(Debug, Parser)]
#[command(name = "diagnovet", version, about = "Veterinary diagnostic report store")]
struct Cli {
    #[command(flatten)]
    config: AppConfig,

    #[command(subcommand)]
    command: Command,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.config.log_level);

    if let Err(errors) = cli.config.validate() {
        for error in &errors {
            eprintln!("Configuration error: {}", error);
        }
        std::process::exit(1);
    }

    let selector = RepositorySelector::new(cli.config.repository_config());
    info!(
        backend = %selector.backend_kind(),
        version = diagnovet_persistence::VERSION,
        "Starting diagnovet"
    );

    let repository = selector.repository().await?;
    let output = commands::run(repository.as_ref(), cli.command).await?;
    println!("{}", serde_json::to_string_pretty(&output)?);

    Ok(())
}
