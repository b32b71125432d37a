//! Strata CLI
//!
//! Takes a service from a local folder to a running cluster deployment and
//! keeps the pipeline record in the Strata record store.

mod commands;
mod config;
mod context;
mod output;
mod prompt;

use anyhow::Result;
use clap::Parser;
use colored::*;
use commands::{Commands, handle_command};
use config::CliConfig;
use std::process::ExitCode;
use strata_engine::EngineError;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "strata")]
#[command(about = "Strata service deployment CLI", long_about = None)]
struct Cli {
    /// Record store URL (overrides the configured api_url)
    #[arg(long, global = true, env = "STRATA_API_URL")]
    api_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            match e.downcast_ref::<EngineError>() {
                Some(engine) => output::print_failure(engine),
                None => eprintln!("{} {:#}", "Error:".red().bold(), e),
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let path = CliConfig::default_path()?;
    let config = CliConfig::load_from(&path)?;
    handle_command(cli.command, config, &path, cli.api_url).await
}
