//! Commands module
//!
//! Defines all CLI commands and their handlers.

mod config;
mod create;
mod delete;
mod deploy;
mod logs;
mod status;

pub use config::ConfigCommands;
pub use create::CreateArgs;
pub use delete::DeleteArgs;
pub use deploy::DeployArgs;
pub use logs::LogsArgs;
pub use status::StatusArgs;

use anyhow::Result;
use clap::Subcommand;
use colored::*;
use std::future::Future;
use std::path::Path;
use strata_engine::progress::{self, ProgressReceiver};
use strata_engine::store::RecordStore;

use crate::config::CliConfig;
use crate::context::CommandContext;
use crate::output;

/// Top-level CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Scan, publish, build, register and deploy a service from a local folder
    Create(CreateArgs),
    /// Deploy a registered service, or roll it back
    Deploy(DeployArgs),
    /// Show the latest pipeline run of a service
    Status(StatusArgs),
    /// Show the pipeline log of a service
    Logs(LogsArgs),
    /// Remove a service and everything it created
    Delete(DeleteArgs),
    /// Manage local configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

/// Handle a CLI command
///
/// `config` is the configuration as stored; `api_url` is the command line
/// override, applied to every command except `config` itself so it is
/// never persisted by accident.
pub async fn handle_command(
    command: Commands,
    config: CliConfig,
    config_path: &Path,
    api_url: Option<String>,
) -> Result<()> {
    let context = |config: CliConfig| CommandContext::new(config.with_api_url_override(api_url));

    match command {
        Commands::Create(args) => create::handle_create(args, &context(config)?).await,
        Commands::Deploy(args) => deploy::handle_deploy(args, &context(config)?).await,
        Commands::Status(args) => status::handle_status(args, &context(config)?).await,
        Commands::Logs(args) => logs::handle_logs(args, &context(config)?).await,
        Commands::Delete(args) => delete::handle_delete(args, &context(config)?).await,
        Commands::Config { command } => {
            config::handle_config_command(command, config, config_path).await
        }
    }
}

/// Run `work` while rendering and recording its progress events
///
/// `work` must own the event sender so the channel closes when it finishes.
async fn with_progress<T>(
    store: &dyn RecordStore,
    events: ProgressReceiver,
    work: impl Future<Output = T>,
) -> T {
    let (result, failed) = tokio::join!(work, progress::forward(events, store, output::render_event));
    if failed > 0 {
        eprintln!(
            "{}",
            format!(
                "⚠ {} progress update(s) could not be recorded; `strata status` may lag behind",
                failed
            )
            .yellow()
        );
    }
    result
}

/// Resolves when the user presses Ctrl-C
async fn interrupted() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Cannot listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
}
