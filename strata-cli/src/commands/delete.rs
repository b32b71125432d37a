//! Delete command handler

use anyhow::{Result, bail};
use clap::Args;
use colored::*;
use dialoguer::Confirm;
use dialoguer::theme::ColorfulTheme;
use std::sync::Arc;
use strata_engine::prompt::FixedAnswer;
use strata_engine::teardown::{TeardownCoordinator, TeardownTarget};

use crate::context::CommandContext;
use crate::output;

#[derive(Args)]
pub struct DeleteArgs {
    /// Service name
    pub name: String,

    /// Skip the confirmation prompt
    #[arg(short, long)]
    pub force: bool,
}

pub async fn handle_delete(args: DeleteArgs, ctx: &CommandContext) -> Result<()> {
    if !args.force && !confirm(&args.name)? {
        println!("Deletion cancelled");
        return Ok(());
    }

    let adapters = ctx.adapters(Arc::new(FixedAnswer(false)));
    let settings = ctx.config.engine_settings(None, None);
    if let Some(cluster) = &settings.cluster {
        if let Err(e) = adapters.cluster.ensure_context(cluster, &settings.region).await {
            tracing::warn!("Cannot select cluster {}: {}", cluster, e);
            eprintln!(
                "{}",
                format!("⚠ Using the current kubectl context; {} is unavailable", cluster).yellow()
            );
        }
    }

    let descriptor = ctx.client.find_service(&args.name).await?;
    if descriptor.is_none() {
        println!(
            "{}",
            format!("No record of {}; removing cluster resources only", args.name).dimmed()
        );
    }

    let target = TeardownTarget::new(&args.name, descriptor.as_ref());
    let coordinator = TeardownCoordinator::new(
        adapters.source,
        adapters.registry,
        adapters.cluster,
        adapters.store,
    );
    let report = coordinator.teardown(&target).await;

    output::print_teardown(&args.name, &report);
    if !report.is_clean() {
        bail!("Teardown of {} incomplete", args.name);
    }
    Ok(())
}

fn confirm(name: &str) -> Result<bool> {
    let answer = Confirm::with_theme(&ColorfulTheme::default())
        .with_prompt(format!(
            "Delete {} with its repository, image and cluster resources?",
            name
        ))
        .default(false)
        .interact()?;
    Ok(answer)
}
