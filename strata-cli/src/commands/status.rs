//! Status command handler

use anyhow::{Result, bail};
use clap::Args;
use colored::*;
use serde_json::json;
use strata_core::domain::pipeline::{PipelineRun, RunStatus};
use strata_engine::follow::{FollowOutcome, follow_run};

use super::interrupted;
use crate::context::CommandContext;
use crate::output;

#[derive(Args)]
pub struct StatusArgs {
    /// Service name
    pub name: String,

    /// Poll until the latest run finishes
    #[arg(short, long)]
    pub follow: bool,

    /// Print machine-readable JSON
    #[arg(long)]
    pub json: bool,
}

pub async fn handle_status(args: StatusArgs, ctx: &CommandContext) -> Result<()> {
    if args.follow {
        return follow(&args, ctx).await;
    }

    let service = ctx.client.find_service(&args.name).await?;
    let run = match ctx.client.latest_run(&args.name).await {
        Ok(run) => Some(run),
        Err(e) if e.is_not_found() => None,
        Err(e) => return Err(e.into()),
    };

    if service.is_none() && run.is_none() {
        bail!("Service '{}' not found", args.name);
    }

    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&json!({ "service": service, "pipeline": run }))?
        );
        return Ok(());
    }

    if let Some(service) = &service {
        output::print_service(service);
        println!();
    }
    match &run {
        Some(run) => output::print_run(run, 5),
        None => println!("{}", "No pipeline run recorded yet".dimmed()),
    }
    Ok(())
}

async fn follow(args: &StatusArgs, ctx: &CommandContext) -> Result<()> {
    let settings = ctx.config.engine_settings(None, None);
    let mut waiting_shown = false;
    let mut last_line = None;

    let outcome = follow_run(
        &ctx.client,
        &args.name,
        settings.status_poll_interval,
        settings.status_poll_attempts,
        interrupted(),
        |run| match run {
            None if !waiting_shown => {
                println!("{}", "Waiting for a pipeline run...".dimmed());
                waiting_shown = true;
            }
            None => {}
            Some(run) if args.json => println!("{}", json!(run)),
            Some(run) => {
                let line = output::run_line(run);
                if last_line.as_ref() != Some(&line) {
                    println!("  {}", line);
                    last_line = Some(line);
                }
            }
        },
    )
    .await?;

    match outcome {
        FollowOutcome::Finished(run) => finished(&run, args.json),
        FollowOutcome::Interrupted(_) => Ok(()),
        FollowOutcome::GaveUp(_) => {
            eprintln!(
                "{}",
                "⚠ Stopped polling; the run has not finished yet".yellow()
            );
            Ok(())
        }
    }
}

fn finished(run: &PipelineRun, json: bool) -> Result<()> {
    if !json {
        println!();
        output::print_run(run, 5);
    }
    if run.status == RunStatus::Failed {
        bail!("Pipeline run {} failed at {}", run.id, run.stage.as_str());
    }
    Ok(())
}
