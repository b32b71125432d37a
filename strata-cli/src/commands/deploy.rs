//! Deploy command handler
//!
//! A deploy runs here and streams progress. A rollback is executed by the
//! record store; this command only requests it and follows the run.

use anyhow::{Result, bail};
use clap::Args;
use colored::*;
use std::sync::Arc;
use strata_core::domain::pipeline::{PipelineRun, RunStatus};
use strata_engine::follow::{FollowOutcome, follow_run};
use strata_engine::prompt::FixedAnswer;
use strata_engine::{DeployRequest, EngineSettings, PipelineOrchestrator, progress};

use super::{interrupted, with_progress};
use crate::context::CommandContext;
use crate::output;

#[derive(Args)]
pub struct DeployArgs {
    /// Service name
    pub name: String,

    /// Target cluster (defaults to the configured cluster)
    #[arg(long)]
    pub cluster: Option<String>,

    /// Cluster region (defaults to the configured region)
    #[arg(long)]
    pub region: Option<String>,

    /// Container port override
    #[arg(long)]
    pub port: Option<u16>,

    /// Roll back to the previous revision instead of deploying
    ///
    /// Runs on the record store against the cluster it is configured for.
    #[arg(long, conflicts_with_all = ["port", "cluster", "region"])]
    pub rollback: bool,
}

pub async fn handle_deploy(args: DeployArgs, ctx: &CommandContext) -> Result<()> {
    let settings = ctx.config.engine_settings(args.cluster.clone(), args.region.clone());
    let (events, receiver) = progress::channel();
    let orchestrator = PipelineOrchestrator::new(
        ctx.adapters(Arc::new(FixedAnswer(false))),
        settings.clone(),
        events,
    );

    if args.rollback {
        let run = orchestrator.rollback(&args.name).await?;
        drop(orchestrator);
        drop(receiver);
        return follow_rollback(ctx, &settings, &args.name, run).await;
    }

    println!("{}", format!("Deploying {}", args.name).bold());
    let request = DeployRequest {
        name: args.name.clone(),
        port: args.port,
    };
    let work = async move {
        let result = orchestrator.deploy(request).await;
        drop(orchestrator);
        result
    };

    let outcome = with_progress(&ctx.client, receiver, work).await?;
    output::print_outcome(&outcome);
    Ok(())
}

async fn follow_rollback(
    ctx: &CommandContext,
    settings: &EngineSettings,
    name: &str,
    run: PipelineRun,
) -> Result<()> {
    println!(
        "{}",
        format!("Rollback of {} requested (run {})", name, run.id).bold()
    );

    let mut last_line = None;
    let outcome = follow_run(
        &ctx.client,
        name,
        settings.status_poll_interval,
        settings.status_poll_attempts,
        interrupted(),
        |latest| {
            if let Some(latest) = latest.filter(|r| r.id == run.id) {
                let line = output::run_line(latest);
                if last_line.as_ref() != Some(&line) {
                    println!("  {}", line);
                    last_line = Some(line);
                }
            }
        },
    )
    .await?;

    match outcome {
        FollowOutcome::Finished(done) if done.status == RunStatus::Success => {
            println!("{}", format!("✓ {} rolled back", name).green().bold());
            Ok(())
        }
        FollowOutcome::Finished(done) => {
            let cause = done.logs.last().cloned().unwrap_or_default();
            bail!("Rollback of {} failed: {}", name, cause)
        }
        FollowOutcome::Interrupted(_) => {
            println!(
                "{}",
                "Stopped following; the rollback continues on the server.".yellow()
            );
            Ok(())
        }
        FollowOutcome::GaveUp(_) => {
            println!(
                "{}",
                format!(
                    "Rollback still running; check with `strata status {} --follow`",
                    name
                )
                .yellow()
            );
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        args: DeployArgs,
    }

    fn parse(argv: &[&str]) -> Result<DeployArgs, clap::Error> {
        let mut full = vec!["strata"];
        full.extend_from_slice(argv);
        TestCli::try_parse_from(full).map(|cli| cli.args)
    }

    #[test]
    fn test_deploy_overrides() {
        let args = parse(&["svc-a", "--cluster", "prod", "--region", "eu-west-1", "--port", "9000"])
            .unwrap();
        assert_eq!(args.cluster.as_deref(), Some("prod"));
        assert_eq!(args.region.as_deref(), Some("eu-west-1"));
        assert_eq!(args.port, Some(9000));
        assert!(!args.rollback);
    }

    #[test]
    fn test_rollback_rejects_target_overrides() {
        assert!(parse(&["svc-a", "--rollback"]).unwrap().rollback);
        assert!(parse(&["svc-a", "--rollback", "--cluster", "prod"]).is_err());
        assert!(parse(&["svc-a", "--rollback", "--region", "eu-west-1"]).is_err());
        assert!(parse(&["svc-a", "--rollback", "--port", "9000"]).is_err());
    }
}
