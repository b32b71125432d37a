//! Create command handler

use anyhow::Result;
use clap::Args;
use colored::*;
use std::path::PathBuf;
use std::sync::Arc;
use strata_core::domain::pipeline::StagePlan;
use strata_core::domain::service::ServiceKind;
use strata_engine::prompt::{FixedAnswer, OperatorPrompt};
use strata_engine::{CreateRequest, PipelineOrchestrator, progress};

use super::with_progress;
use crate::context::CommandContext;
use crate::output;
use crate::prompt::TerminalPrompt;

#[derive(Args)]
pub struct CreateArgs {
    /// Service name (lowercase letters, digits and hyphens)
    pub name: String,

    /// Service type
    #[arg(long = "type", value_parser = parse_kind)]
    pub kind: ServiceKind,

    #[arg(long)]
    pub description: String,

    /// Folder holding the service source
    #[arg(long, default_value = ".")]
    pub location: PathBuf,

    /// Container port (defaults to the image's exposed port, then the type's default)
    #[arg(long)]
    pub port: Option<u16>,

    /// Do not publish the source or build an image
    #[arg(long)]
    pub skip_source: bool,

    /// Do not run the security scan
    #[arg(long)]
    pub skip_scan: bool,

    /// Register without deploying
    #[arg(long)]
    pub skip_deploy: bool,

    /// Continue past critical scan findings without asking
    #[arg(short, long)]
    pub yes: bool,
}

fn parse_kind(s: &str) -> Result<ServiceKind, String> {
    s.parse()
}

impl CreateArgs {
    fn plan(&self) -> StagePlan {
        let mut plan = StagePlan::create();
        if self.skip_scan {
            plan = plan.skip_scan();
        }
        if self.skip_source {
            plan = plan.skip_source();
        }
        if self.skip_deploy {
            plan = plan.skip_deploy();
        }
        plan
    }
}

pub async fn handle_create(args: CreateArgs, ctx: &CommandContext) -> Result<()> {
    let prompt: Arc<dyn OperatorPrompt> = if args.yes {
        Arc::new(FixedAnswer(true))
    } else {
        Arc::new(TerminalPrompt)
    };

    let request = CreateRequest {
        name: args.name.clone(),
        kind: args.kind,
        description: args.description.clone(),
        developer: ctx.config.developer()?.to_string(),
        location: args.location.clone(),
        port: args.port,
        plan: args.plan(),
    };

    println!(
        "{}",
        format!("Creating {} ({})", request.name, request.kind).bold()
    );

    let (events, receiver) = progress::channel();
    let orchestrator =
        PipelineOrchestrator::new(ctx.adapters(prompt), ctx.config.engine_settings(None, None), events);
    let work = async move {
        let result = orchestrator.create(request).await;
        drop(orchestrator);
        result
    };

    let outcome = with_progress(&ctx.client, receiver, work).await?;
    output::print_outcome(&outcome);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use strata_core::domain::pipeline::Stage;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        args: CreateArgs,
    }

    fn parse(argv: &[&str]) -> CreateArgs {
        let mut full = vec!["strata"];
        full.extend_from_slice(argv);
        TestCli::parse_from(full).args
    }

    #[test]
    fn test_full_plan_by_default() {
        let args = parse(&["svc-a", "--type", "api", "--description", "x"]);
        assert_eq!(args.kind, ServiceKind::Api);
        assert_eq!(args.location, PathBuf::from("."));
        assert_eq!(args.plan(), StagePlan::create());
    }

    #[test]
    fn test_skip_flags() {
        let args = parse(&[
            "svc-a",
            "--type",
            "worker",
            "--description",
            "x",
            "--skip-scan",
            "--skip-source",
            "--skip-deploy",
        ]);
        let stages: Vec<_> = args.plan().stages().collect();
        assert_eq!(stages, vec![Stage::Validate, Stage::Register]);
    }

    #[test]
    fn test_unknown_type_is_rejected() {
        let result = TestCli::try_parse_from(["strata", "svc-a", "--type", "cron", "--description", "x"]);
        assert!(result.is_err());
    }
}
