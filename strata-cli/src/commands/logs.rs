//! Logs command handler

use anyhow::Result;
use clap::Args;
use colored::*;
use strata_core::domain::pipeline::PipelineRun;
use strata_engine::follow::{FollowOutcome, follow_run};
use uuid::Uuid;

use super::interrupted;
use crate::context::CommandContext;
use crate::output;

#[derive(Args)]
pub struct LogsArgs {
    /// Service name
    pub name: String,

    /// Keep printing new lines until the run finishes
    #[arg(short, long)]
    pub follow: bool,

    /// Number of lines to show
    #[arg(short = 'n', long, default_value_t = 50)]
    pub lines: usize,
}

pub async fn handle_logs(args: LogsArgs, ctx: &CommandContext) -> Result<()> {
    if !args.follow {
        let run = ctx.client.latest_run(&args.name).await?;
        output::print_logs(&run, args.lines);
        return Ok(());
    }

    let settings = ctx.config.engine_settings(None, None);
    let mut shown: Option<Shown> = None;

    let outcome = follow_run(
        &ctx.client,
        &args.name,
        settings.status_poll_interval,
        settings.status_poll_attempts,
        interrupted(),
        |run| {
            let Some(run) = run else { return };
            for line in fresh_lines(run, shown.as_ref(), args.lines) {
                println!("{}", line);
            }
            shown = Some(Shown {
                run_id: run.id,
                lines: run.logs.len(),
            });
        },
    )
    .await?;

    if let FollowOutcome::GaveUp(_) = outcome {
        eprintln!("{}", "⚠ Stopped following; the run has not finished yet".yellow());
    }
    Ok(())
}

/// How far the log of which run has been printed
struct Shown {
    run_id: Uuid,
    lines: usize,
}

/// Lines of `run` not printed yet
///
/// The first poll shows the last `first` lines; a different run is shown
/// from its start.
fn fresh_lines<'a>(run: &'a PipelineRun, shown: Option<&Shown>, first: usize) -> &'a [String] {
    match shown {
        None => output::tail(&run.logs, first),
        Some(shown) if shown.run_id == run.id => &run.logs[shown.lines.min(run.logs.len())..],
        Some(_) => &run.logs,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_core::domain::pipeline::RunKind;

    fn run_with(lines: usize) -> PipelineRun {
        let mut run = PipelineRun::new("svc-a", RunKind::Deploy);
        for i in 1..=lines {
            run.log(format!("line {i}"));
        }
        run
    }

    fn shown(run: &PipelineRun, lines: usize) -> Shown {
        Shown {
            run_id: run.id,
            lines,
        }
    }

    #[test]
    fn test_first_poll_shows_tail() {
        let run = run_with(5);
        assert_eq!(fresh_lines(&run, None, 2), ["line 4", "line 5"]);
    }

    #[test]
    fn test_same_run_shows_appended_lines() {
        let run = run_with(5);
        assert_eq!(fresh_lines(&run, Some(&shown(&run, 3)), 50), ["line 4", "line 5"]);
        assert!(fresh_lines(&run, Some(&shown(&run, 5)), 50).is_empty());
    }

    #[test]
    fn test_new_run_is_shown_from_start() {
        let previous = run_with(2);
        // Longer than what was printed for the previous run
        let next = run_with(6);

        let lines = fresh_lines(&next, Some(&shown(&previous, 2)), 50);
        assert_eq!(lines.len(), 6);
        assert_eq!(lines[0], "line 1");
    }
}
