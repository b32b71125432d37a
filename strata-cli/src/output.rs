//! Terminal rendering
//!
//! Progress events, run status, outcomes and failure summaries. The plain
//! text layout lives in small `*_line` helpers so it can be tested without
//! colour codes.

use colored::*;
use strata_core::domain::pipeline::{PipelineRun, RunStatus};
use strata_core::domain::service::{ServiceDescriptor, ServiceStatus};
use strata_engine::cluster::AddressKind;
use strata_engine::progress::ProgressEvent;
use strata_engine::teardown::{StepStatus, TeardownReport};
use strata_engine::{EngineError, PipelineOutcome};

const BAR_WIDTH: usize = 20;

/// `[#####...............]  25%`
pub fn progress_bar(progress: u8) -> String {
    let progress = progress.min(100);
    let filled = usize::from(progress) * BAR_WIDTH / 100;
    format!(
        "[{}{}] {:>3}%",
        "#".repeat(filled),
        ".".repeat(BAR_WIDTH - filled),
        progress
    )
}

fn event_line(event: &ProgressEvent) -> String {
    format!(
        "{} {:<14} {}",
        progress_bar(event.progress),
        event.stage.as_str(),
        event.message
    )
}

/// Consumer side of the progress channel
pub fn render_event(event: &ProgressEvent) {
    let line = event_line(event);
    match event.status {
        RunStatus::Success => println!("{} {}", "✓".green().bold(), line.green()),
        RunStatus::Failed => println!("{} {}", "✗".red().bold(), line.red()),
        _ => println!("  {}", line),
    }
}

fn status_colored(status: RunStatus) -> ColoredString {
    match status {
        RunStatus::Success => status.as_str().green(),
        RunStatus::Failed => status.as_str().red(),
        RunStatus::Running => status.as_str().cyan(),
        RunStatus::Pending => status.as_str().yellow(),
    }
}

fn service_status_colored(status: ServiceStatus) -> ColoredString {
    match status {
        ServiceStatus::Running => status.as_str().green(),
        ServiceStatus::Failed => status.as_str().red(),
        ServiceStatus::Unready | ServiceStatus::RollingBack => status.as_str().yellow(),
        ServiceStatus::Registered | ServiceStatus::Deploying => status.as_str().cyan(),
    }
}

/// One-line run summary used by `status` and `status --follow`
pub fn run_line(run: &PipelineRun) -> String {
    format!(
        "{} {:<14} {} ({})",
        progress_bar(run.progress),
        run.stage.as_str(),
        run.status.as_str(),
        run.kind.as_str()
    )
}

/// Print detailed run information
pub fn print_run(run: &PipelineRun, log_lines: usize) {
    println!("{}", format!("Pipeline for {}:", run.service_name).bold());
    println!("  Run:      {}", run.id.to_string().dimmed());
    println!("  Kind:     {}", run.kind.as_str());
    println!("  Stage:    {}", run.stage.as_str().bold());
    println!("  Status:   {}", status_colored(run.status));
    println!("  Progress: {}", progress_bar(run.progress));
    println!(
        "  Updated:  {}",
        run.updated_at.format("%Y-%m-%d %H:%M:%S")
    );

    if log_lines > 0 && !run.logs.is_empty() {
        println!();
        print_logs(run, log_lines);
    }
}

/// The last `lines` entries of a run log
pub fn tail(logs: &[String], lines: usize) -> &[String] {
    &logs[logs.len().saturating_sub(lines)..]
}

pub fn print_logs(run: &PipelineRun, lines: usize) {
    println!("{}", "─".repeat(80).dimmed());
    for line in tail(&run.logs, lines) {
        println!("{}", line);
    }
    println!("{}", "─".repeat(80).dimmed());
}

pub fn print_service(service: &ServiceDescriptor) {
    println!("{}", "Service:".bold());
    println!("  Name:        {}", service.name.bold());
    println!("  Type:        {}", service.kind);
    println!("  Status:      {}", service_status_colored(service.status));
    println!("  Owner:       {}", service.developer);
    if let Some(url) = &service.url {
        println!("  URL:         {}", url.cyan());
    }
    if let Some(image) = &service.image {
        println!("  Image:       {}", image.dimmed());
    }
    if let Some(source) = &service.source_url {
        println!("  Source:      {}", source.dimmed());
    }
}

/// Success summary of a create or deploy run
pub fn print_outcome(outcome: &PipelineOutcome) {
    println!();
    let service = &outcome.descriptor;

    match &outcome.deployment {
        Some(report) if report.ready => {
            println!("{}", format!("✓ {} is running", service.name).green().bold());
        }
        Some(report) => {
            println!(
                "{}",
                format!("⚠ {} was deployed but is not ready yet", service.name)
                    .yellow()
                    .bold()
            );
            println!(
                "  Available replicas: {}",
                report.available_replicas.to_string().yellow()
            );
            for diagnostic in &report.diagnostics {
                println!("  {} {}", "•".yellow(), diagnostic);
            }
            println!(
                "  Check again with {}",
                format!("strata status {}", service.name).cyan()
            );
        }
        None => {
            println!(
                "{}",
                format!("✓ {} registered", service.name).green().bold()
            );
        }
    }

    if let Some(scan) = &outcome.scan {
        println!("  Scan:     {}", scan.summary().dimmed());
    }
    if let Some(access) = outcome.deployment.as_ref().and_then(|r| r.access.as_ref()) {
        println!("  URL:      {}", access.to_string().cyan());
        if access.address_kind == AddressKind::Internal {
            println!(
                "  {}",
                "Only an internal node address is known; the URL may not be reachable from outside the cluster network"
                    .yellow()
            );
        }
    }
    if let Some(image) = &service.image {
        println!("  Image:    {}", image.dimmed());
    }
    if let Some(source) = &service.source_url {
        println!("  Source:   {}", source.dimmed());
    }
    println!("  Run:      {}", outcome.run_id.to_string().dimmed());
}

/// Failure summary: the cause and whatever completed before it
pub fn print_failure(error: &EngineError) {
    if matches!(error, EngineError::AbortedByOperator) {
        eprintln!("{}", "✗ Aborted by operator".yellow().bold());
    } else {
        eprintln!("{} {}", "✗".red().bold(), error.to_string().red());
    }

    let side_effects = error.side_effects();
    if !side_effects.is_empty() {
        eprintln!("{}", "Completed before the failure:".bold());
        for effect in side_effects {
            eprintln!("  {} {}", "•".yellow(), effect);
        }
        eprintln!(
            "{}",
            "Nothing was undone. Retry the command to reuse these, or `strata delete` to remove them."
                .dimmed()
        );
    }
}

fn teardown_line(status: &StepStatus) -> String {
    match status {
        StepStatus::Deleted => "deleted".to_string(),
        StepStatus::AlreadyAbsent => "already absent".to_string(),
        StepStatus::Skipped => "skipped (nothing recorded)".to_string(),
        StepStatus::Failed(cause) => format!("failed: {}", cause),
    }
}

pub fn print_teardown(name: &str, report: &TeardownReport) {
    for step in &report.steps {
        let line = format!("{:<18} {}", step.resource.to_string(), teardown_line(&step.status));
        match &step.status {
            StepStatus::Deleted => println!("  {} {}", "✓".green(), line),
            StepStatus::Failed(_) => println!("  {} {}", "✗".red(), line.red()),
            _ => println!("  {} {}", "-".dimmed(), line.dimmed()),
        }
    }

    println!();
    if report.is_clean() {
        println!("{}", format!("✓ {} deleted", name).green().bold());
    } else {
        println!(
            "{}",
            format!("⚠ {} partially deleted; run the command again to retry", name)
                .yellow()
                .bold()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_core::domain::pipeline::{RunKind, Stage};

    fn event(stage: Stage, progress: u8, message: &str) -> ProgressEvent {
        ProgressEvent {
            run_id: PipelineRun::new("orders", RunKind::Create).id,
            stage,
            status: RunStatus::Running,
            progress,
            message: message.to_string(),
        }
    }

    #[test]
    fn test_progress_bar() {
        assert_eq!(progress_bar(0), format!("[{}]   0%", ".".repeat(20)));
        assert_eq!(progress_bar(50), format!("[{}{}]  50%", "#".repeat(10), ".".repeat(10)));
        assert_eq!(progress_bar(100), format!("[{}] 100%", "#".repeat(20)));
        assert_eq!(progress_bar(250), progress_bar(100));
    }

    #[test]
    fn test_event_line() {
        let line = event_line(&event(Stage::BuildImage, 55, "docker build acme/orders:latest"));
        assert!(line.contains(" 55%"));
        assert!(line.contains("build_image"));
        assert!(line.ends_with("docker build acme/orders:latest"));
    }

    #[test]
    fn test_tail() {
        let logs: Vec<String> = (1..=5).map(|i| format!("line {i}")).collect();
        assert_eq!(tail(&logs, 2), ["line 4", "line 5"]);
        assert_eq!(tail(&logs, 10).len(), 5);
        assert!(tail(&logs, 0).is_empty());
    }

    #[test]
    fn test_teardown_line() {
        assert_eq!(teardown_line(&StepStatus::AlreadyAbsent), "already absent");
        assert_eq!(
            teardown_line(&StepStatus::Failed("registry refused".into())),
            "failed: registry refused"
        );
    }
}
