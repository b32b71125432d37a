//! Static analysis of the service source

use std::path::Path;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::info;

use crate::error::AdapterError;
use crate::process;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

impl Severity {
    /// Map a semgrep severity label
    pub fn from_label(label: &str) -> Self {
        match label.to_ascii_uppercase().as_str() {
            "ERROR" | "CRITICAL" | "HIGH" => Severity::Critical,
            "WARNING" | "MEDIUM" => Severity::Warning,
            _ => Severity::Info,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Finding {
    pub rule: String,
    pub severity: Severity,
    pub path: String,
    pub line: u64,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanReport {
    pub findings: Vec<Finding>,
}

impl ScanReport {
    pub fn count(&self, severity: Severity) -> usize {
        self.findings
            .iter()
            .filter(|f| f.severity == severity)
            .count()
    }

    pub fn criticals(&self) -> impl Iterator<Item = &Finding> {
        self.findings
            .iter()
            .filter(|f| f.severity == Severity::Critical)
    }

    pub fn has_critical(&self) -> bool {
        self.criticals().next().is_some()
    }

    /// One-line summary, e.g. "1 critical, 2 warning, 0 info"
    pub fn summary(&self) -> String {
        format!(
            "{} critical, {} warning, {} info",
            self.count(Severity::Critical),
            self.count(Severity::Warning),
            self.count(Severity::Info)
        )
    }
}

#[async_trait]
pub trait Scanner: Send + Sync {
    async fn scan(&self, folder: &Path) -> Result<ScanReport, AdapterError>;
}

#[derive(Debug, Deserialize)]
struct SemgrepOutput {
    #[serde(default)]
    results: Vec<SemgrepResult>,
}

#[derive(Debug, Deserialize)]
struct SemgrepResult {
    check_id: String,
    path: String,
    start: SemgrepPosition,
    extra: SemgrepExtra,
}

#[derive(Debug, Deserialize)]
struct SemgrepPosition {
    line: u64,
}

#[derive(Debug, Deserialize)]
struct SemgrepExtra {
    #[serde(default)]
    severity: String,
    #[serde(default)]
    message: String,
}

/// Parse `semgrep scan --json` output
pub fn parse_semgrep(json: &str) -> Result<ScanReport, AdapterError> {
    let output: SemgrepOutput = serde_json::from_str(json)
        .map_err(|e| AdapterError::failed(format!("unreadable semgrep output: {}", e)))?;

    let findings = output
        .results
        .into_iter()
        .map(|r| Finding {
            rule: r.check_id,
            severity: Severity::from_label(&r.extra.severity),
            path: r.path,
            line: r.start.line,
            message: r.extra.message,
        })
        .collect();

    Ok(ScanReport { findings })
}

/// `semgrep` with the registry's automatic rule selection
#[derive(Debug, Clone, Default)]
pub struct Semgrep;

#[async_trait]
impl Scanner for Semgrep {
    async fn scan(&self, folder: &Path) -> Result<ScanReport, AdapterError> {
        let target = folder.to_string_lossy();
        let args = ["scan", "--json", "--quiet", "--config", "auto", &target];
        let output = process::run("semgrep", &args, None, None).await?;

        // 1 means findings were reported; anything higher is a scanner failure
        if output.code > 1 || output.code < 0 {
            return Err(AdapterError::failed(format!(
                "semgrep failed (exit {}): {}",
                output.code, output.stderr
            )));
        }

        let report = parse_semgrep(&output.stdout)?;
        info!("Scan of {} finished: {}", folder.display(), report.summary());
        Ok(report)
    }
}
