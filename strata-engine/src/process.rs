//! Shell-out helper for the command line tools the adapters drive

use std::path::Path;
use std::process::Stdio;

use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use crate::error::AdapterError;

/// Captured result of a finished command
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.code == 0
    }

    /// Turn a non-zero exit into a failure naming the command
    pub fn require_success(self, program: &str, args: &[&str]) -> Result<String, AdapterError> {
        if self.success() {
            return Ok(self.stdout);
        }
        Err(AdapterError::Failed(format!(
            "{} {} failed (exit {}): {}",
            program,
            args.join(" "),
            self.code,
            self.stderr.trim()
        )))
    }

    /// Whether stderr looks like a "does not exist" answer
    pub fn reports_missing(&self) -> bool {
        let stderr = self.stderr.to_lowercase();
        stderr.contains("not found") || stderr.contains("no such")
    }
}

/// Run `program args...`, optionally inside `dir` and with `stdin` piped in
///
/// Only a failure to start the program is an error here; callers decide what
/// a non-zero exit means.
pub async fn run(
    program: &str,
    args: &[&str],
    dir: Option<&Path>,
    stdin: Option<&str>,
) -> Result<CommandOutput, AdapterError> {
    let mut cmd = Command::new(program);
    cmd.args(args)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .stdin(if stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        });
    if let Some(dir) = dir {
        cmd.current_dir(dir);
    }

    let mut child = cmd
        .spawn()
        .map_err(|e| AdapterError::Failed(format!("failed to run {}: {}", program, e)))?;

    if let (Some(input), Some(mut pipe)) = (stdin, child.stdin.take()) {
        pipe.write_all(input.as_bytes())
            .await
            .map_err(|e| AdapterError::Failed(format!("failed to write to {}: {}", program, e)))?;
    }

    let output = child
        .wait_with_output()
        .await
        .map_err(|e| AdapterError::Failed(format!("failed to wait for {}: {}", program, e)))?;

    let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();

    if !stdout.is_empty() {
        debug!("{} stdout: {}", program, stdout);
    }
    if !stderr.is_empty() {
        debug!("{} stderr: {}", program, stderr);
    }

    Ok(CommandOutput {
        code: output.status.code().unwrap_or(-1),
        stdout,
        stderr,
    })
}

/// Run a command that must exit zero and return its stdout
pub async fn run_checked(
    program: &str,
    args: &[&str],
    dir: Option<&Path>,
) -> Result<String, AdapterError> {
    run(program, args, dir, None)
        .await?
        .require_success(program, args)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_require_success_reports_command() {
        let output = CommandOutput {
            code: 2,
            stdout: String::new(),
            stderr: "boom\n".into(),
        };
        let err = output.require_success("docker", &["push", "acme/api:latest"]).unwrap_err();
        assert_eq!(
            err,
            AdapterError::Failed("docker push acme/api:latest failed (exit 2): boom".into())
        );
    }

    #[test]
    fn test_reports_missing() {
        let output = CommandOutput {
            code: 1,
            stdout: String::new(),
            stderr: "Error from server (NotFound): deployments.apps \"api\" not found".into(),
        };
        assert!(output.reports_missing());
    }

    #[tokio::test]
    async fn test_missing_program_is_failure() {
        let err = run("strata-definitely-not-installed", &[], None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, AdapterError::Failed(_)));
    }
}
