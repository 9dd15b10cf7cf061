//! External tool invocation
//!
//! `helm` and `aws` are run to completion with their output captured. Output
//! is forwarded to the log rather than inherited so that it stays attached to
//! the request that caused it.

use std::ffi::OsStr;
use std::process::Stdio;
use tokio::process::Command;

use crate::error::{RepoError, Result};

/// Longest stderr excerpt carried in an error message
const MAX_STDERR_IN_ERROR: usize = 2048;

/// Run `program` with `args`, failing unless it exits successfully
pub(crate) async fn run_tool<I, S>(program: &str, args: I, debug: bool) -> Result<()>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let mut command = Command::new(program);
    command
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    tracing::debug!(command = ?command.as_std(), "running external tool");

    let output = command.output().await.map_err(|e| RepoError::ExternalTool {
        tool: program.to_string(),
        message: format!("could not launch: {}", e),
    })?;

    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);

    if debug {
        for line in stdout.lines().filter(|l| !l.trim().is_empty()) {
            tracing::debug!(tool = program, "{}", line);
        }
    }

    if !output.status.success() {
        let stderr = stderr.trim();
        tracing::error!(tool = program, status = %output.status, stderr = %stderr, "external tool failed");

        let mut message = output.status.to_string();
        if !stderr.is_empty() {
            let excerpt: String = stderr.chars().take(MAX_STDERR_IN_ERROR).collect();
            message = format!("{}: {}", message, excerpt);
        }
        return Err(RepoError::ExternalTool {
            tool: program.to_string(),
            message,
        });
    }

    for line in stderr.lines().filter(|l| !l.trim().is_empty()) {
        tracing::warn!(tool = program, "{}", line);
    }

    Ok(())
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_success() {
        run_tool("sh", ["-c", "echo hello"], true).await.unwrap();
    }

    #[tokio::test]
    async fn test_nonzero_exit_carries_stderr() {
        let err = run_tool("sh", ["-c", "echo broken >&2; exit 3"], false)
            .await
            .unwrap_err();
        match err {
            RepoError::ExternalTool { tool, message } => {
                assert_eq!(tool, "sh");
                assert!(message.contains("broken"), "message was: {}", message);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_missing_binary() {
        let err = run_tool("hrp-definitely-not-installed", ["--version"], false)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("could not launch"));
    }
}
