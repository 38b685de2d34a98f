//! Health probe execution.
//!
//! Runs one external command under a hard wall-clock deadline and reports
//! its exit status. Everything that can go wrong — missing binary, spawn
//! failure, deadline overrun — comes back as a failure status, never an
//! error: the caller's refresh schedule is the retry policy.

use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tracing::{debug, warn};

/// Hard wall-clock deadline for a single probe.
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(90);

/// Exit status reported when a probe cannot run or overruns its deadline.
pub const FAILURE_STATUS: i32 = 1;

/// Run one probe command, returning its exit status (0 = healthy).
///
/// The command string is tokenized on whitespace and executed directly,
/// never through a shell. All stdio goes to the null sink — a probe that
/// writes to a pipe nobody drains would deadlock against the OS buffer,
/// and only the exit status matters here.
///
/// If the command has not exited within `timeout`, the child is killed
/// and `FAILURE_STATUS` is returned.
pub async fn run_probe(command: &str, timeout: Duration) -> i32 {
    let mut tokens = command.split_whitespace();
    let Some(program) = tokens.next() else {
        warn!("probe command is empty");
        return FAILURE_STATUS;
    };

    let mut child = match Command::new(program)
        .args(tokens)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .spawn()
    {
        Ok(child) => child,
        Err(e) => {
            warn!(%command, error = %e, "failed to spawn probe");
            return FAILURE_STATUS;
        }
    };

    match tokio::time::timeout(timeout, child.wait()).await {
        Ok(Ok(status)) => {
            // Signal death carries no exit code; count it as a failure.
            let code = status.code().unwrap_or(FAILURE_STATUS);
            debug!(%command, code, "probe finished");
            code
        }
        Ok(Err(e)) => {
            warn!(%command, error = %e, "failed to wait on probe");
            FAILURE_STATUS
        }
        Err(_) => {
            warn!(%command, ?timeout, "probe deadline exceeded, killing child");
            if let Err(e) = child.kill().await {
                warn!(%command, error = %e, "failed to kill timed-out probe");
            }
            FAILURE_STATUS
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[tokio::test]
    async fn successful_probe_returns_zero() {
        assert_eq!(run_probe("true", Duration::from_secs(5)).await, 0);
    }

    #[tokio::test]
    async fn failing_probe_returns_nonzero() {
        assert_ne!(run_probe("false", Duration::from_secs(5)).await, 0);
    }

    #[tokio::test]
    async fn arguments_are_passed_literally() {
        assert_eq!(run_probe("test -n x", Duration::from_secs(5)).await, 0);
        assert_ne!(run_probe("test -n", Duration::from_secs(5)).await, 0);
    }

    #[tokio::test]
    async fn missing_binary_is_a_failure_not_an_error() {
        let status = run_probe("/no/such/binary --flag", Duration::from_secs(5)).await;
        assert_eq!(status, FAILURE_STATUS);
    }

    #[tokio::test]
    async fn empty_command_is_a_failure() {
        assert_eq!(run_probe("   ", Duration::from_secs(5)).await, FAILURE_STATUS);
    }

    #[tokio::test]
    async fn overrunning_probe_is_killed_within_the_deadline() {
        let started = Instant::now();
        let status = run_probe("sleep 30", Duration::from_millis(200)).await;

        assert_eq!(status, FAILURE_STATUS);
        // Deadline plus a small epsilon, nowhere near the sleep duration.
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}
