//! Synchronous execution bounded by a deadline

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use super::output::{drain, pump, CaptureBuffer};
use super::CommandSpec;
use crate::CallContext;

/// stderr of a run killed at its deadline
pub const TIMEOUT_MARKER: &str = "command timed out";
/// stderr of a run killed because its call context was cancelled
pub const CANCELLED_MARKER: &str = "command cancelled";

/// Result of a synchronous run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub duration_ms: u64,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub timed_out: bool,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0 && !self.timed_out
    }
}

enum Outcome {
    Exited(std::io::Result<std::process::ExitStatus>),
    TimedOut,
    Cancelled,
}

/// Run to completion. Never fails: start errors, timeouts and cancellation
/// are all reported inside the returned output.
pub(super) async fn run(
    ctx: &CallContext,
    spec: &CommandSpec,
    timeout: Duration,
    max_output_bytes: usize,
    drain_grace: Duration,
) -> CommandOutput {
    let started = Instant::now();
    let mut child = match spec.to_command().spawn() {
        Ok(child) => child,
        Err(e) => {
            tracing::warn!(command = %spec.program, "failed to start: {e}");
            return CommandOutput {
                exit_code: -1,
                stdout: String::new(),
                stderr: e.to_string(),
                duration_ms: elapsed_ms(started),
                timed_out: false,
            };
        }
    };

    let stdout = CaptureBuffer::with_limit(max_output_bytes);
    let stderr = CaptureBuffer::with_limit(max_output_bytes);
    let mut readers = Vec::with_capacity(2);
    if let Some(pipe) = child.stdout.take() {
        readers.push(pump(pipe, stdout.clone()));
    }
    if let Some(pipe) = child.stderr.take() {
        readers.push(pump(pipe, stderr.clone()));
    }

    let outcome = tokio::select! {
        status = child.wait() => Outcome::Exited(status),
        _ = tokio::time::sleep(timeout) => Outcome::TimedOut,
        _ = ctx.cancelled() => Outcome::Cancelled,
    };

    if !matches!(outcome, Outcome::Exited(_)) {
        if let Err(e) = child.kill().await {
            tracing::warn!(command = %spec.program, "failed to kill: {e}");
        }
    }
    drain(readers, drain_grace).await;

    let (exit_code, stderr, timed_out) = match outcome {
        Outcome::Exited(Ok(status)) => (status.code().unwrap_or(-1), stderr.render(), false),
        Outcome::Exited(Err(e)) => (-1, e.to_string(), false),
        Outcome::TimedOut => {
            tracing::info!(command = %spec.program, "timed out after {:?}", timeout);
            (-1, TIMEOUT_MARKER.to_string(), true)
        }
        Outcome::Cancelled => (-1, CANCELLED_MARKER.to_string(), false),
    };

    CommandOutput {
        exit_code,
        stdout: stdout.render(),
        stderr,
        duration_ms: elapsed_ms(started),
        timed_out,
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}
