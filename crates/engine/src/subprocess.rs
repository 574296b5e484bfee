// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bounded subprocess execution for git and gh invocations.

use crate::EngineError;
use std::process::Output;
use std::time::Duration;
use tokio::process::Command;

/// Git worktree/merge operations can touch many files; keep the bound
/// generous.
pub(crate) const GIT_TIMEOUT: Duration = Duration::from_secs(60);

/// Run a command, failing on timeout or spawn error. Non-zero exit is
/// returned to the caller for per-command handling.
pub(crate) async fn run_with_timeout(
    mut cmd: Command,
    timeout: Duration,
    label: &str,
) -> Result<Output, EngineError> {
    let result = tokio::time::timeout(timeout, cmd.output()).await;
    match result {
        Ok(Ok(output)) => Ok(output),
        Ok(Err(e)) => Err(EngineError::Io(e)),
        Err(_) => Err(EngineError::Io(std::io::Error::new(
            std::io::ErrorKind::TimedOut,
            format!("{label} timed out after {}s", timeout.as_secs()),
        ))),
    }
}

/// Stderr of a finished command, trimmed.
pub(crate) fn stderr_of(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).trim().to_string()
}
