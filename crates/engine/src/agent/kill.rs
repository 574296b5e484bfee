// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Graceful-then-forced kill.
//!
//! Ctrl-C first, one grace period, then `kill_pane` for anything still
//! alive. Racing with pane death is expected on every step, so errors on
//! the Ctrl-C leg are swallowed and a pane that is already dead is a
//! no-op.

use crate::EngineError;
use futures_util::future::join_all;
use ppg_pm::Pm;
use std::time::Duration;

/// What a kill ended up doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KillOutcome {
    /// Pane missing or already dead; nothing to do.
    AlreadyDead,
    /// Exited within the grace period after Ctrl-C.
    Graceful,
    /// Still alive after the grace period; pane killed.
    Forced,
}

/// Aggregate result of a batch kill.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct KillSummary {
    pub already_dead: usize,
    pub graceful: usize,
    pub forced: usize,
}

impl KillSummary {
    pub fn killed(&self) -> usize {
        self.graceful + self.forced
    }

    fn record(&mut self, outcome: KillOutcome) {
        match outcome {
            KillOutcome::AlreadyDead => self.already_dead += 1,
            KillOutcome::Graceful => self.graceful += 1,
            KillOutcome::Forced => self.forced += 1,
        }
    }
}

/// Kill one agent's pane.
pub async fn kill_agent(
    pm: &dyn Pm,
    target: &str,
    grace: Duration,
) -> Result<KillOutcome, EngineError> {
    if !interrupt(pm, target).await? {
        return Ok(KillOutcome::AlreadyDead);
    }
    tokio::time::sleep(grace).await;
    finish_kill(pm, target).await
}

/// Kill a batch in parallel with a single grace-period barrier between
/// the Ctrl-C fan-out and the force-kill fan-out.
pub async fn kill_agents(pm: &dyn Pm, targets: &[String], grace: Duration) -> KillSummary {
    let mut summary = KillSummary::default();

    let interrupted = join_all(targets.iter().map(|t| interrupt(pm, t))).await;
    let pending: Vec<&String> = targets
        .iter()
        .zip(&interrupted)
        .filter_map(|(target, alive)| match alive {
            Ok(true) => Some(target),
            Ok(false) => {
                summary.record(KillOutcome::AlreadyDead);
                None
            }
            Err(e) => {
                tracing::warn!(target = %target, error = %e, "kill: interrupt failed");
                summary.record(KillOutcome::AlreadyDead);
                None
            }
        })
        .collect();

    if pending.is_empty() {
        return summary;
    }
    tokio::time::sleep(grace).await;

    let outcomes = join_all(pending.iter().map(|t| finish_kill(pm, t))).await;
    for (target, outcome) in pending.iter().zip(outcomes) {
        match outcome {
            Ok(o) => summary.record(o),
            Err(e) => {
                tracing::warn!(target = %target, error = %e, "kill: force kill failed");
                summary.record(KillOutcome::Forced);
            }
        }
    }
    summary
}

/// Send Ctrl-C if the pane is alive. Returns whether a kill is pending.
async fn interrupt(pm: &dyn Pm, target: &str) -> Result<bool, EngineError> {
    match pm.get_pane_info(target).await? {
        None => Ok(false),
        Some(info) if info.is_dead => Ok(false),
        Some(_) => {
            // Racing with pane death here is fine.
            if let Err(e) = pm.send_ctrl_c(target).await {
                tracing::debug!(target = %target, error = %e, "ctrl-c failed (ignored)");
            }
            Ok(true)
        }
    }
}

/// After the grace period: force-kill anything still alive.
async fn finish_kill(pm: &dyn Pm, target: &str) -> Result<KillOutcome, EngineError> {
    match pm.get_pane_info(target).await? {
        None => Ok(KillOutcome::Graceful),
        Some(info) if info.is_dead => Ok(KillOutcome::Graceful),
        Some(_) => {
            pm.kill_pane(target).await?;
            Ok(KillOutcome::Forced)
        }
    }
}

#[cfg(test)]
#[path = "kill_tests.rs"]
mod tests;
