// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Self-protection: refuse destructive PM ops that would take down the
//! caller's own pane.
//!
//! The caller's pane handle comes from `TMUX_PANE`; the checks
//! themselves are pure functions over a pane map so they can run against
//! a single fetch per sweep.

use ppg_core::{Agent, Worktree};
use ppg_pm::PaneInfo;
use std::collections::HashMap;

/// The caller's own pane handle, when running inside a multiplexer.
pub fn self_pane() -> Option<String> {
    std::env::var("TMUX_PANE").ok().filter(|v| !v.is_empty())
}

/// Would destroying `target` take down the pane `self_pane`?
///
/// 1. Direct handle equality.
/// 2. `target` resolves in the pane map to the self pane.
/// 3. A window-level target (has `:`, no `.`) contains the self pane:
///    killing the window kills every pane in it.
pub fn would_affect_self(
    target: &str,
    self_pane: &str,
    panes: &HashMap<String, PaneInfo>,
) -> bool {
    if target == self_pane {
        return true;
    }
    if let Some(info) = panes.get(target) {
        if info.pane_id == self_pane {
            return true;
        }
    }
    if target.contains(':') && !target.contains('.') {
        let prefix = format!("{target}.");
        return panes
            .iter()
            .any(|(key, info)| key.starts_with(&prefix) && info.pane_id == self_pane);
    }
    false
}

/// Agents partitioned by whether killing them is safe.
pub struct SelfSplit {
    pub safe: Vec<Agent>,
    pub skipped: Vec<Agent>,
}

/// Partition `agents` into kill-safe and self-protected sets.
pub fn exclude_self(
    agents: Vec<Agent>,
    self_pane: Option<&str>,
    panes: &HashMap<String, PaneInfo>,
) -> SelfSplit {
    let Some(self_pane) = self_pane else {
        return SelfSplit { safe: agents, skipped: Vec::new() };
    };
    let (skipped, safe) = agents
        .into_iter()
        .partition(|agent| would_affect_self(&agent.tmux_target, self_pane, panes));
    SelfSplit { safe, skipped }
}

/// Would cleaning up this worktree (killing its window and every agent
/// pane) affect the caller?
pub fn would_cleanup_affect_self(
    wt: &Worktree,
    self_pane: &str,
    panes: &HashMap<String, PaneInfo>,
) -> bool {
    cleanup_targets(wt)
        .iter()
        .any(|target| would_affect_self(target, self_pane, panes))
}

/// De-duplicated destructive target set for a worktree cleanup: every
/// agent pane plus the worktree window.
pub fn cleanup_targets(wt: &Worktree) -> Vec<String> {
    let mut targets: Vec<String> =
        wt.agents.values().map(|a| a.tmux_target.clone()).collect();
    if !wt.tmux_window.is_empty() {
        targets.push(wt.tmux_window.clone());
    }
    let mut seen = std::collections::HashSet::new();
    targets.retain(|t| seen.insert(t.clone()));
    targets
}

#[cfg(test)]
#[path = "self_protect_tests.rs"]
mod tests;
