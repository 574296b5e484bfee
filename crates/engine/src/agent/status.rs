// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Status derivation.
//!
//! An agent's status is always re-derived from live pane state; the
//! stored status is a cache for display and change detection, never an
//! input. Derivation is a pure function of the pane snapshot so batch
//! refreshes run on a single pane-map fetch.

use crate::EngineError;
use ppg_core::{AgentId, AgentStatus, Clock, WorktreeId, WorktreeStatus};
use ppg_pm::{PaneInfo, Pm};
use std::collections::HashMap;
use std::path::Path;

/// Shells that mean "the agent process has returned to the prompt".
pub const IDLE_SHELLS: [&str; 7] = ["bash", "zsh", "sh", "fish", "dash", "tcsh", "csh"];

/// Pure derivation from one pane snapshot.
///
/// Absent pane → `gone`; dead pane → `exited` with its status; a shell
/// in the foreground → `idle`; anything else → `running`.
pub fn derive_status(info: Option<&PaneInfo>) -> (AgentStatus, Option<i32>) {
    match info {
        None => (AgentStatus::Gone, None),
        Some(info) if info.is_dead => (AgentStatus::Exited, info.dead_status),
        Some(info) if IDLE_SHELLS.contains(&info.current_command.as_str()) => {
            (AgentStatus::Idle, None)
        }
        Some(_) => (AgentStatus::Running, None),
    }
}

/// Derivation against a pre-fetched pane map (no I/O).
pub fn check_agent_status(
    panes: &HashMap<String, PaneInfo>,
    target: &str,
) -> (AgentStatus, Option<i32>) {
    derive_status(panes.get(target))
}

/// Fresh single-agent check.
pub async fn agent_status(
    pm: &dyn Pm,
    target: &str,
) -> Result<(AgentStatus, Option<i32>), EngineError> {
    Ok(derive_status(pm.get_pane_info(target).await?.as_ref()))
}

/// One observed transition during a batch refresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusChange {
    pub worktree_id: WorktreeId,
    pub agent_id: AgentId,
    pub status: AgentStatus,
    pub previous: AgentStatus,
}

/// Re-derive every agent's status from one pane-map fetch and persist
/// the differences in a single manifest transaction.
///
/// Worktrees whose checkout path vanished from disk transition to
/// `cleaned` and their agents to `gone`.
pub async fn refresh_all_statuses<C: Clock>(
    root: &Path,
    pm: &dyn Pm,
    clock: &C,
) -> Result<Vec<StatusChange>, EngineError> {
    let now = clock.now_utc();
    ppg_store::update_manifest::<_, EngineError, _, _>(root, |mut m| async move {
        let panes = pm.list_session_panes(&m.session_name).await.unwrap_or_default();
        let mut changes = Vec::new();

        for wt in m.worktrees.values_mut() {
            if wt.status != WorktreeStatus::Cleaned && !wt.path.exists() {
                wt.status = WorktreeStatus::Cleaned;
                for agent in wt.agents.values_mut() {
                    if agent.status != AgentStatus::Gone {
                        changes.push(StatusChange {
                            worktree_id: wt.id,
                            agent_id: agent.id,
                            status: AgentStatus::Gone,
                            previous: agent.status,
                        });
                        agent.status = AgentStatus::Gone;
                    }
                }
                continue;
            }

            for agent in wt.agents.values_mut() {
                let (status, exit_code) = check_agent_status(&panes, &agent.tmux_target);
                if status == agent.status {
                    continue;
                }
                changes.push(StatusChange {
                    worktree_id: wt.id,
                    agent_id: agent.id,
                    status,
                    previous: agent.status,
                });
                agent.status = status;
                if status == AgentStatus::Exited {
                    agent.exit_code = exit_code;
                    agent.completed_at.get_or_insert(now);
                }
            }
        }
        Ok((m, changes))
    })
    .await
}

#[cfg(test)]
#[path = "status_tests.rs"]
mod tests;
