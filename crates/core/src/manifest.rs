// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Manifest data model: the JSON registry of all worktrees and agents in
//! a project.
//!
//! Wire format is camelCase JSON with 2-space indent and a trailing
//! newline; readers tolerate unknown fields and manifests written without
//! per-worktree `agents` maps.

use crate::{AgentId, WorktreeId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use thiserror::Error;

/// Current manifest schema version.
pub const MANIFEST_VERSION: u32 = 1;

/// Stored prompts are truncated to this many characters.
pub const PROMPT_MAX_CHARS: usize = 500;

/// Errors from in-memory manifest mutations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ManifestError {
    #[error("duplicate worktree id: {0}")]
    DuplicateWorktree(WorktreeId),

    #[error("duplicate agent id: {0}")]
    DuplicateAgent(AgentId),

    #[error("worktree not found: {0}")]
    WorktreeNotFound(String),

    #[error("invalid status transition: {from} -> {to}")]
    InvalidTransition { from: WorktreeStatus, to: WorktreeStatus },
}

/// Worktree lifecycle status. Transitions are monotone: see
/// [`WorktreeStatus::can_transition`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorktreeStatus {
    Active,
    Merging,
    Merged,
    Failed,
    Cleaned,
}

impl WorktreeStatus {
    /// Whether moving from `self` to `to` is allowed.
    ///
    /// `cleaned` is terminal and reachable from every state (cleanup is
    /// valid for abandoned and half-merged worktrees alike); `failed`
    /// may retry a merge.
    pub fn can_transition(self, to: WorktreeStatus) -> bool {
        use WorktreeStatus::*;
        if self == to {
            return true;
        }
        matches!(
            (self, to),
            (Active, Merging)
                | (Active, Cleaned)
                | (Merging, Merged)
                | (Merging, Failed)
                | (Merging, Cleaned)
                | (Merged, Cleaned)
                | (Failed, Merging)
                | (Failed, Cleaned)
        )
    }
}

impl std::fmt::Display for WorktreeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            WorktreeStatus::Active => "active",
            WorktreeStatus::Merging => "merging",
            WorktreeStatus::Merged => "merged",
            WorktreeStatus::Failed => "failed",
            WorktreeStatus::Cleaned => "cleaned",
        };
        write!(f, "{s}")
    }
}

/// Live status of an agent, always re-derived from pane state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentStatus {
    Running,
    Idle,
    Exited,
    Gone,
}

impl std::fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            AgentStatus::Running => "running",
            AgentStatus::Idle => "idle",
            AgentStatus::Exited => "exited",
            AgentStatus::Gone => "gone",
        };
        write!(f, "{s}")
    }
}

/// One agent process inside one PM pane.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Agent {
    pub id: AgentId,
    pub name: String,
    /// Opaque label, e.g. "claude".
    pub agent_type: String,
    pub status: AgentStatus,
    /// Opaque PM pane handle (back-reference, not ownership).
    pub tmux_target: String,
    /// Truncated to [`PROMPT_MAX_CHARS`] for storage.
    pub prompt: String,
    /// Opaque resume token recorded by some agent CLIs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

/// One Git worktree and the agents running inside it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Worktree {
    pub id: WorktreeId,
    /// Filesystem/branch-safe name.
    pub name: String,
    /// Absolute checkout path.
    pub path: PathBuf,
    pub branch: String,
    pub base_branch: String,
    pub status: WorktreeStatus,
    /// Opaque PM window handle; tombstone after cleanup.
    #[serde(default)]
    pub tmux_window: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merged_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pr_url: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub agents: BTreeMap<AgentId, Agent>,
}

impl Worktree {
    /// Agents whose stored status is `running`.
    pub fn running_agents(&self) -> impl Iterator<Item = &Agent> {
        self.agents.values().filter(|a| a.status == AgentStatus::Running)
    }
}

/// The JSON registry persisted at `<root>/.ppg/manifest.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    pub version: u32,
    pub project_root: PathBuf,
    /// PM session identifier for this project.
    pub session_name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub worktrees: BTreeMap<WorktreeId, Worktree>,
}

impl Manifest {
    pub fn new(
        project_root: impl Into<PathBuf>,
        session_name: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            version: MANIFEST_VERSION,
            project_root: project_root.into(),
            session_name: session_name.into(),
            created_at: now,
            updated_at: now,
            worktrees: BTreeMap::new(),
        }
    }

    /// Resolve a worktree by id, name, or branch; id wins on ambiguity.
    pub fn resolve_worktree(&self, reference: &str) -> Option<&Worktree> {
        if let Some(wt) = self.worktrees.get(reference) {
            return Some(wt);
        }
        self.worktrees
            .values()
            .find(|wt| wt.name == reference)
            .or_else(|| self.worktrees.values().find(|wt| wt.branch == reference))
    }

    /// Mutable variant of [`Manifest::resolve_worktree`].
    pub fn resolve_worktree_mut(&mut self, reference: &str) -> Option<&mut Worktree> {
        let id = self.resolve_worktree(reference)?.id;
        self.worktrees.get_mut(&id)
    }

    /// Find an agent anywhere in the manifest.
    pub fn find_agent(&self, agent_id: &str) -> Option<(&Worktree, &Agent)> {
        self.worktrees.values().find_map(|wt| wt.agents.get(agent_id).map(|a| (wt, a)))
    }

    /// Mutable variant of [`Manifest::find_agent`]; returns the owning
    /// worktree id alongside the agent.
    pub fn find_agent_mut(&mut self, agent_id: &str) -> Option<(WorktreeId, &mut Agent)> {
        self.worktrees
            .values_mut()
            .find_map(|wt| wt.agents.get_mut(agent_id).map(|a| (wt.id, a)))
    }

    /// Insert a worktree record, rejecting duplicate worktree or agent IDs.
    pub fn insert_worktree(&mut self, wt: Worktree) -> Result<(), ManifestError> {
        if self.worktrees.contains_key(&wt.id) {
            return Err(ManifestError::DuplicateWorktree(wt.id));
        }
        for agent_id in wt.agents.keys() {
            if self.find_agent(agent_id).is_some() {
                return Err(ManifestError::DuplicateAgent(*agent_id));
            }
        }
        self.worktrees.insert(wt.id, wt);
        Ok(())
    }

    /// Insert an agent into a worktree, enforcing manifest-wide ID
    /// uniqueness.
    pub fn insert_agent(&mut self, wt_id: &WorktreeId, agent: Agent) -> Result<(), ManifestError> {
        if self.find_agent(&agent.id).is_some() {
            return Err(ManifestError::DuplicateAgent(agent.id));
        }
        let wt = self
            .worktrees
            .get_mut(wt_id)
            .ok_or_else(|| ManifestError::WorktreeNotFound(wt_id.to_string()))?;
        wt.agents.insert(agent.id, agent);
        Ok(())
    }

    /// Apply a status transition, enforcing monotonicity.
    pub fn set_worktree_status(
        &mut self,
        wt_id: &WorktreeId,
        to: WorktreeStatus,
    ) -> Result<(), ManifestError> {
        let wt = self
            .worktrees
            .get_mut(wt_id)
            .ok_or_else(|| ManifestError::WorktreeNotFound(wt_id.to_string()))?;
        if !wt.status.can_transition(to) {
            return Err(ManifestError::InvalidTransition { from: wt.status, to });
        }
        wt.status = to;
        Ok(())
    }

    /// Refresh `updatedAt`; called by the store on every write.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now;
    }
}

/// Truncate a prompt to [`PROMPT_MAX_CHARS`] characters for storage,
/// respecting char boundaries.
pub fn truncate_prompt(prompt: &str) -> String {
    if prompt.chars().count() <= PROMPT_MAX_CHARS {
        prompt.to_string()
    } else {
        prompt.chars().take(PROMPT_MAX_CHARS).collect()
    }
}

#[cfg(test)]
#[path = "manifest_tests.rs"]
mod tests;
