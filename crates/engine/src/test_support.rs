// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared fixtures for engine tests.

use chrono::Utc;
use ppg_core::{Agent, AgentId, AgentStatus, Manifest, Worktree, WorktreeId, WorktreeStatus};
use std::collections::BTreeMap;
use std::path::Path;
use tempfile::TempDir;

pub(crate) fn init_project() -> TempDir {
    let dir = tempfile::tempdir().expect("tempdir");
    let manifest = Manifest::new(dir.path(), "ppg", Utc::now());
    ppg_store::init_manifest(dir.path(), manifest).expect("init manifest");
    dir
}

pub(crate) fn test_worktree(root: &Path, id: &str, name: &str) -> Worktree {
    let path = root.join(".ppg/worktrees").join(name);
    std::fs::create_dir_all(&path).expect("worktree dir");
    Worktree {
        id: WorktreeId::from_string(id),
        name: name.to_string(),
        path,
        branch: format!("ppg/{name}"),
        base_branch: "main".to_string(),
        status: WorktreeStatus::Active,
        tmux_window: String::new(),
        merged_at: None,
        pr_url: None,
        created_at: Utc::now(),
        agents: BTreeMap::new(),
    }
}

pub(crate) fn test_agent(id: &str, target: &str) -> Agent {
    Agent {
        id: AgentId::from_string(id),
        name: "claude-1".to_string(),
        agent_type: "claude".to_string(),
        status: AgentStatus::Running,
        tmux_target: target.to_string(),
        prompt: "Do X".to_string(),
        session_id: None,
        started_at: Utc::now(),
        exit_code: None,
        completed_at: None,
    }
}

/// Insert a worktree (and optional agents) directly into the manifest.
pub(crate) async fn insert_worktree(root: &Path, wt: Worktree) {
    ppg_store::update_manifest::<_, ppg_store::StoreError, _, _>(root, |mut m| async move {
        m.insert_worktree(wt).expect("insert worktree");
        Ok((m, ()))
    })
    .await
    .expect("update manifest");
}

pub(crate) async fn insert_agent(root: &Path, wt_id: &str, agent: Agent) {
    let wt_id = WorktreeId::from_string(wt_id);
    ppg_store::update_manifest::<_, ppg_store::StoreError, _, _>(root, |mut m| async move {
        m.insert_agent(&wt_id, agent).expect("insert agent");
        Ok((m, ()))
    })
    .await
    .expect("update manifest");
}
