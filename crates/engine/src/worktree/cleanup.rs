// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worktree cleanup with crash-safe ordering.
//!
//! The `cleaned` status is persisted FIRST: after that checkpoint every
//! remaining step is best-effort, and a re-run after a crash skips the
//! PM work it already did (kills of missing targets are no-ops).

use crate::self_protect::{cleanup_targets, self_pane, would_affect_self};
use crate::worktree::git;
use crate::EngineError;
use ppg_core::{ProjectPaths, WorktreeStatus};
use ppg_pm::Pm;
use std::path::Path;

/// Counters for one cleanup run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CleanupReport {
    pub tmux_killed: usize,
    pub tmux_skipped: usize,
    pub tmux_failed: usize,
    pub self_protected: bool,
    pub self_protected_targets: Vec<String>,
    /// Whether this run performed the `cleaned` transition (false when
    /// the worktree was already cleaned by an earlier run).
    pub manifest_updated: bool,
}

/// Tear down a worktree: manifest checkpoint, window kills, prompt and
/// result files, environment, then the Git-level worktree + branch.
pub async fn cleanup_worktree(
    root: &Path,
    pm: &dyn Pm,
    wt_ref: &str,
) -> Result<CleanupReport, EngineError> {
    let manifest = ppg_store::read_manifest(root)?;
    let wt = manifest
        .resolve_worktree(wt_ref)
        .ok_or_else(|| EngineError::WorktreeNotFound(wt_ref.to_string()))?
        .clone();
    let session = manifest.session_name.clone();
    let wt_id = wt.id;

    let mut report = CleanupReport::default();

    // 1. Crash-safe checkpoint: everything after this is best-effort.
    if wt.status != WorktreeStatus::Cleaned {
        ppg_store::update_manifest::<_, EngineError, _, _>(root, |mut m| async move {
            m.set_worktree_status(&wt_id, WorktreeStatus::Cleaned)?;
            if let Some(wt) = m.worktrees.get_mut(&wt_id) {
                for agent in wt.agents.values_mut() {
                    agent.status = ppg_core::AgentStatus::Gone;
                }
            }
            Ok((m, ()))
        })
        .await?;
        report.manifest_updated = true;
    }

    // 2-3. Kill the worktree's windows, skipping anything holding the
    // caller's own pane. A re-run on an already-cleaned worktree skips
    // this leg entirely: the checkpoint says the kills already happened.
    let targets = if report.manifest_updated { cleanup_targets(&wt) } else { Vec::new() };
    if !targets.is_empty() {
        let panes = pm.list_session_panes(&session).await.unwrap_or_default();
        let self_pane = self_pane();
        for target in targets {
            if let Some(own) = self_pane.as_deref() {
                if would_affect_self(&target, own, &panes) {
                    report.self_protected = true;
                    report.self_protected_targets.push(target.clone());
                    report.tmux_skipped += 1;
                    tracing::info!(target = %target, "cleanup: self-protected, skipping");
                    continue;
                }
            }
            match pm.kill_window(&target).await {
                Ok(()) => report.tmux_killed += 1,
                Err(e) => {
                    report.tmux_failed += 1;
                    tracing::warn!(target = %target, error = %e, "cleanup: kill failed");
                }
            }
        }
    }

    // 4. Prompt and result snapshots.
    let paths = ProjectPaths::new(root);
    for agent_id in wt.agents.keys() {
        remove_quietly(&paths.agent_prompt(agent_id)).await;
        remove_quietly(&paths.result_file(agent_id)).await;
    }

    // 5. Environment teardown: only a symlinked node_modules is removed.
    let node_modules = wt.path.join("node_modules");
    if let Ok(meta) = tokio::fs::symlink_metadata(&node_modules).await {
        if meta.is_symlink() {
            if let Err(e) = tokio::fs::remove_file(&node_modules).await {
                tracing::warn!(error = %e, "cleanup: node_modules unlink failed");
            }
        }
    }

    // 6. Git-level removal; branch-delete failure inside is non-fatal,
    // and so is the whole step past the checkpoint.
    if wt.path.exists() {
        let result = git::remove_worktree(
            root,
            &wt.path,
            git::RemoveOptions {
                force: true,
                delete_branch: true,
                branch_name: Some(wt.branch.clone()),
            },
        )
        .await;
        if let Err(e) = result {
            tracing::warn!(path = %wt.path.display(), error = %e, "cleanup: worktree removal failed");
        }
    }

    Ok(report)
}

async fn remove_quietly(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(path = %path.display(), error = %e, "cleanup: unlink failed"),
    }
}

#[cfg(test)]
#[path = "cleanup_tests.rs"]
mod tests;
