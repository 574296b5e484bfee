// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Merge state machine: `active → merging → merged|failed`, then
//! cleanup.
//!
//! State transitions are persisted around the Git work: `merging` lands
//! on disk before the first Git command runs, and `merged`/`failed`
//! before the call returns, so a crash mid-merge is always visible in
//! the manifest.

use crate::worktree::cleanup::{cleanup_worktree, CleanupReport};
use crate::worktree::git;
use crate::EngineError;
use ppg_core::{Clock, WorktreeId, WorktreeStatus};
use ppg_pm::Pm;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MergeStrategy {
    #[default]
    Squash,
    NoFf,
}

#[derive(Debug, Clone, Default)]
pub struct MergeOptions {
    pub strategy: MergeStrategy,
    /// Merge even while agents are running.
    pub force: bool,
    /// Report what would happen without any side effect.
    pub dry_run: bool,
    /// Skip cleanup after a successful merge.
    pub no_cleanup: bool,
}

#[derive(Debug)]
pub struct MergeOutcome {
    pub worktree_id: WorktreeId,
    pub branch: String,
    pub base_branch: String,
    pub dry_run: bool,
    pub cleanup: Option<CleanupReport>,
}

/// Merge a worktree's branch back into its base branch.
pub async fn perform_merge<C: Clock>(
    root: &Path,
    pm: &dyn Pm,
    clock: &C,
    wt_ref: &str,
    opts: MergeOptions,
) -> Result<MergeOutcome, EngineError> {
    let manifest = ppg_store::read_manifest(root)?;
    let wt = manifest
        .resolve_worktree(wt_ref)
        .ok_or_else(|| EngineError::WorktreeNotFound(wt_ref.to_string()))?;
    let (wt_id, name, branch, base) =
        (wt.id, wt.name.clone(), wt.branch.clone(), wt.base_branch.clone());

    if !opts.force {
        let running: Vec<String> =
            wt.running_agents().map(|a| a.id.to_string()).collect();
        if !running.is_empty() {
            return Err(EngineError::AgentsRunning(running.join(", ")));
        }
    }

    if opts.dry_run {
        return Ok(MergeOutcome {
            worktree_id: wt_id,
            branch,
            base_branch: base,
            dry_run: true,
            cleanup: None,
        });
    }

    set_status(root, wt_id, WorktreeStatus::Merging).await?;

    match run_merge(root, &name, &branch, &base, opts.strategy).await {
        Ok(()) => {}
        Err(e) => {
            // Failure state lands on disk before the error surfaces.
            set_status(root, wt_id, WorktreeStatus::Failed).await?;
            return Err(e);
        }
    }

    let merged_at = clock.now_utc();
    ppg_store::update_manifest::<_, EngineError, _, _>(root, |mut m| async move {
        m.set_worktree_status(&wt_id, WorktreeStatus::Merged)?;
        if let Some(wt) = m.worktrees.get_mut(&wt_id) {
            wt.merged_at = Some(merged_at);
        }
        Ok((m, ()))
    })
    .await?;

    let cleanup = if opts.no_cleanup {
        None
    } else {
        Some(cleanup_worktree(root, pm, &wt_id.to_string()).await?)
    };

    Ok(MergeOutcome { worktree_id: wt_id, branch, base_branch: base, dry_run: false, cleanup })
}

async fn set_status(
    root: &Path,
    wt_id: WorktreeId,
    status: WorktreeStatus,
) -> Result<(), EngineError> {
    ppg_store::update_manifest::<_, EngineError, _, _>(root, |mut m| async move {
        m.set_worktree_status(&wt_id, status)?;
        Ok((m, ()))
    })
    .await
}

/// The Git leg: checkout base if needed, then merge by strategy.
async fn run_merge(
    root: &Path,
    name: &str,
    branch: &str,
    base: &str,
    strategy: MergeStrategy,
) -> Result<(), EngineError> {
    if git::current_branch(root).await? != base {
        git_step(root, &["checkout", base]).await?;
    }

    let message = format!("ppg: merge {name} ({branch})");
    match strategy {
        MergeStrategy::Squash => {
            git_step(root, &["merge", "--squash", branch]).await?;
            git_step(root, &["commit", "-m", &message]).await?;
        }
        MergeStrategy::NoFf => {
            git_step(root, &["merge", "--no-ff", branch, "-m", &message]).await?;
        }
    }
    Ok(())
}

/// A failed Git command inside the merge is a `MergeFailed`, carrying
/// the tool's stderr.
async fn git_step(root: &Path, args: &[&str]) -> Result<(), EngineError> {
    match git::run_git(root, args).await {
        Ok(_) => Ok(()),
        Err(EngineError::InvalidArgs(msg)) => Err(EngineError::MergeFailed(msg)),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
#[path = "merge_tests.rs"]
mod tests;
