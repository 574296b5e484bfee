// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worktree lifecycle: create/adopt, merge, cleanup, reset.

mod cleanup;
mod env;
pub mod git;
mod merge;

pub use cleanup::{cleanup_worktree, CleanupReport};
pub use env::{setup_worktree_env, EnvSetup};
pub use git::RemoveOptions;
pub use merge::{perform_merge, MergeOptions, MergeOutcome, MergeStrategy};

use crate::EngineError;
use ppg_core::{Clock, ProjectPaths, Worktree, WorktreeId, WorktreeStatus};
use ppg_pm::{sanitize_name, Pm};
use std::collections::BTreeMap;
use std::path::Path;

/// Parameters for creating a fresh worktree.
#[derive(Debug, Clone, Default)]
pub struct CreateParams {
    pub name: String,
    /// Base branch; defaults to the repository's current branch.
    pub base: Option<String>,
    pub env: EnvSetup,
}

/// Create branch + worktree + window and register the skeleton entry
/// (no agents yet) in the manifest. Partial failures after registration
/// leave a cleanable record.
pub async fn create<C: Clock>(
    root: &Path,
    pm: &dyn Pm,
    clock: &C,
    params: CreateParams,
) -> Result<Worktree, EngineError> {
    let name = sanitize_name(&params.name);
    if name.is_empty() {
        return Err(EngineError::InvalidArgs("worktree name must not be empty".into()));
    }
    let paths = ProjectPaths::new(root);
    let branch = format!("ppg/{name}");
    let base = match params.base {
        Some(base) => base,
        None => git::current_branch(root).await?,
    };
    let path = paths.worktree_dir(&name);

    git::create_worktree(root, &path, &branch, &base).await?;
    setup_worktree_env(root, &path, &params.env).await;

    let manifest = ppg_store::read_manifest(root)?;
    let session = manifest.session_name.clone();
    pm.ensure_session(&session).await?;
    let window = pm.create_window(&session, &name, &path).await?;

    let wt = Worktree {
        id: WorktreeId::new(),
        name,
        path,
        branch,
        base_branch: base,
        status: WorktreeStatus::Active,
        tmux_window: window,
        merged_at: None,
        pr_url: None,
        created_at: clock.now_utc(),
        agents: BTreeMap::new(),
    };

    let recorded = wt.clone();
    ppg_store::update_manifest::<_, EngineError, _, _>(root, |mut m| async move {
        m.insert_worktree(recorded)?;
        Ok((m, ()))
    })
    .await?;

    Ok(wt)
}

/// Register a worktree for an existing branch and adopt it into the
/// manifest.
pub async fn adopt<C: Clock>(
    root: &Path,
    pm: &dyn Pm,
    clock: &C,
    branch: &str,
    base: Option<String>,
) -> Result<Worktree, EngineError> {
    let name = sanitize_name(branch.strip_prefix("ppg/").unwrap_or(branch));
    let paths = ProjectPaths::new(root);
    let path = paths.worktree_dir(&name);
    let base = match base {
        Some(base) => base,
        None => git::current_branch(root).await?,
    };

    git::adopt_worktree(root, &path, branch).await?;

    let manifest = ppg_store::read_manifest(root)?;
    let session = manifest.session_name.clone();
    pm.ensure_session(&session).await?;
    let window = pm.create_window(&session, &name, &path).await?;

    let wt = Worktree {
        id: WorktreeId::new(),
        name,
        path,
        branch: branch.to_string(),
        base_branch: base,
        status: WorktreeStatus::Active,
        tmux_window: window,
        merged_at: None,
        pr_url: None,
        created_at: clock.now_utc(),
        agents: BTreeMap::new(),
    };

    let recorded = wt.clone();
    ppg_store::update_manifest::<_, EngineError, _, _>(root, |mut m| async move {
        m.insert_worktree(recorded)?;
        Ok((m, ()))
    })
    .await?;

    Ok(wt)
}

/// Outcome of a full reset.
#[derive(Debug, Default, Clone)]
pub struct ResetReport {
    pub worktrees_cleaned: usize,
    pub orphan_windows_killed: usize,
    pub cleanups: Vec<CleanupReport>,
}

/// Kill everything: clean up every worktree, then sweep orphan windows
/// out of the project session (skipping the caller's own pane).
pub async fn reset_all(root: &Path, pm: &dyn Pm) -> Result<ResetReport, EngineError> {
    let manifest = ppg_store::read_manifest(root)?;
    let session = manifest.session_name.clone();
    let refs: Vec<String> =
        manifest.worktrees.values().map(|wt| wt.id.to_string()).collect();

    let mut report = ResetReport::default();
    for wt_ref in refs {
        match cleanup_worktree(root, pm, &wt_ref).await {
            Ok(cleanup) => {
                report.worktrees_cleaned += 1;
                report.cleanups.push(cleanup);
            }
            Err(e) => tracing::warn!(worktree = %wt_ref, error = %e, "reset: cleanup failed"),
        }
    }

    if pm.session_exists(&session).await? {
        let self_pane = crate::self_protect::self_pane();
        report.orphan_windows_killed = pm
            .kill_orphan_windows(&session, &[], self_pane.as_deref())
            .await?;
    }
    Ok(report)
}

/// Clean up every worktree already merged (or failed past saving).
pub async fn clean_finished(root: &Path, pm: &dyn Pm) -> Result<Vec<CleanupReport>, EngineError> {
    let manifest = ppg_store::read_manifest(root)?;
    let refs: Vec<String> = manifest
        .worktrees
        .values()
        .filter(|wt| {
            matches!(wt.status, WorktreeStatus::Merged | WorktreeStatus::Failed)
        })
        .map(|wt| wt.id.to_string())
        .collect();

    let mut reports = Vec::new();
    for wt_ref in refs {
        reports.push(cleanup_worktree(root, pm, &wt_ref).await?);
    }
    Ok(reports)
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
