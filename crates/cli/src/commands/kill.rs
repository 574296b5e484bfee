// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `ppg kill` / `ppg reset` / `ppg clean`.

use crate::exit_error::ExitError;
use crate::output::OutputMode;
use clap::Args;
use ppg_core::ErrorCode;
use ppg_engine::agent::kill_agents;
use ppg_engine::worktree::{clean_finished, cleanup_worktree, reset_all};
use ppg_engine::KILL_GRACE;
use std::path::Path;

#[derive(Args)]
pub struct KillArgs {
    /// Worktree or agent reference; all worktrees when omitted
    pub target: Option<String>,

    /// Remove the worktree(s) after killing
    #[arg(long)]
    pub remove: bool,

    /// Also delete the branch (implied by --remove)
    #[arg(long)]
    pub delete: bool,

    /// When killing everything, include worktrees with open PRs
    #[arg(long)]
    pub include_open_prs: bool,
}

pub async fn run(root: &Path, args: KillArgs, mode: OutputMode) -> Result<(), ExitError> {
    let pm = ppg_pm::detect_backend().await;
    let manifest = ppg_store::read_manifest(root)?;

    // Resolve targets: one agent, one worktree, or every worktree.
    let worktree_refs: Vec<String> = match &args.target {
        Some(target) => {
            if let Some((_, agent)) = manifest.find_agent(target) {
                let summary =
                    kill_agents(pm.as_ref(), &[agent.tmux_target.clone()], KILL_GRACE).await;
                mode.success(
                    &format!("killed agent {target} ({} pane(s))", summary.killed()),
                    &serde_json::json!({ "agent": target, "killed": summary.killed() }),
                );
                return Ok(());
            }
            let wt = manifest.resolve_worktree(target).ok_or_else(|| {
                ExitError::new(ErrorCode::WorktreeNotFound, format!("no worktree {target}"))
            })?;
            vec![wt.id.to_string()]
        }
        None => manifest
            .worktrees
            .values()
            .filter(|wt| args.include_open_prs || wt.pr_url.is_none())
            .map(|wt| wt.id.to_string())
            .collect(),
    };

    let mut killed = 0usize;
    let mut removed = 0usize;
    for wt_ref in &worktree_refs {
        let manifest = ppg_store::read_manifest(root)?;
        let Some(wt) = manifest.resolve_worktree(wt_ref) else { continue };
        let targets: Vec<String> =
            wt.agents.values().map(|a| a.tmux_target.clone()).collect();
        let summary = kill_agents(pm.as_ref(), &targets, KILL_GRACE).await;
        killed += summary.killed();

        if args.remove || args.delete {
            cleanup_worktree(root, pm.as_ref(), wt_ref).await?;
            removed += 1;
        }
    }

    mode.success(
        &format!(
            "killed {killed} agent pane(s) across {} worktree(s){}",
            worktree_refs.len(),
            if removed > 0 { format!(", removed {removed}") } else { String::new() }
        ),
        &serde_json::json!({
            "worktrees": worktree_refs,
            "killed": killed,
            "removed": removed,
        }),
    );
    Ok(())
}

pub async fn reset(root: &Path, mode: OutputMode) -> Result<(), ExitError> {
    let pm = ppg_pm::detect_backend().await;
    let report = reset_all(root, pm.as_ref()).await?;
    mode.success(
        &format!(
            "reset: cleaned {} worktree(s), killed {} orphan window(s)",
            report.worktrees_cleaned, report.orphan_windows_killed
        ),
        &serde_json::json!({
            "worktreesCleaned": report.worktrees_cleaned,
            "orphanWindowsKilled": report.orphan_windows_killed,
        }),
    );
    Ok(())
}

pub async fn clean(root: &Path, mode: OutputMode) -> Result<(), ExitError> {
    let pm = ppg_pm::detect_backend().await;
    let reports = clean_finished(root, pm.as_ref()).await?;
    mode.success(
        &format!("cleaned {} worktree(s)", reports.len()),
        &serde_json::json!({ "cleaned": reports.len() }),
    );
    Ok(())
}
