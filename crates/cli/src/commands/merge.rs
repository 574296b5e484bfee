// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `ppg merge` / `ppg pr`.

use crate::exit_error::ExitError;
use crate::output::OutputMode;
use clap::Args;
use ppg_core::{ErrorCode, SystemClock};
use ppg_engine::worktree::{perform_merge, MergeOptions, MergeStrategy};
use std::path::Path;

#[derive(Args)]
pub struct MergeArgs {
    /// Worktree id, name, or branch
    pub worktree: String,

    /// Merge strategy
    #[arg(long, default_value = "squash", value_parser = parse_strategy)]
    pub strategy: MergeStrategy,

    /// Leave the worktree in place after merging
    #[arg(long)]
    pub no_cleanup: bool,

    /// Report without touching Git or the manifest
    #[arg(long)]
    pub dry_run: bool,

    /// Merge even while agents are running
    #[arg(long)]
    pub force: bool,
}

fn parse_strategy(raw: &str) -> Result<MergeStrategy, String> {
    match raw {
        "squash" => Ok(MergeStrategy::Squash),
        "no-ff" => Ok(MergeStrategy::NoFf),
        other => Err(format!("unknown strategy {other:?} (squash|no-ff)")),
    }
}

pub async fn run(root: &Path, args: MergeArgs, mode: OutputMode) -> Result<(), ExitError> {
    let pm = ppg_pm::detect_backend().await;
    let outcome = perform_merge(
        root,
        pm.as_ref(),
        &SystemClock,
        &args.worktree,
        MergeOptions {
            strategy: args.strategy,
            force: args.force,
            dry_run: args.dry_run,
            no_cleanup: args.no_cleanup,
        },
    )
    .await?;

    let verb = if outcome.dry_run { "would merge" } else { "merged" };
    mode.success(
        &format!("{verb} {} into {}", outcome.branch, outcome.base_branch),
        &serde_json::json!({
            "worktree": outcome.worktree_id,
            "branch": outcome.branch,
            "baseBranch": outcome.base_branch,
            "dryRun": outcome.dry_run,
            "cleaned": outcome.cleanup.is_some(),
        }),
    );
    Ok(())
}

#[derive(Args)]
pub struct PrArgs {
    /// Worktree id, name, or branch
    pub worktree: String,

    #[arg(long)]
    pub title: Option<String>,

    #[arg(long)]
    pub body: Option<String>,

    /// Open as draft
    #[arg(long)]
    pub draft: bool,
}

/// Create a GitHub PR for the worktree branch via the `gh` CLI and
/// record its URL in the manifest.
pub async fn pr(root: &Path, args: PrArgs, mode: OutputMode) -> Result<(), ExitError> {
    let manifest = ppg_store::read_manifest(root)?;
    let wt = manifest.resolve_worktree(&args.worktree).ok_or_else(|| {
        ExitError::new(ErrorCode::WorktreeNotFound, format!("no worktree {}", args.worktree))
    })?;
    let (wt_id, wt_path, branch, base) =
        (wt.id, wt.path.clone(), wt.branch.clone(), wt.base_branch.clone());

    // Push the branch, then ask gh for a PR.
    let push = tokio::process::Command::new("git")
        .args(["push", "-u", "origin", &branch])
        .current_dir(&wt_path)
        .output()
        .await?;
    if !push.status.success() {
        return Err(ExitError::internal(format!(
            "git push failed: {}",
            String::from_utf8_lossy(&push.stderr).trim()
        )));
    }

    let title = args
        .title
        .unwrap_or_else(|| format!("ppg: {branch}"));
    let mut cmd = tokio::process::Command::new("gh");
    cmd.args(["pr", "create", "--head", &branch, "--base", &base, "--title", &title])
        .current_dir(&wt_path);
    match args.body {
        Some(body) => {
            cmd.args(["--body", &body]);
        }
        None => {
            cmd.args(["--body", ""]);
        }
    }
    if args.draft {
        cmd.arg("--draft");
    }
    let output = cmd.output().await?;
    if !output.status.success() {
        return Err(ExitError::internal(format!(
            "gh pr create failed: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }
    let url = String::from_utf8_lossy(&output.stdout).trim().to_string();

    let recorded = url.clone();
    ppg_store::update_manifest::<_, ppg_store::StoreError, _, _>(root, |mut m| async move {
        if let Some(wt) = m.worktrees.get_mut(&wt_id) {
            wt.pr_url = Some(recorded);
        }
        Ok((m, ()))
    })
    .await?;

    mode.success(&url, &serde_json::json!({ "worktree": wt_id, "prUrl": url }));
    Ok(())
}
