// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Git worktree and branch plumbing.
//!
//! Every invocation scrubs `GIT_DIR`/`GIT_WORK_TREE` so commands behave
//! the same whether the caller sits in the primary checkout or inside a
//! worktree.

use crate::subprocess::{run_with_timeout, stderr_of, GIT_TIMEOUT};
use crate::EngineError;
use std::path::{Path, PathBuf};
use tokio::process::Command;

fn git(repo: &Path) -> Command {
    let mut cmd = Command::new("git");
    cmd.arg("-C")
        .arg(repo)
        .env_remove("GIT_DIR")
        .env_remove("GIT_WORK_TREE");
    cmd
}

pub(crate) async fn run_git(repo: &Path, args: &[&str]) -> Result<String, EngineError> {
    let mut cmd = git(repo);
    cmd.args(args);
    let label = format!("git {}", args.first().copied().unwrap_or(""));
    let output = run_with_timeout(cmd, GIT_TIMEOUT, &label).await?;
    if output.status.success() {
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    } else {
        Err(EngineError::InvalidArgs(format!("{label}: {}", stderr_of(&output))))
    }
}

/// Repository toplevel for `cwd`; `NotGitRepo` when outside a checkout.
pub async fn repo_root(cwd: &Path) -> Result<PathBuf, EngineError> {
    let mut cmd = git(cwd);
    cmd.args(["rev-parse", "--show-toplevel"]);
    let output = run_with_timeout(cmd, GIT_TIMEOUT, "git rev-parse").await?;
    if output.status.success() {
        Ok(PathBuf::from(String::from_utf8_lossy(&output.stdout).trim()))
    } else {
        Err(EngineError::NotGitRepo(cwd.display().to_string()))
    }
}

pub async fn current_branch(repo: &Path) -> Result<String, EngineError> {
    let out = run_git(repo, &["rev-parse", "--abbrev-ref", "HEAD"]).await?;
    Ok(out.trim().to_string())
}

/// `git worktree add -b <branch> <path> <base>`.
pub async fn create_worktree(
    repo: &Path,
    path: &Path,
    branch: &str,
    base: &str,
) -> Result<(), EngineError> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let path_s = path.display().to_string();
    run_git(repo, &["worktree", "add", "-b", branch, &path_s, base]).await?;
    Ok(())
}

/// Register a worktree for an existing branch (no `-b`).
pub async fn adopt_worktree(repo: &Path, path: &Path, branch: &str) -> Result<(), EngineError> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let path_s = path.display().to_string();
    run_git(repo, &["worktree", "add", &path_s, branch]).await?;
    Ok(())
}

/// Options for [`remove_worktree`].
#[derive(Debug, Clone, Default)]
pub struct RemoveOptions {
    pub force: bool,
    pub delete_branch: bool,
    pub branch_name: Option<String>,
}

/// Unregister and delete a worktree; optionally delete its branch.
/// Branch-delete failures are logged, never fatal.
pub async fn remove_worktree(
    repo: &Path,
    path: &Path,
    opts: RemoveOptions,
) -> Result<(), EngineError> {
    let path_s = path.display().to_string();
    let mut args = vec!["worktree", "remove"];
    if opts.force {
        args.push("--force");
    }
    args.push(&path_s);
    run_git(repo, &args).await?;

    if opts.delete_branch {
        if let Some(branch) = opts.branch_name {
            if let Err(e) = run_git(repo, &["branch", "-D", &branch]).await {
                tracing::warn!(branch = %branch, error = %e, "branch delete failed (ignored)");
            }
        }
    }
    Ok(())
}

/// `git worktree prune`.
pub async fn prune(repo: &Path) -> Result<(), EngineError> {
    run_git(repo, &["worktree", "prune"]).await?;
    Ok(())
}

#[cfg(test)]
#[path = "git_tests.rs"]
mod tests;
