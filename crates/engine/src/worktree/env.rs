// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worktree environment setup: env-file copies and the node_modules
//! symlink. All best-effort; a worktree without its env files is still
//! usable.

use std::path::Path;

/// What to carry from the project root into a fresh worktree.
#[derive(Debug, Clone, Default)]
pub struct EnvSetup {
    /// File names copied verbatim from the project root (e.g. `.env`).
    pub copy_files: Vec<String>,
    /// Symlink `node_modules` from the project root.
    pub link_node_modules: bool,
}

/// Copy env files and link node_modules into `wt_path`.
pub async fn setup_worktree_env(project_root: &Path, wt_path: &Path, env: &EnvSetup) {
    for name in &env.copy_files {
        let src = project_root.join(name);
        let dst = wt_path.join(name);
        if !src.exists() {
            continue;
        }
        if let Err(e) = tokio::fs::copy(&src, &dst).await {
            tracing::warn!(file = %name, error = %e, "env copy failed");
        }
    }

    if env.link_node_modules {
        let src = project_root.join("node_modules");
        let dst = wt_path.join("node_modules");
        // Skip when anything already sits at the destination.
        if src.exists() && tokio::fs::symlink_metadata(&dst).await.is_err() {
            if let Err(e) = tokio::fs::symlink(&src, &dst).await {
                tracing::warn!(error = %e, "node_modules symlink failed");
            }
        }
    }
}

#[cfg(test)]
#[path = "env_tests.rs"]
mod tests;
