// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `ppg init`: create `.ppg/` state for a repository.

use crate::exit_error::ExitError;
use crate::output::OutputMode;
use ppg_core::{Clock, Manifest, ProjectPaths, SystemClock};
use ppg_pm::sanitize_name;
use std::path::Path;

pub async fn run(root: &Path, mode: OutputMode) -> Result<(), ExitError> {
    let paths = ProjectPaths::new(root);

    let dir_name = root
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "project".to_string());
    let session_name = format!("ppg-{}", sanitize_name(&dir_name));

    let manifest = Manifest::new(root, &session_name, SystemClock.now_utc());
    let manifest = ppg_store::init_manifest(root, manifest).map_err(|e| match e {
        ppg_store::StoreError::Io(ref io)
            if io.kind() == std::io::ErrorKind::AlreadyExists =>
        {
            ExitError::new(
                ppg_core::ErrorCode::InvalidArgs,
                format!("already initialized ({})", paths.manifest.display()),
            )
        }
        other => other.into(),
    })?;

    for dir in [
        &paths.logs_dir,
        &paths.results_dir,
        &paths.worktrees_dir,
        &paths.prompts_dir,
        &paths.templates_dir,
        &paths.swarms_dir,
        &paths.agent_prompts_dir,
    ] {
        std::fs::create_dir_all(dir)?;
    }

    mode.success(
        &format!("initialized {} (session {})", paths.ppg_dir.display(), session_name),
        &serde_json::json!({
            "manifest": paths.manifest,
            "sessionName": manifest.session_name,
        }),
    );
    Ok(())
}
