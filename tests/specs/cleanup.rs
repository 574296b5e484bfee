// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Self-protected cleanup: the caller's own pane survives.

use crate::prelude::Project;
use ppg_core::{SystemClock, WorktreeStatus};
use ppg_engine::worktree::{cleanup_worktree, create, CreateParams};
use ppg_pm::{FakeCall, FakePm, PaneInfo};
use serial_test::serial;

#[tokio::test]
#[serial]
async fn cleanup_skips_own_window_and_still_cleans_manifest() {
    std::env::set_var("TMUX_PANE", "%5");
    let project = Project::new().await;
    let pm = FakePm::new();

    let wt = create(
        project.root(),
        &pm,
        &SystemClock,
        CreateParams { name: "xyz".to_string(), ..CreateParams::default() },
    )
    .await
    .unwrap();
    // The caller sits inside this worktree's window.
    let own_pane = format!("{}.0", wt.tmux_window);
    pm.add_pane(
        &[own_pane.as_str(), "%5"],
        PaneInfo {
            pane_id: "%5".to_string(),
            pane_pid: Some(1234),
            current_command: "bash".to_string(),
            is_dead: false,
            dead_status: None,
        },
    );

    let report = cleanup_worktree(project.root(), &pm, "xyz").await.unwrap();
    std::env::remove_var("TMUX_PANE");

    assert!(report.self_protected);
    assert_eq!(report.tmux_killed, 0);
    assert_eq!(report.self_protected_targets, vec![wt.tmux_window.clone()]);
    assert!(pm.calls_of(|c| matches!(c, FakeCall::KillWindow(_))).is_empty());

    // The manifest checkpoint landed anyway.
    let manifest = project.manifest();
    assert_eq!(manifest.worktrees.get(&wt.id).unwrap().status, WorktreeStatus::Cleaned);
    // Git-level removal still ran (best-effort, past the checkpoint).
    assert!(!wt.path.exists());
}
