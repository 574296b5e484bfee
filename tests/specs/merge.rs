// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Merge scenarios against a real repository.

use crate::prelude::Project;
use ppg_core::{SystemClock, WorktreeStatus};
use ppg_engine::worktree::{create, perform_merge, CreateParams, MergeOptions};
use ppg_engine::EngineError;
use ppg_pm::FakePm;
use ppg_store::update_manifest;

async fn project_with_worktree() -> (Project, FakePm, ppg_core::WorktreeId) {
    let project = Project::new().await;
    let pm = FakePm::new();
    let wt = create(
        project.root(),
        &pm,
        &SystemClock,
        CreateParams { name: "feature-a".to_string(), ..CreateParams::default() },
    )
    .await
    .unwrap();

    // One commit of agent work on the branch.
    let wt_path = wt.path.clone();
    project.file(".ppg/worktrees/feature-a/feat.txt", "feature\n");
    project.git_in(&wt_path, &["add", "."]).await;
    project.git_in(&wt_path, &["commit", "-m", "agent work"]).await;

    (project, pm, wt.id)
}

#[tokio::test]
async fn squash_merge_walks_active_merging_merged_cleaned() {
    let (project, pm, wt_id) = project_with_worktree().await;

    let outcome = perform_merge(
        project.root(),
        &pm,
        &SystemClock,
        "feature-a",
        MergeOptions::default(),
    )
    .await
    .unwrap();
    assert!(outcome.cleanup.is_some());

    // Commit message format and the feature file on main.
    let log = project.git(&["log", "--oneline", "-1"]).await;
    assert!(log.contains("ppg: merge feature-a (ppg/feature-a)"), "log: {log}");
    assert!(project.root().join("feat.txt").exists());

    let manifest = project.manifest();
    let wt = manifest.worktrees.get(&wt_id).unwrap();
    assert_eq!(wt.status, WorktreeStatus::Cleaned);
    let merged_at = wt.merged_at.expect("mergedAt set");
    // RFC 3339 on the wire.
    let json = serde_json::to_value(wt).unwrap();
    let raw = json["mergedAt"].as_str().unwrap();
    assert_eq!(
        chrono::DateTime::parse_from_rfc3339(raw).unwrap().timestamp(),
        merged_at.timestamp()
    );
}

#[tokio::test]
async fn merge_refuses_running_agent_without_force() {
    let (project, pm, wt_id) = project_with_worktree().await;

    update_manifest::<_, ppg_store::StoreError, _, _>(project.root(), |mut m| async move {
        let agent = ppg_core::Agent {
            id: ppg_core::AgentId::from_string("ag-00000001"),
            name: "claude-1".to_string(),
            agent_type: "claude".to_string(),
            status: ppg_core::AgentStatus::Running,
            tmux_target: "ppg:1.0".to_string(),
            prompt: String::new(),
            session_id: None,
            started_at: chrono::Utc::now(),
            exit_code: None,
            completed_at: None,
        };
        m.insert_agent(&wt_id, agent).unwrap();
        Ok((m, ()))
    })
    .await
    .unwrap();

    let head_before = project.git(&["rev-parse", "HEAD"]).await;
    let err = perform_merge(
        project.root(),
        &pm,
        &SystemClock,
        "feature-a",
        MergeOptions::default(),
    )
    .await
    .unwrap_err();

    let EngineError::AgentsRunning(ids) = &err else { panic!("wrong error: {err}") };
    assert!(ids.contains("ag-00000001"));
    assert_eq!(
        project.manifest().worktrees.get(&wt_id).unwrap().status,
        WorktreeStatus::Active
    );
    assert_eq!(project.git(&["rev-parse", "HEAD"]).await, head_before);
}

#[tokio::test]
async fn dry_run_changes_nothing() {
    let (project, pm, _) = project_with_worktree().await;
    let before = project.manifest();

    let outcome = perform_merge(
        project.root(),
        &pm,
        &SystemClock,
        "feature-a",
        MergeOptions { dry_run: true, ..MergeOptions::default() },
    )
    .await
    .unwrap();
    assert!(outcome.dry_run);
    assert_eq!(project.manifest(), before);
}
