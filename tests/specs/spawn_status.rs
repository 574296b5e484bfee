// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Spawn an agent, watch its status flip to idle end to end: engine
//! derivation, the watcher's change event, and the manifest refresh.

use crate::prelude::Project;
use ppg_core::{AgentStatus, SystemClock};
use ppg_daemon::{ManifestWatcher, WatchEvent, WatcherOptions};
use ppg_engine::agent::{
    agent_status, refresh_all_statuses, spawn_agents_in_worktree, AgentConfig, BatchSpawnSpec,
    Placement,
};
use ppg_engine::worktree::{create, CreateParams};
use ppg_pm::FakePm;
use std::sync::Arc;
use std::time::Duration;

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn spawn_then_status_flip_to_idle() {
    let project = Project::new().await;
    let pm = Arc::new(FakePm::new());

    let wt = create(
        project.root(),
        pm.as_ref(),
        &SystemClock,
        CreateParams { name: "feature-a".to_string(), ..CreateParams::default() },
    )
    .await
    .unwrap();
    assert_eq!(wt.branch, "ppg/feature-a");

    let agents = spawn_agents_in_worktree(
        project.root(),
        pm.as_ref(),
        &SystemClock,
        "feature-a",
        BatchSpawnSpec {
            count: 1,
            config: AgentConfig::default(),
            prompt_text: "Do X".to_string(),
            placement: Placement::Windows,
        },
    )
    .await
    .unwrap();
    let agent = &agents[0];
    assert_eq!(agent.status, AgentStatus::Running);
    assert_eq!(agent.prompt, "Do X");

    // Watcher online before the flip so it can observe it.
    let (watcher, mut events) = ManifestWatcher::start(
        project.root(),
        Arc::clone(&pm) as Arc<dyn ppg_pm::Pm>,
        WatcherOptions {
            debounce: Duration::from_millis(30),
            poll_interval: Duration::from_millis(40),
        },
        Arc::new(|e| eprintln!("watcher error: {e}")),
    )
    .unwrap();

    // The agent's process drops back to its shell.
    pm.set_pane_command(&agent.tmux_target, "zsh");

    // Live derivation flips immediately.
    let (status, _) = agent_status(pm.as_ref(), &agent.tmux_target).await.unwrap();
    assert_eq!(status, AgentStatus::Idle);

    // The watcher reports the flip with the prior status attached.
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        let remaining = deadline
            .checked_duration_since(tokio::time::Instant::now())
            .expect("no agent:status event before deadline");
        match tokio::time::timeout(remaining, events.recv()).await {
            Ok(Some(WatchEvent::AgentStatus { agent_id, status, previous_status, .. })) => {
                assert_eq!(agent_id, agent.id);
                assert_eq!(status, AgentStatus::Idle);
                assert_eq!(previous_status, AgentStatus::Running);
                break;
            }
            Ok(Some(_)) => continue,
            Ok(None) | Err(_) => panic!("no agent:status event"),
        }
    }
    watcher.stop();

    // Batch refresh persists the flip in place.
    let changes = refresh_all_statuses(project.root(), pm.as_ref(), &SystemClock)
        .await
        .unwrap();
    assert_eq!(changes.len(), 1);
    assert_eq!(changes[0].status, AgentStatus::Idle);
    assert_eq!(changes[0].previous, AgentStatus::Running);

    let manifest = project.manifest();
    let (_, stored) = manifest.find_agent(&agent.id).unwrap();
    assert_eq!(stored.status, AgentStatus::Idle);
}
