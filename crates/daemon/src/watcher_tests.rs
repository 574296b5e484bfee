// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use chrono::Utc;
use ppg_core::{Manifest, Worktree, WorktreeStatus};
use ppg_pm::{FakePm, PaneInfo};
use std::collections::BTreeMap;
use std::time::Instant;

fn fast_opts() -> WatcherOptions {
    WatcherOptions {
        debounce: Duration::from_millis(50),
        poll_interval: Duration::from_millis(50),
    }
}

fn noop_errors() -> ErrorCallback {
    Arc::new(|_| {})
}

fn init_manifest_with_agent(root: &Path) {
    let mut manifest = Manifest::new(root, "ppg", Utc::now());
    let wt_path = root.join(".ppg/worktrees/feature-a");
    std::fs::create_dir_all(&wt_path).unwrap();
    let mut agents = BTreeMap::new();
    let agent = ppg_core::Agent {
        id: AgentId::from_string("ag-00000001"),
        name: "claude-1".to_string(),
        agent_type: "claude".to_string(),
        status: AgentStatus::Running,
        tmux_target: "ppg:1.0".to_string(),
        prompt: "Do X".to_string(),
        session_id: None,
        started_at: Utc::now(),
        exit_code: None,
        completed_at: None,
    };
    agents.insert(agent.id, agent);
    manifest
        .insert_worktree(Worktree {
            id: WorktreeId::from_string("wt-abc12345"),
            name: "feature-a".to_string(),
            path: wt_path,
            branch: "ppg/feature-a".to_string(),
            base_branch: "main".to_string(),
            status: WorktreeStatus::Active,
            tmux_window: "ppg:1".to_string(),
            merged_at: None,
            pr_url: None,
            created_at: Utc::now(),
            agents,
        })
        .unwrap();
    ppg_store::init_manifest(root, manifest).unwrap();
}

async fn next_event(
    rx: &mut tokio::sync::mpsc::UnboundedReceiver<WatchEvent>,
    within: Duration,
) -> Option<WatchEvent> {
    tokio::time::timeout(within, rx.recv()).await.ok().flatten()
}

#[tokio::test]
async fn manifest_write_emits_debounced_update() {
    let dir = tempfile::tempdir().unwrap();
    init_manifest_with_agent(dir.path());
    let pm = Arc::new(FakePm::new());
    pm.add_pane(
        &["ppg:1.0"],
        PaneInfo {
            pane_id: "%1".to_string(),
            pane_pid: Some(1),
            current_command: "claude".to_string(),
            is_dead: false,
            dead_status: None,
        },
    );

    let (watcher, mut rx) =
        ManifestWatcher::start(dir.path(), pm, fast_opts(), noop_errors()).unwrap();

    // Touch the manifest through the store (atomic rename).
    ppg_store::update_manifest::<_, ppg_store::StoreError, _, _>(dir.path(), |mut m| async move {
        m.session_name = "ppg-renamed".to_string();
        Ok((m, ()))
    })
    .await
    .unwrap();

    let mut saw_update = false;
    for _ in 0..10 {
        match next_event(&mut rx, Duration::from_secs(2)).await {
            Some(WatchEvent::ManifestUpdated(m)) => {
                if m.session_name == "ppg-renamed" {
                    saw_update = true;
                    break;
                }
            }
            Some(_) => continue,
            None => break,
        }
    }
    assert!(saw_update, "debounced manifest update never arrived");
    watcher.stop();
}

#[tokio::test]
async fn poll_emits_status_change_with_previous() {
    let dir = tempfile::tempdir().unwrap();
    init_manifest_with_agent(dir.path());
    let pm = Arc::new(FakePm::new());
    pm.add_pane(
        &["ppg:1.0"],
        PaneInfo {
            pane_id: "%1".to_string(),
            pane_pid: Some(1),
            current_command: "claude".to_string(),
            is_dead: false,
            dead_status: None,
        },
    );

    let (watcher, mut rx) =
        ManifestWatcher::start(dir.path(), Arc::clone(&pm) as Arc<dyn Pm>, fast_opts(), noop_errors())
            .unwrap();

    // Flip the pane to an idle shell; the poller must report the flip
    // against the previously recorded status.
    pm.set_pane_command("ppg:1.0", "zsh");

    let mut status_event = None;
    for _ in 0..20 {
        match next_event(&mut rx, Duration::from_secs(2)).await {
            Some(WatchEvent::AgentStatus { agent_id, status, previous_status, .. }) => {
                status_event = Some((agent_id, status, previous_status));
                break;
            }
            Some(_) => continue,
            None => break,
        }
    }
    let (agent_id, status, previous) = status_event.expect("no agent:status event");
    assert_eq!(agent_id.as_str(), "ag-00000001");
    assert_eq!(status, AgentStatus::Idle);
    assert_eq!(previous, AgentStatus::Running);

    watcher.stop();
}

#[tokio::test]
async fn poll_errors_go_to_callback_and_do_not_kill_watcher() {
    let dir = tempfile::tempdir().unwrap();
    // No manifest at all: every tick errors.
    std::fs::create_dir_all(dir.path().join(".ppg")).unwrap();
    let errors: Arc<parking_lot::Mutex<Vec<String>>> =
        Arc::new(parking_lot::Mutex::new(Vec::new()));
    let sink = Arc::clone(&errors);
    let on_error: ErrorCallback = Arc::new(move |msg| sink.lock().push(msg));

    let pm = Arc::new(FakePm::new());
    let (watcher, _rx) =
        ManifestWatcher::start(dir.path(), pm, fast_opts(), on_error).unwrap();

    let deadline = Instant::now() + Duration::from_secs(3);
    while errors.lock().len() < 2 && Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    // More than one error proves the loop survived the first failure.
    assert!(errors.lock().len() >= 2, "watcher died after first error");
    watcher.stop();
}

#[tokio::test]
async fn stop_halts_all_events() {
    let dir = tempfile::tempdir().unwrap();
    init_manifest_with_agent(dir.path());
    let pm = Arc::new(FakePm::new());

    let (watcher, mut rx) =
        ManifestWatcher::start(dir.path(), Arc::clone(&pm) as Arc<dyn Pm>, fast_opts(), noop_errors())
            .unwrap();
    watcher.stop();
    // Give any in-flight tick a moment, then drain.
    tokio::time::sleep(Duration::from_millis(150)).await;
    while rx.try_recv().is_ok() {}

    // Provoke both legs: file change + status change.
    pm.add_pane(
        &["ppg:1.0"],
        PaneInfo {
            pane_id: "%1".to_string(),
            pane_pid: Some(1),
            current_command: "zsh".to_string(),
            is_dead: false,
            dead_status: None,
        },
    );
    ppg_store::update_manifest::<_, ppg_store::StoreError, _, _>(dir.path(), |mut m| async move {
        m.session_name = "changed".to_string();
        Ok((m, ()))
    })
    .await
    .unwrap();

    let got = next_event(&mut rx, Duration::from_millis(300)).await;
    assert!(got.is_none(), "event after stop: {got:?}");
}
