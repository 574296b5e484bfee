// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::test_support::{init_project, insert_agent, insert_worktree, test_agent, test_worktree};
use ppg_core::{AgentStatus, SystemClock};
use ppg_pm::{FakeCall, FakePm};

fn fast_opts() -> RestartOptions {
    RestartOptions { grace: Duration::from_millis(10), ..RestartOptions::default() }
}

#[tokio::test]
async fn restart_swaps_records_and_reuses_prompt() {
    let dir = init_project();
    insert_worktree(dir.path(), test_worktree(dir.path(), "wt-abc12345", "feature-a")).await;
    insert_agent(dir.path(), "wt-abc12345", test_agent("ag-00000001", "ppg:1.0")).await;

    // Prompt snapshot from the original spawn.
    let prompts = dir.path().join(".ppg/agent-prompts");
    std::fs::create_dir_all(&prompts).unwrap();
    std::fs::write(prompts.join("ag-00000001.md"), "original prompt").unwrap();

    let pm = FakePm::new();
    let fresh = restart_agent(dir.path(), &pm, &SystemClock, "ag-00000001", fast_opts())
        .await
        .unwrap();

    assert_ne!(fresh.id.as_str(), "ag-00000001");
    assert_eq!(fresh.prompt, "original prompt");
    assert_eq!(fresh.status, AgentStatus::Running);

    // New window is named for the worktree restart.
    let windows = pm.calls_of(|c| matches!(c, FakeCall::CreateWindow { .. }));
    let FakeCall::CreateWindow { name, .. } = &windows[0] else { unreachable!() };
    assert_eq!(name, "feature-a-restart");

    let m = ppg_store::read_manifest(dir.path()).unwrap();
    let (_, old) = m.find_agent("ag-00000001").unwrap();
    assert_eq!(old.status, AgentStatus::Gone);
    let wt = m.resolve_worktree("feature-a").unwrap();
    assert_eq!(wt.agents.len(), 2);
}

#[tokio::test]
async fn restart_with_override_skips_prompt_file() {
    let dir = init_project();
    insert_worktree(dir.path(), test_worktree(dir.path(), "wt-abc12345", "feature-a")).await;
    insert_agent(dir.path(), "wt-abc12345", test_agent("ag-00000001", "ppg:1.0")).await;

    let pm = FakePm::new();
    let opts = RestartOptions {
        prompt_override: Some("new mission".to_string()),
        ..fast_opts()
    };
    let fresh = restart_agent(dir.path(), &pm, &SystemClock, "ag-00000001", opts)
        .await
        .unwrap();
    assert_eq!(fresh.prompt, "new mission");
}

#[tokio::test]
async fn restart_without_prompt_file_fails() {
    let dir = init_project();
    insert_worktree(dir.path(), test_worktree(dir.path(), "wt-abc12345", "feature-a")).await;
    insert_agent(dir.path(), "wt-abc12345", test_agent("ag-00000001", "ppg:1.0")).await;

    let pm = FakePm::new();
    let err = restart_agent(dir.path(), &pm, &SystemClock, "ag-00000001", fast_opts())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::PromptNotFound(_)));
}

#[tokio::test]
async fn restart_unknown_agent_fails() {
    let dir = init_project();
    let pm = FakePm::new();
    let err = restart_agent(dir.path(), &pm, &SystemClock, "ag-99999999", fast_opts())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::AgentNotFound(_)));
}

#[tokio::test]
async fn resume_requires_session_id() {
    let dir = init_project();
    insert_worktree(dir.path(), test_worktree(dir.path(), "wt-abc12345", "feature-a")).await;
    insert_agent(dir.path(), "wt-abc12345", test_agent("ag-00000001", "ppg:1.0")).await;

    let pm = FakePm::new();
    let err = resume_agent(dir.path(), &pm, "ag-00000001", AgentConfig::default())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::NoSessionId(_)));
}

#[tokio::test]
async fn resume_replaces_pane_target_atomically() {
    let dir = init_project();
    insert_worktree(dir.path(), test_worktree(dir.path(), "wt-abc12345", "feature-a")).await;
    let mut agent = test_agent("ag-00000001", "ppg:1.0");
    agent.session_id = Some("sess-42".to_string());
    agent.status = AgentStatus::Exited;
    insert_agent(dir.path(), "wt-abc12345", agent).await;

    let pm = FakePm::new();
    let new_target = resume_agent(dir.path(), &pm, "ag-00000001", AgentConfig::default())
        .await
        .unwrap();
    assert_ne!(new_target, "ppg:1.0");

    // Resume flag + recorded session id on the exec line.
    let sends = pm.calls_of(|c| matches!(c, FakeCall::SendKeys { .. }));
    let FakeCall::SendKeys { command, .. } = &sends[0] else { unreachable!() };
    assert_eq!(command, "unset CLAUDECODE; claude --resume sess-42");

    let m = ppg_store::read_manifest(dir.path()).unwrap();
    let (_, agent) = m.find_agent("ag-00000001").unwrap();
    assert_eq!(agent.tmux_target, new_target);
    assert_eq!(agent.status, AgentStatus::Running);
    assert_eq!(agent.exit_code, None);
}
