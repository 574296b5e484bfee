// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use chrono::TimeZone;
use yare::parameterized;

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 15, 12, 0, 0).single().unwrap()
}

fn worktree(id: &str, name: &str, branch: &str) -> Worktree {
    Worktree {
        id: WorktreeId::from_string(id),
        name: name.to_string(),
        path: PathBuf::from(format!("/r/.ppg/worktrees/{name}")),
        branch: branch.to_string(),
        base_branch: "main".to_string(),
        status: WorktreeStatus::Active,
        tmux_window: format!("ppg:{name}"),
        merged_at: None,
        pr_url: None,
        created_at: now(),
        agents: BTreeMap::new(),
    }
}

fn agent(id: &str) -> Agent {
    Agent {
        id: AgentId::from_string(id),
        name: "claude-1".to_string(),
        agent_type: "claude".to_string(),
        status: AgentStatus::Running,
        tmux_target: "ppg:1.0".to_string(),
        prompt: "Do X".to_string(),
        session_id: None,
        started_at: now(),
        exit_code: None,
        completed_at: None,
    }
}

#[test]
fn resolve_prefers_id_over_name_and_branch() {
    let mut m = Manifest::new("/r", "ppg", now());
    let mut a = worktree("wt-aaaaaaaa", "feature-a", "ppg/feature-a");
    // Adversarial: another worktree *named* like the first one's id.
    a.name = "wt-bbbbbbbb".to_string();
    let b = worktree("wt-bbbbbbbb", "feature-b", "ppg/feature-b");
    m.insert_worktree(a).unwrap();
    m.insert_worktree(b).unwrap();

    let hit = m.resolve_worktree("wt-bbbbbbbb").unwrap();
    assert_eq!(hit.id.as_str(), "wt-bbbbbbbb");
}

#[test]
fn resolve_by_name_and_branch() {
    let mut m = Manifest::new("/r", "ppg", now());
    m.insert_worktree(worktree("wt-aaaaaaaa", "feature-a", "ppg/feature-a")).unwrap();
    assert_eq!(m.resolve_worktree("feature-a").unwrap().id.as_str(), "wt-aaaaaaaa");
    assert_eq!(m.resolve_worktree("ppg/feature-a").unwrap().id.as_str(), "wt-aaaaaaaa");
    assert!(m.resolve_worktree("nope").is_none());
}

#[test]
fn duplicate_worktree_rejected() {
    let mut m = Manifest::new("/r", "ppg", now());
    m.insert_worktree(worktree("wt-aaaaaaaa", "a", "ppg/a")).unwrap();
    let err = m.insert_worktree(worktree("wt-aaaaaaaa", "b", "ppg/b")).unwrap_err();
    assert!(matches!(err, ManifestError::DuplicateWorktree(_)));
}

#[test]
fn duplicate_agent_rejected_across_worktrees() {
    let mut m = Manifest::new("/r", "ppg", now());
    m.insert_worktree(worktree("wt-aaaaaaaa", "a", "ppg/a")).unwrap();
    m.insert_worktree(worktree("wt-bbbbbbbb", "b", "ppg/b")).unwrap();

    let wt_a = WorktreeId::from_string("wt-aaaaaaaa");
    let wt_b = WorktreeId::from_string("wt-bbbbbbbb");
    m.insert_agent(&wt_a, agent("ag-00000001")).unwrap();
    let err = m.insert_agent(&wt_b, agent("ag-00000001")).unwrap_err();
    assert!(matches!(err, ManifestError::DuplicateAgent(_)));
}

#[test]
fn find_agent_returns_owning_worktree() {
    let mut m = Manifest::new("/r", "ppg", now());
    m.insert_worktree(worktree("wt-aaaaaaaa", "a", "ppg/a")).unwrap();
    let wt_id = WorktreeId::from_string("wt-aaaaaaaa");
    m.insert_agent(&wt_id, agent("ag-00000001")).unwrap();

    let (wt, ag) = m.find_agent("ag-00000001").unwrap();
    assert_eq!(wt.id, wt_id);
    assert_eq!(ag.id.as_str(), "ag-00000001");
    assert!(m.find_agent("ag-99999999").is_none());
}

#[parameterized(
    active_to_merging = { WorktreeStatus::Active, WorktreeStatus::Merging, true },
    active_to_cleaned = { WorktreeStatus::Active, WorktreeStatus::Cleaned, true },
    merging_to_merged = { WorktreeStatus::Merging, WorktreeStatus::Merged, true },
    merging_to_failed = { WorktreeStatus::Merging, WorktreeStatus::Failed, true },
    merged_to_cleaned = { WorktreeStatus::Merged, WorktreeStatus::Cleaned, true },
    failed_retry = { WorktreeStatus::Failed, WorktreeStatus::Merging, true },
    merged_back_to_active = { WorktreeStatus::Merged, WorktreeStatus::Active, false },
    cleaned_is_terminal = { WorktreeStatus::Cleaned, WorktreeStatus::Active, false },
    cleaned_no_merge = { WorktreeStatus::Cleaned, WorktreeStatus::Merging, false },
    active_skip_to_merged = { WorktreeStatus::Active, WorktreeStatus::Merged, false },
)]
fn status_transitions(from: WorktreeStatus, to: WorktreeStatus, allowed: bool) {
    assert_eq!(from.can_transition(to), allowed);
}

#[test]
fn set_worktree_status_enforces_monotonicity() {
    let mut m = Manifest::new("/r", "ppg", now());
    m.insert_worktree(worktree("wt-aaaaaaaa", "a", "ppg/a")).unwrap();
    let id = WorktreeId::from_string("wt-aaaaaaaa");

    m.set_worktree_status(&id, WorktreeStatus::Merging).unwrap();
    m.set_worktree_status(&id, WorktreeStatus::Merged).unwrap();
    let err = m.set_worktree_status(&id, WorktreeStatus::Active).unwrap_err();
    assert!(matches!(err, ManifestError::InvalidTransition { .. }));
}

#[test]
fn truncate_prompt_limits_to_500_chars() {
    assert_eq!(truncate_prompt("short"), "short");
    let long: String = "x".repeat(600);
    assert_eq!(truncate_prompt(&long).chars().count(), PROMPT_MAX_CHARS);
    // Multi-byte chars are counted per char, not per byte.
    let wide: String = "é".repeat(600);
    assert_eq!(truncate_prompt(&wide).chars().count(), PROMPT_MAX_CHARS);
}

#[test]
fn serde_round_trip_uses_camel_case() {
    let mut m = Manifest::new("/r", "ppg", now());
    m.insert_worktree(worktree("wt-aaaaaaaa", "a", "ppg/a")).unwrap();
    let wt_id = WorktreeId::from_string("wt-aaaaaaaa");
    m.insert_agent(&wt_id, agent("ag-00000001")).unwrap();

    let json = serde_json::to_string_pretty(&m).unwrap();
    assert!(json.contains("\"projectRoot\""));
    assert!(json.contains("\"sessionName\""));
    assert!(json.contains("\"baseBranch\""));
    assert!(json.contains("\"tmuxTarget\""));
    assert!(json.contains("\"startedAt\""));

    let back: Manifest = serde_json::from_str(&json).unwrap();
    assert_eq!(back, m);
}

#[test]
fn reader_tolerates_missing_agents_map_and_unknown_fields() {
    let json = r#"{
        "version": 1,
        "projectRoot": "/r",
        "sessionName": "ppg",
        "createdAt": "2026-01-15T12:00:00Z",
        "updatedAt": "2026-01-15T12:00:00Z",
        "futureField": {"ignored": true},
        "worktrees": {
            "wt-aaaaaaaa": {
                "id": "wt-aaaaaaaa",
                "name": "a",
                "path": "/r/.ppg/worktrees/a",
                "branch": "ppg/a",
                "baseBranch": "main",
                "status": "active",
                "createdAt": "2026-01-15T12:00:00Z"
            }
        }
    }"#;
    let m: Manifest = serde_json::from_str(json).unwrap();
    let wt = m.resolve_worktree("a").unwrap();
    assert!(wt.agents.is_empty());
    assert!(wt.tmux_window.is_empty());
}
