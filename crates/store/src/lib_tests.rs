// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use ppg_core::{Manifest, WorktreeId, WorktreeStatus};
use std::collections::BTreeMap;
use std::path::PathBuf;

fn fresh_manifest(root: &Path) -> Manifest {
    Manifest::new(root, "ppg", ppg_core::SystemClock.now_utc())
}

fn worktree(id: &str) -> ppg_core::Worktree {
    ppg_core::Worktree {
        id: WorktreeId::from_string(id),
        name: id.to_string(),
        path: PathBuf::from(format!("/tmp/{id}")),
        branch: format!("ppg/{id}"),
        base_branch: "main".to_string(),
        status: WorktreeStatus::Active,
        tmux_window: String::new(),
        merged_at: None,
        pr_url: None,
        created_at: ppg_core::SystemClock.now_utc(),
        agents: BTreeMap::new(),
    }
}

#[test]
fn read_missing_manifest_is_not_initialized() {
    let dir = tempfile::tempdir().unwrap();
    let err = read_manifest(dir.path()).unwrap_err();
    assert!(matches!(err, StoreError::NotInitialized(_)));
    assert_eq!(err.code(), ppg_core::ErrorCode::NotInitialized);
}

#[test]
fn write_then_read_round_trips_with_trailing_newline() {
    let dir = tempfile::tempdir().unwrap();
    let mut m = fresh_manifest(dir.path());
    write_manifest(dir.path(), &mut m).unwrap();

    let raw = std::fs::read_to_string(dir.path().join(".ppg/manifest.json")).unwrap();
    assert!(raw.ends_with('\n'));
    // 2-space indent.
    assert!(raw.contains("\n  \"version\""));

    let back = read_manifest(dir.path()).unwrap();
    assert_eq!(back, m);
}

#[test]
fn write_refreshes_updated_at() {
    let dir = tempfile::tempdir().unwrap();
    let clock = ppg_core::FakeClock::new();
    clock.set_epoch_ms(1_000_000_000_000);
    let mut m = Manifest::new(dir.path(), "ppg", clock.now_utc());

    clock.advance(std::time::Duration::from_secs(60));
    write_manifest_with_clock(dir.path(), &mut m, &clock).unwrap();
    assert!(m.updated_at > m.created_at);
}

#[test]
fn init_manifest_refuses_to_clobber() {
    let dir = tempfile::tempdir().unwrap();
    init_manifest(dir.path(), fresh_manifest(dir.path())).unwrap();
    assert!(init_manifest(dir.path(), fresh_manifest(dir.path())).is_err());
}

#[test]
fn no_temp_files_left_behind() {
    let dir = tempfile::tempdir().unwrap();
    let mut m = fresh_manifest(dir.path());
    write_manifest(dir.path(), &mut m).unwrap();

    let entries: Vec<String> = std::fs::read_dir(dir.path().join(".ppg"))
        .unwrap()
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(entries, vec!["manifest.json"]);
}

#[tokio::test]
async fn update_manifest_applies_and_persists() {
    let dir = tempfile::tempdir().unwrap();
    init_manifest(dir.path(), fresh_manifest(dir.path())).unwrap();

    let id: String = update_manifest::<_, StoreError, _, _>(dir.path(), |mut m| async move {
        m.insert_worktree(worktree("wt-aaaaaaaa")).map_err(|_| {
            StoreError::ManifestLock("unreachable".into())
        })?;
        Ok((m, "wt-aaaaaaaa".to_string()))
    })
    .await
    .unwrap();

    assert_eq!(id, "wt-aaaaaaaa");
    let m = read_manifest(dir.path()).unwrap();
    assert!(m.resolve_worktree("wt-aaaaaaaa").is_some());
}

#[tokio::test]
async fn update_manifest_error_leaves_manifest_untouched() {
    let dir = tempfile::tempdir().unwrap();
    init_manifest(dir.path(), fresh_manifest(dir.path())).unwrap();
    let before = read_manifest(dir.path()).unwrap();

    let result: Result<(), StoreError> = update_manifest(dir.path(), |mut m| async move {
        m.insert_worktree(worktree("wt-aaaaaaaa")).ok();
        Err(StoreError::ManifestLock("updater failed".into()))
    })
    .await;

    assert!(result.is_err());
    assert_eq!(read_manifest(dir.path()).unwrap(), before);
}

/// Two concurrent read-modify-write updaters must both land (P1).
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_updates_are_serialized() {
    let dir = tempfile::tempdir().unwrap();
    init_manifest(dir.path(), fresh_manifest(dir.path())).unwrap();

    let mut handles = Vec::new();
    for i in 0..4 {
        let root = dir.path().to_path_buf();
        handles.push(tokio::spawn(async move {
            update_manifest::<_, StoreError, _, _>(&root, |mut m| async move {
                let wt = worktree(&format!("wt-{i}{i}{i}{i}{i}{i}{i}{i}"));
                m.insert_worktree(wt).ok();
                Ok((m, ()))
            })
            .await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let m = read_manifest(dir.path()).unwrap();
    assert_eq!(m.worktrees.len(), 4, "a concurrent update was lost");
}

/// Readers never observe a torn manifest while a writer loops (P2).
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn readers_never_see_partial_json() {
    let dir = tempfile::tempdir().unwrap();
    init_manifest(dir.path(), fresh_manifest(dir.path())).unwrap();
    let root = dir.path().to_path_buf();

    let writer = tokio::spawn({
        let root = root.clone();
        async move {
            for i in 0..25 {
                update_manifest::<_, StoreError, _, _>(&root, |mut m| async move {
                    m.session_name = format!("session-{i}-{}", "x".repeat(512));
                    Ok((m, ()))
                })
                .await
                .unwrap();
            }
        }
    });

    let reader = tokio::spawn(async move {
        for _ in 0..200 {
            match read_manifest(&root) {
                Ok(_) => {}
                Err(StoreError::Corrupt(e)) => panic!("torn manifest read: {e}"),
                Err(e) => panic!("unexpected read error: {e}"),
            }
            tokio::time::sleep(std::time::Duration::from_millis(1)).await;
        }
    });

    writer.await.unwrap();
    reader.await.unwrap();
}
