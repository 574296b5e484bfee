// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn store() -> (tempfile::TempDir, AuthStore) {
    let dir = tempfile::tempdir().unwrap();
    let store = AuthStore::new(dir.path().join("auth.json"));
    (dir, store)
}

#[test]
fn add_returns_plaintext_once_and_stores_hash() {
    let (_dir, store) = store();
    let token = store.add_token("dashboard").unwrap();
    assert!(token.starts_with("tk_"));

    let entries = store.list_tokens().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].label, "dashboard");
    assert_ne!(entries[0].hash, token);
    assert_eq!(entries[0].hash.len(), 64);
    assert!(entries[0].last_used_at.is_none());
}

#[test]
fn duplicate_label_rejected() {
    let (_dir, store) = store();
    store.add_token("a").unwrap();
    let err = store.add_token("a").unwrap_err();
    assert!(matches!(err, AuthError::DuplicateToken(_)));
    assert_eq!(err.code(), ppg_core::ErrorCode::DuplicateToken);
}

#[test]
fn validate_matches_and_touches_last_used() {
    let (_dir, store) = store();
    let token = store.add_token("a").unwrap();

    let hit = store.validate_token(&token).unwrap().unwrap();
    assert_eq!(hit.label, "a");
    assert!(hit.last_used_at.is_some());

    assert!(store.validate_token("tk_bogus").unwrap().is_none());
}

#[test]
fn revoke_removes_token() {
    let (_dir, store) = store();
    let token = store.add_token("a").unwrap();
    assert!(store.revoke_token("a").unwrap());
    assert!(!store.revoke_token("a").unwrap());
    assert!(store.validate_token(&token).unwrap().is_none());
}

#[test]
fn missing_file_is_empty_store() {
    let (_dir, store) = store();
    assert!(store.list_tokens().unwrap().is_empty());
}

#[test]
fn corrupt_file_surfaces() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("auth.json");
    std::fs::write(&path, "{not json").unwrap();
    let store = AuthStore::new(&path);
    let err = store.list_tokens().unwrap_err();
    assert!(matches!(err, AuthError::Corrupt(_)));
    assert_eq!(err.code(), ppg_core::ErrorCode::AuthCorrupt);
}

#[cfg(unix)]
#[test]
fn auth_file_is_owner_only() {
    use std::os::unix::fs::PermissionsExt;
    let (dir, store) = store();
    store.add_token("a").unwrap();
    let mode = std::fs::metadata(dir.path().join("auth.json"))
        .unwrap()
        .permissions()
        .mode();
    assert_eq!(mode & 0o777, 0o600);
}

#[test]
fn persisted_store_reloads_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("auth.json");
    let token = AuthStore::new(&path).add_token("a").unwrap();
    // A fresh store instance (cold cache) sees the same token.
    let reopened = AuthStore::new(&path);
    assert!(reopened.validate_token(&token).unwrap().is_some());
}

#[test]
fn constant_time_eq_basics() {
    assert!(constant_time_eq(b"abc", b"abc"));
    assert!(!constant_time_eq(b"abc", b"abd"));
    assert!(!constant_time_eq(b"abc", b"ab"));
}

#[test]
fn tokens_are_unique_and_urlsafe() {
    let (_dir, store) = store();
    let a = store.add_token("a").unwrap();
    let b = store.add_token("b").unwrap();
    assert_ne!(a, b);
    for token in [a, b] {
        let body = token.strip_prefix("tk_").unwrap();
        assert!(body
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }
}
