// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! CLI surface smoke tests through the real binary.

use assert_cmd::Command;
use ppg_core::{Clock, Manifest, SystemClock};

fn git_repo() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    let git = |args: &[&str]| {
        let out = std::process::Command::new("git")
            .arg("-C")
            .arg(dir.path())
            .args(args)
            .output()
            .unwrap();
        assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    };
    git(&["init", "-b", "main"]);
    git(&["config", "user.email", "t@example.com"]);
    git(&["config", "user.name", "T"]);
    std::fs::write(dir.path().join("README.md"), "x\n").unwrap();
    git(&["add", "."]);
    git(&["commit", "-m", "init"]);
    dir
}

fn ppg() -> Command {
    Command::cargo_bin("ppg").unwrap()
}

#[test]
fn init_creates_state_and_refuses_twice() {
    let repo = git_repo();
    ppg()
        .args(["--root", &repo.path().display().to_string(), "init"])
        .assert()
        .success();
    assert!(repo.path().join(".ppg/manifest.json").exists());
    assert!(repo.path().join(".ppg/prompts").is_dir());

    ppg()
        .args(["--root", &repo.path().display().to_string(), "init"])
        .assert()
        .failure()
        .code(2);
}

#[test]
fn status_without_init_maps_not_initialized() {
    let repo = git_repo();
    let output = ppg()
        .args(["--root", &repo.path().display().to_string(), "status", "--json"])
        .assert()
        .failure()
        .code(3)
        .get_output()
        .stdout
        .clone();
    assert!(String::from_utf8_lossy(&output).contains("NOT_INITIALIZED"));
}

#[test]
fn status_json_envelope_is_ok_true() {
    let repo = git_repo();
    ppg()
        .args(["--root", &repo.path().display().to_string(), "init"])
        .assert()
        .success();

    let output = ppg()
        .args(["--root", &repo.path().display().to_string(), "status", "--json"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let value: serde_json::Value = serde_json::from_slice(&output).unwrap();
    assert_eq!(value["ok"], true);
    assert_eq!(value["data"]["version"], 1);
}

#[test]
fn merge_unknown_worktree_exits_with_not_found() {
    let repo = git_repo();
    let manifest = Manifest::new(repo.path(), "ppg", SystemClock.now_utc());
    ppg_store::init_manifest(repo.path(), manifest).unwrap();

    ppg()
        .args(["--root", &repo.path().display().to_string(), "merge", "nope"])
        .assert()
        .failure()
        .code(6);
}

#[test]
fn cron_add_validates_expression() {
    let repo = git_repo();
    let manifest = Manifest::new(repo.path(), "ppg", SystemClock.now_utc());
    ppg_store::init_manifest(repo.path(), manifest).unwrap();
    let root = repo.path().display().to_string();

    ppg()
        .args(["--root", &root, "cron", "add", "nightly", "--cron", "0 2 * * *", "--swarm", "rev"])
        .assert()
        .success();
    let yaml = std::fs::read_to_string(repo.path().join(".ppg/schedules.yaml")).unwrap();
    assert!(yaml.contains("nightly"));

    ppg()
        .args(["--root", &root, "cron", "add", "bad", "--cron", "not a cron", "--swarm", "rev"])
        .assert()
        .failure()
        .code(2);

    let listed = ppg()
        .args(["--root", &root, "cron", "list"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    assert!(String::from_utf8_lossy(&listed).contains("nightly"));
}

#[test]
fn token_lifecycle_via_cli() {
    let repo = git_repo();
    let manifest = Manifest::new(repo.path(), "ppg", SystemClock.now_utc());
    ppg_store::init_manifest(repo.path(), manifest).unwrap();
    let root = repo.path().display().to_string();

    let output = ppg()
        .args(["--root", &root, "token", "add", "dash", "--json"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let value: serde_json::Value = serde_json::from_slice(&output).unwrap();
    let token = value["data"]["token"].as_str().unwrap();
    assert!(token.starts_with("tk_"));

    let listed = ppg()
        .args(["--root", &root, "token", "list"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    assert!(String::from_utf8_lossy(&listed).contains("dash"));

    ppg()
        .args(["--root", &root, "token", "revoke", "dash"])
        .assert()
        .success();
}
