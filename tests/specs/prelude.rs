// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared fixtures for the scenario specs.

use ppg_core::{Clock, Manifest, SystemClock};
use std::path::Path;

/// A throwaway Git repository with an initialized `.ppg/` manifest.
pub struct Project {
    dir: tempfile::TempDir,
}

impl Project {
    pub async fn new() -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let project = Self { dir };
        project.git(&["init", "-b", "main"]).await;
        project.git(&["config", "user.email", "specs@example.com"]).await;
        project.git(&["config", "user.name", "Specs"]).await;
        project.file("README.md", "hello\n");
        project.git(&["add", "."]).await;
        project.git(&["commit", "-m", "init"]).await;

        let manifest = Manifest::new(project.root(), "ppg", SystemClock.now_utc());
        ppg_store::init_manifest(project.root(), manifest).expect("init manifest");
        project
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn file(&self, rel: &str, content: &str) {
        let path = self.dir.path().join(rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("mkdir");
        }
        std::fs::write(path, content).expect("write");
    }

    pub async fn git(&self, args: &[&str]) -> String {
        self.git_in(self.dir.path(), args).await
    }

    pub async fn git_in(&self, cwd: &Path, args: &[&str]) -> String {
        let output = tokio::process::Command::new("git")
            .arg("-C")
            .arg(cwd)
            .args(args)
            .output()
            .await
            .expect("git spawn");
        assert!(
            output.status.success(),
            "git {:?} failed: {}",
            args,
            String::from_utf8_lossy(&output.stderr)
        );
        String::from_utf8_lossy(&output.stdout).into_owned()
    }

    pub fn manifest(&self) -> Manifest {
        ppg_store::read_manifest(self.root()).expect("read manifest")
    }
}
