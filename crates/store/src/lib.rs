// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Manifest store: crash-consistent, lock-serialized reads and writes of
//! `<root>/.ppg/manifest.json`.
//!
//! All durable mutations go through [`update_manifest`], which holds a
//! cross-process advisory lock for the duration of the updater. Writes
//! are atomic (temp file in the same directory, then rename), so readers
//! see either the previous manifest or the new one, never a torn file.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod lock;

pub use lock::ManifestLockGuard;

use ppg_core::{Clock, Manifest, ProjectPaths, SystemClock};
use std::future::Future;
use std::io::Write;
use std::path::Path;
use thiserror::Error;

/// Errors from manifest store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("project not initialized (no manifest at {0})")]
    NotInitialized(String),

    #[error("could not acquire manifest lock: {0}")]
    ManifestLock(String),

    #[error("manifest is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    pub fn code(&self) -> ppg_core::ErrorCode {
        match self {
            StoreError::NotInitialized(_) => ppg_core::ErrorCode::NotInitialized,
            StoreError::ManifestLock(_) => ppg_core::ErrorCode::ManifestLock,
            StoreError::Corrupt(_) | StoreError::Io(_) => ppg_core::ErrorCode::Internal,
        }
    }
}

/// Read the manifest, failing with `NotInitialized` when absent.
pub fn read_manifest(root: &Path) -> Result<Manifest, StoreError> {
    let paths = ProjectPaths::new(root);
    let bytes = match std::fs::read(&paths.manifest) {
        Ok(b) => b,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(StoreError::NotInitialized(paths.manifest.display().to_string()))
        }
        Err(e) => return Err(e.into()),
    };
    Ok(serde_json::from_slice(&bytes)?)
}

/// Serialize and write the manifest atomically, refreshing `updatedAt`.
///
/// 2-space-indented JSON with a trailing newline, written to a temp file
/// in the same directory and renamed over the final path.
pub fn write_manifest(root: &Path, manifest: &mut Manifest) -> Result<(), StoreError> {
    write_manifest_with_clock(root, manifest, &SystemClock)
}

pub fn write_manifest_with_clock<C: Clock>(
    root: &Path,
    manifest: &mut Manifest,
    clock: &C,
) -> Result<(), StoreError> {
    let paths = ProjectPaths::new(root);
    manifest.touch(clock.now_utc());

    let mut body = serde_json::to_vec_pretty(manifest)?;
    body.push(b'\n');

    if let Some(parent) = paths.manifest.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let tmp = paths.manifest.with_extension(format!("json.tmp-{}", std::process::id()));
    {
        let mut file = std::fs::File::create(&tmp)?;
        file.write_all(&body)?;
        file.sync_all()?;
    }
    match std::fs::rename(&tmp, &paths.manifest) {
        Ok(()) => Ok(()),
        Err(e) => {
            let _ = std::fs::remove_file(&tmp);
            Err(e.into())
        }
    }
}

/// Initialize a fresh manifest; fails if one already exists.
pub fn init_manifest(root: &Path, mut manifest: Manifest) -> Result<Manifest, StoreError> {
    let paths = ProjectPaths::new(root);
    if paths.manifest.exists() {
        return Err(StoreError::Io(std::io::Error::new(
            std::io::ErrorKind::AlreadyExists,
            format!("manifest already exists at {}", paths.manifest.display()),
        )));
    }
    write_manifest(root, &mut manifest)?;
    Ok(manifest)
}

/// Run a read-modify-write transaction under the manifest lock.
///
/// The updater receives the manifest by value and returns the manifest
/// to persist plus a result value; it may be synchronous or await
/// freely. Errors from the updater abort the transaction without a
/// write. Lock acquisition failures surface as `ManifestLock` (wrapped
/// into `E`).
pub async fn update_manifest<T, E, F, Fut>(root: &Path, updater: F) -> Result<T, E>
where
    E: From<StoreError>,
    F: FnOnce(Manifest) -> Fut,
    Fut: Future<Output = Result<(Manifest, T), E>>,
{
    let paths = ProjectPaths::new(root);
    let guard = lock::acquire(&paths.manifest_lock).await?;

    let manifest = read_manifest(root)?;
    let (mut next, value) = updater(manifest).await?;
    write_manifest(root, &mut next)?;

    drop(guard);
    Ok(value)
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
