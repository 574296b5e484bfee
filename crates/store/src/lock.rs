// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Advisory file lock for manifest transactions.
//!
//! The lock lives in a sidecar file next to the manifest so the manifest
//! itself can be atomically renamed while locked. A holder that died
//! without unlocking leaves a file whose lock evaporated with the
//! process; a holder that wedged leaves a live lock — after 10 seconds
//! the file is treated as stale and broken by unlinking (flock follows
//! the inode, so a fresh open acquires cleanly).

use crate::StoreError;
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Holder dead or wedged beyond this age is considered stale.
const STALE_AFTER: Duration = Duration::from_secs(10);

/// Retry schedule: exponential backoff, 100ms doubling, capped at 1s.
const MAX_ATTEMPTS: u32 = 5;
const BACKOFF_BASE_MS: u64 = 100;
const BACKOFF_CAP_MS: u64 = 1000;

/// Held advisory lock; released on drop.
pub struct ManifestLockGuard {
    file: File,
    path: PathBuf,
}

impl Drop for ManifestLockGuard {
    fn drop(&mut self) {
        if let Err(e) = fs2::FileExt::unlock(&self.file) {
            tracing::warn!(path = %self.path.display(), error = %e, "manifest unlock failed");
        }
    }
}

/// Acquire the manifest lock with retries and stale-lock breaking.
pub(crate) async fn acquire(lock_path: &Path) -> Result<ManifestLockGuard, StoreError> {
    if let Some(parent) = lock_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    for attempt in 0..MAX_ATTEMPTS {
        match try_acquire(lock_path)? {
            Some(guard) => return Ok(guard),
            None => {
                if break_if_stale(lock_path) {
                    continue;
                }
                let backoff = (BACKOFF_BASE_MS << attempt).min(BACKOFF_CAP_MS);
                tokio::time::sleep(Duration::from_millis(backoff)).await;
            }
        }
    }

    Err(StoreError::ManifestLock(format!(
        "lock at {} still held after {} attempts",
        lock_path.display(),
        MAX_ATTEMPTS
    )))
}

fn try_acquire(lock_path: &Path) -> Result<Option<ManifestLockGuard>, StoreError> {
    // Never truncate: the current holder's PID stays intact.
    let file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .open(lock_path)?;

    match file.try_lock_exclusive() {
        Ok(()) => {
            // Holding the lock now; stamp pid + mtime for staleness checks.
            let mut file = file;
            let _ = file.set_len(0);
            let _ = writeln!(file, "{}", std::process::id());
            Ok(Some(ManifestLockGuard { file, path: lock_path.to_path_buf() }))
        }
        Err(_) => Ok(None),
    }
}

/// Unlink the lock file if its mtime is older than [`STALE_AFTER`].
/// Returns true when broken.
fn break_if_stale(lock_path: &Path) -> bool {
    let stale = std::fs::metadata(lock_path)
        .and_then(|m| m.modified())
        .ok()
        .and_then(|mtime| mtime.elapsed().ok())
        .map(|age| age > STALE_AFTER)
        .unwrap_or(false);
    if stale {
        tracing::warn!(path = %lock_path.display(), "breaking stale manifest lock");
        let _ = std::fs::remove_file(lock_path);
    }
    stale
}

#[cfg(test)]
#[path = "lock_tests.rs"]
mod tests;
