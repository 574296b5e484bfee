// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Manifest watcher: filesystem events + periodic status polling.
//!
//! Two independent event streams feed one channel:
//! - `ManifestUpdated` on file change, debounced 300 ms (trailing edge).
//!   The notify watcher sits on the manifest's parent directory because
//!   atomic writes rename over the file — watching the file itself
//!   loses the inode on the first write.
//! - `AgentStatus` from a poll loop (default 3 s) that re-derives every
//!   agent's status from one pane-map fetch per tick and reports
//!   divergence from the last observation. Ticks never overlap; an
//!   error aborts only the current tick and goes to the error callback.

use ppg_core::{AgentId, AgentStatus, Manifest, ProjectPaths, WorktreeId};
use ppg_engine::agent::check_agent_status;
use ppg_pm::Pm;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Events emitted by the watcher. No ordering is guaranteed between the
/// two kinds; consumers needing a unified view derive membership from
/// `ManifestUpdated`.
#[derive(Debug, Clone, PartialEq)]
pub enum WatchEvent {
    ManifestUpdated(Manifest),
    AgentStatus {
        agent_id: AgentId,
        worktree_id: WorktreeId,
        status: AgentStatus,
        previous_status: AgentStatus,
    },
}

/// Timing knobs, defaulting to the production cadence.
#[derive(Debug, Clone)]
pub struct WatcherOptions {
    pub debounce: Duration,
    pub poll_interval: Duration,
}

impl Default for WatcherOptions {
    fn default() -> Self {
        Self { debounce: Duration::from_millis(300), poll_interval: Duration::from_secs(3) }
    }
}

/// Callback for per-tick errors; the watcher itself keeps running.
pub type ErrorCallback = Arc<dyn Fn(String) + Send + Sync>;

/// Running watcher; [`ManifestWatcher::stop`] cancels timers and
/// watchers and guarantees no further events.
pub struct ManifestWatcher {
    cancel: CancellationToken,
    fs_watcher: parking_lot::Mutex<Option<notify::RecommendedWatcher>>,
}

impl ManifestWatcher {
    /// Start watching; events arrive on the returned receiver.
    pub fn start(
        root: &Path,
        pm: Arc<dyn Pm>,
        opts: WatcherOptions,
        on_error: ErrorCallback,
    ) -> Result<(Self, mpsc::UnboundedReceiver<WatchEvent>), notify::Error> {
        let paths = ProjectPaths::new(root);
        let cancel = CancellationToken::new();
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        // Filesystem leg: raw change pings, debounced in a task below.
        let (fs_tx, fs_rx) = mpsc::unbounded_channel::<()>();
        let manifest_path = paths.manifest.clone();
        let watch_dir = paths.ppg_dir.clone();
        std::fs::create_dir_all(&watch_dir).ok();

        let mut watcher = {
            let manifest_path = manifest_path.clone();
            notify::recommended_watcher(move |result: Result<notify::Event, notify::Error>| {
                if let Ok(event) = result {
                    if event.paths.iter().any(|p| p == &manifest_path) {
                        let _ = fs_tx.send(());
                    }
                }
            })?
        };
        {
            use notify::Watcher;
            watcher.watch(&watch_dir, notify::RecursiveMode::NonRecursive)?;
        }

        Self::spawn_debounce(
            root.to_path_buf(),
            fs_rx,
            event_tx.clone(),
            opts.debounce,
            cancel.clone(),
            Arc::clone(&on_error),
        );
        Self::spawn_poller(
            root.to_path_buf(),
            pm,
            event_tx,
            opts.poll_interval,
            cancel.clone(),
            on_error,
        );

        Ok((
            Self { cancel, fs_watcher: parking_lot::Mutex::new(Some(watcher)) },
            event_rx,
        ))
    }

    /// Cancel timers, drop the filesystem watcher; no further events.
    pub fn stop(&self) {
        self.cancel.cancel();
        self.fs_watcher.lock().take();
    }

    fn spawn_debounce(
        root: std::path::PathBuf,
        mut fs_rx: mpsc::UnboundedReceiver<()>,
        event_tx: mpsc::UnboundedSender<WatchEvent>,
        debounce: Duration,
        cancel: CancellationToken,
        on_error: ErrorCallback,
    ) {
        tokio::spawn(async move {
            loop {
                // Wait for the first ping.
                tokio::select! {
                    () = cancel.cancelled() => return,
                    ping = fs_rx.recv() => {
                        if ping.is_none() {
                            return;
                        }
                    }
                }
                // Trailing edge: absorb pings until quiet for `debounce`.
                loop {
                    tokio::select! {
                        () = cancel.cancelled() => return,
                        () = tokio::time::sleep(debounce) => break,
                        ping = fs_rx.recv() => {
                            if ping.is_none() {
                                return;
                            }
                        }
                    }
                }
                match ppg_store::read_manifest(&root) {
                    Ok(manifest) => {
                        if event_tx.send(WatchEvent::ManifestUpdated(manifest)).is_err() {
                            return;
                        }
                    }
                    Err(e) => on_error(format!("manifest read failed: {e}")),
                }
            }
        });
    }

    fn spawn_poller(
        root: std::path::PathBuf,
        pm: Arc<dyn Pm>,
        event_tx: mpsc::UnboundedSender<WatchEvent>,
        poll_interval: Duration,
        cancel: CancellationToken,
        on_error: ErrorCallback,
    ) {
        tokio::spawn(async move {
            // Last observed status per agent, seeded from the manifest's
            // stored status the first time an agent is seen.
            let mut observed: HashMap<AgentId, AgentStatus> = HashMap::new();
            let mut ticker = tokio::time::interval(poll_interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            ticker.tick().await; // immediate first tick is not wanted

            loop {
                tokio::select! {
                    () = cancel.cancelled() => return,
                    _ = ticker.tick() => {}
                }

                let manifest = match ppg_store::read_manifest(&root) {
                    Ok(m) => m,
                    Err(e) => {
                        on_error(format!("poll: manifest read failed: {e}"));
                        continue;
                    }
                };
                let panes = match pm.list_session_panes(&manifest.session_name).await {
                    Ok(p) => p,
                    Err(e) => {
                        on_error(format!("poll: pane listing failed: {e}"));
                        continue;
                    }
                };

                for wt in manifest.worktrees.values() {
                    for agent in wt.agents.values() {
                        let (status, _) = check_agent_status(&panes, &agent.tmux_target);
                        let previous =
                            *observed.entry(agent.id).or_insert(agent.status);
                        if status != previous {
                            observed.insert(agent.id, status);
                            let event = WatchEvent::AgentStatus {
                                agent_id: agent.id,
                                worktree_id: wt.id,
                                status,
                                previous_status: previous,
                            };
                            if event_tx.send(event).is_err() {
                                return;
                            }
                        }
                    }
                }
            }
        });
    }
}

impl Drop for ManifestWatcher {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
#[path = "watcher_tests.rs"]
mod tests;
