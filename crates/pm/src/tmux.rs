// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tmux backend: every op shells out to the external `tmux` binary.
//!
//! Session references use tmux's `=name` exact-match form so a session
//! named `ppg` never resolves against `ppg-other`. Kill ops swallow
//! "target not found" errors (racing with pane death is normal); all
//! other failures surface with tmux's stderr attached.

use crate::{
    PaneInfo, PaneRef, Pm, PmError, SplitDirection, WindowInfo, MAX_PANES_PER_WINDOW,
};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;
use tokio::process::Command;

const TMUX_TIMEOUT: Duration = Duration::from_secs(10);

const PANE_FORMAT: &str =
    "#{session_name}:#{window_index}.#{pane_index}\t#{pane_id}\t#{pane_pid}\t#{pane_current_command}\t#{pane_dead}\t#{pane_dead_status}";

/// External-multiplexer backend.
#[derive(Debug, Default, Clone)]
pub struct TmuxPm;

impl TmuxPm {
    pub fn new() -> Self {
        Self
    }

    /// Probe for the tmux binary.
    pub async fn available() -> bool {
        matches!(
            Command::new("tmux").arg("-V").output().await,
            Ok(out) if out.status.success()
        )
    }

    /// Exact-match session reference.
    fn session_ref(session: &str) -> String {
        format!("={session}")
    }

    async fn run(&self, args: &[&str]) -> Result<String, PmError> {
        let result = tokio::time::timeout(
            TMUX_TIMEOUT,
            Command::new("tmux").args(args).output(),
        )
        .await
        .map_err(|_| PmError::Command(format!("tmux {} timed out", args.join(" "))))?;

        let output = result.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                PmError::PmNotFound
            } else {
                PmError::Io(e)
            }
        })?;

        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).to_string())
        } else {
            Err(PmError::Command(format!(
                "tmux {}: {}",
                args.join(" "),
                String::from_utf8_lossy(&output.stderr).trim()
            )))
        }
    }

    /// Run a kill-style op, treating missing targets as success.
    async fn run_kill(&self, args: &[&str]) -> Result<(), PmError> {
        match self.run(args).await {
            Ok(_) => Ok(()),
            Err(PmError::Command(msg)) if is_missing_target(&msg) => Ok(()),
            Err(e) => Err(e),
        }
    }

    fn parse_pane_line(line: &str) -> Option<(String, PaneInfo)> {
        let mut fields = line.split('\t');
        let target = fields.next()?.to_string();
        let pane_id = fields.next()?.to_string();
        let pane_pid = fields.next().and_then(|s| s.parse().ok());
        let current_command = fields.next().unwrap_or_default().to_string();
        let is_dead = fields.next() == Some("1");
        let dead_status = fields.next().and_then(|s| s.parse().ok());
        Some((
            target,
            PaneInfo {
                pane_id,
                pane_pid,
                current_command,
                is_dead,
                dead_status: if is_dead { dead_status } else { None },
            },
        ))
    }
}

/// Tmux reports missing targets with a few different phrasings.
fn is_missing_target(stderr: &str) -> bool {
    let s = stderr.to_ascii_lowercase();
    s.contains("can't find") || s.contains("no such") || s.contains("session not found")
}

/// Window portion of a `session:window.pane` target.
fn window_of(target: &str) -> &str {
    target.split_once('.').map_or(target, |(w, _)| w)
}

#[async_trait]
impl Pm for TmuxPm {
    async fn ensure_session(&self, name: &str) -> Result<(), PmError> {
        if self.session_exists(name).await? {
            return Ok(());
        }
        self.run(&["new-session", "-d", "-s", name]).await?;
        Ok(())
    }

    async fn session_exists(&self, name: &str) -> Result<bool, PmError> {
        let sref = Self::session_ref(name);
        match self.run(&["has-session", "-t", &sref]).await {
            Ok(_) => Ok(true),
            Err(PmError::Command(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn create_window(
        &self,
        session: &str,
        name: &str,
        cwd: &Path,
    ) -> Result<String, PmError> {
        let sref = format!("{}:", Self::session_ref(session));
        let cwd_s = cwd.display().to_string();
        let out = self
            .run(&[
                "new-window",
                "-t",
                &sref,
                "-n",
                name,
                "-c",
                &cwd_s,
                "-P",
                "-F",
                "#{session_name}:#{window_index}",
            ])
            .await?;
        Ok(out.trim().to_string())
    }

    async fn kill_window(&self, target: &str) -> Result<(), PmError> {
        self.run_kill(&["kill-window", "-t", target]).await
    }

    async fn list_session_windows(&self, session: &str) -> Result<Vec<WindowInfo>, PmError> {
        let sref = Self::session_ref(session);
        let out = self
            .run(&[
                "list-windows",
                "-t",
                &sref,
                "-F",
                "#{session_name}:#{window_index}\t#{window_name}",
            ])
            .await?;
        Ok(out
            .lines()
            .filter_map(|line| {
                let (target, name) = line.split_once('\t')?;
                Some(WindowInfo { target: target.to_string(), name: name.to_string() })
            })
            .collect())
    }

    async fn kill_orphan_windows(
        &self,
        session: &str,
        keep: &[String],
        self_pane: Option<&str>,
    ) -> Result<usize, PmError> {
        let windows = self.list_session_windows(session).await?;
        let self_window = match self_pane {
            Some(pane_id) => {
                let panes = self.list_session_panes(session).await?;
                panes
                    .iter()
                    .find(|(key, info)| key.contains('.') && info.pane_id == pane_id)
                    .map(|(key, _)| window_of(key).to_string())
            }
            None => None,
        };

        let mut killed = 0;
        for window in windows {
            if keep.contains(&window.target) {
                continue;
            }
            if self_window.as_deref() == Some(window.target.as_str()) {
                tracing::debug!(target = %window.target, "skipping own window during orphan sweep");
                continue;
            }
            self.kill_window(&window.target).await?;
            killed += 1;
        }
        Ok(killed)
    }

    async fn select_window(&self, target: &str) -> Result<(), PmError> {
        self.run(&["select-window", "-t", target]).await.map(|_| ())
    }

    async fn split_pane(
        &self,
        target: &str,
        direction: SplitDirection,
        cwd: &Path,
    ) -> Result<Option<PaneRef>, PmError> {
        let window = window_of(target);
        let out = self.run(&["list-panes", "-t", window, "-F", "#{pane_id}"]).await?;
        if out.lines().count() >= MAX_PANES_PER_WINDOW {
            return Ok(None);
        }

        let flag = match direction {
            SplitDirection::Horizontal => "-h",
            SplitDirection::Vertical => "-v",
        };
        let cwd_s = cwd.display().to_string();
        let out = self
            .run(&[
                "split-window",
                flag,
                "-t",
                target,
                "-c",
                &cwd_s,
                "-P",
                "-F",
                "#{pane_id}\t#{session_name}:#{window_index}.#{pane_index}",
            ])
            .await?;
        let line = out.trim();
        let (pane_id, pane_target) = line
            .split_once('\t')
            .ok_or_else(|| PmError::Command(format!("unexpected split-window output: {line}")))?;
        Ok(Some(PaneRef { pane_id: pane_id.to_string(), target: pane_target.to_string() }))
    }

    async fn kill_pane(&self, target: &str) -> Result<(), PmError> {
        self.run_kill(&["kill-pane", "-t", target]).await
    }

    async fn get_pane_info(&self, target: &str) -> Result<Option<PaneInfo>, PmError> {
        let out = self
            .run(&["display-message", "-p", "-t", target, "-F", PANE_FORMAT])
            .await;
        match out {
            Ok(text) => Ok(Self::parse_pane_line(text.trim()).map(|(_, info)| info)),
            Err(PmError::Command(msg)) if is_missing_target(&msg) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn list_session_panes(
        &self,
        session: &str,
    ) -> Result<HashMap<String, PaneInfo>, PmError> {
        let sref = Self::session_ref(session);
        let out = self.run(&["list-panes", "-s", "-t", &sref, "-F", PANE_FORMAT]).await?;

        let mut map = HashMap::new();
        for line in out.lines() {
            let Some((target, info)) = Self::parse_pane_line(line) else { continue };
            // Window-level key resolves to the window's first pane.
            let window = window_of(&target).to_string();
            map.entry(window).or_insert_with(|| info.clone());
            map.insert(info.pane_id.clone(), info.clone());
            map.insert(target, info);
        }
        Ok(map)
    }

    async fn send_keys(&self, target: &str, command: &str) -> Result<(), PmError> {
        self.send_literal(target, command).await?;
        self.run(&["send-keys", "-t", target, "Enter"]).await.map(|_| ())
    }

    async fn send_literal(&self, target: &str, text: &str) -> Result<(), PmError> {
        self.run(&["send-keys", "-t", target, "-l", "--", text]).await.map(|_| ())
    }

    async fn send_raw_keys(&self, target: &str, keys: &[&str]) -> Result<(), PmError> {
        let mut args = vec!["send-keys", "-t", target];
        args.extend_from_slice(keys);
        self.run(&args).await.map(|_| ())
    }

    async fn send_ctrl_c(&self, target: &str) -> Result<(), PmError> {
        self.run(&["send-keys", "-t", target, "C-c"]).await.map(|_| ())
    }

    async fn capture_pane(&self, target: &str, lines: Option<usize>) -> Result<String, PmError> {
        let start;
        let mut args = vec!["capture-pane", "-p", "-t", target];
        if let Some(n) = lines {
            start = format!("-{n}");
            args.extend_from_slice(&["-S", start.as_str()]);
        }
        self.run(&args).await
    }

    fn is_inside_session(&self) -> bool {
        std::env::var("TMUX").map(|v| !v.is_empty()).unwrap_or(false)
    }
}

#[cfg(test)]
#[path = "tmux_tests.rs"]
mod tests;
