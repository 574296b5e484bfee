// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Process manager abstraction over pseudo-terminal multiplexers.
//!
//! Two interchangeable backends implement the [`Pm`] contract: the tmux
//! backend delegates every op to the external `tmux` binary, and the
//! in-process backend owns pseudo-terminals directly via `portable-pty`.
//! Callers hold an `Arc<dyn Pm>` and never know which one they got.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod local;
mod tmux;

#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeCall, FakePm};

pub use local::LocalPm;
pub use tmux::TmuxPm;

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

/// Maximum panes in one window: the 2-row by 3-column grid.
pub const MAX_PANES_PER_WINDOW: usize = 6;

/// Ring buffer cap for in-process pane output.
pub const DEFAULT_SCROLLBACK_LINES: usize = 5000;

/// Errors from process manager operations.
#[derive(Debug, Error)]
pub enum PmError {
    #[error("tmux binary not found on PATH")]
    PmNotFound,

    #[error("session not found: {0}")]
    SessionNotFound(String),

    #[error("target not found: {0}")]
    TargetNotFound(String),

    #[error("pm command failed: {0}")]
    Command(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Split orientation. `Horizontal` places panes side by side (adds a
/// column), `Vertical` stacks them (adds a row).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SplitDirection {
    Horizontal,
    Vertical,
}

impl SplitDirection {
    /// Alternate h/v for batch split placement.
    pub fn toggled(self) -> Self {
        match self {
            SplitDirection::Horizontal => SplitDirection::Vertical,
            SplitDirection::Vertical => SplitDirection::Horizontal,
        }
    }
}

/// Snapshot of one pane's process state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaneInfo {
    /// Stable pane identifier, e.g. `%5`.
    pub pane_id: String,
    /// PID of the pane's root process.
    pub pane_pid: Option<u32>,
    /// Name of the foreground command in the pane.
    pub current_command: String,
    pub is_dead: bool,
    /// Exit code, recorded once the pane is dead.
    pub dead_status: Option<i32>,
}

/// Result of a successful pane split.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaneRef {
    pub pane_id: String,
    /// Addressable target form `session:window.pane`.
    pub target: String,
}

/// One window in a session listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowInfo {
    /// Addressable target form `session:window`.
    pub target: String,
    pub name: String,
}

/// The process manager contract (§ pane/window/session hierarchy).
///
/// `list_session_panes` indexes every pane under three keys at once:
/// `session:window.pane`, the bare pane id, and `session:window`
/// (resolving to the window's first pane), so callers may look up by
/// whichever form they stored.
#[async_trait]
pub trait Pm: Send + Sync {
    /// Create the session if it does not exist yet.
    async fn ensure_session(&self, name: &str) -> Result<(), PmError>;

    async fn session_exists(&self, name: &str) -> Result<bool, PmError>;

    /// Create a window running a shell in `cwd`; returns the window target.
    async fn create_window(&self, session: &str, name: &str, cwd: &Path)
        -> Result<String, PmError>;

    /// Kill a window. Missing targets are not an error.
    async fn kill_window(&self, target: &str) -> Result<(), PmError>;

    async fn list_session_windows(&self, session: &str) -> Result<Vec<WindowInfo>, PmError>;

    /// Kill every window in the session whose target is not in `keep`,
    /// skipping the window containing `self_pane`. Returns the number of
    /// windows killed.
    async fn kill_orphan_windows(
        &self,
        session: &str,
        keep: &[String],
        self_pane: Option<&str>,
    ) -> Result<usize, PmError>;

    async fn select_window(&self, target: &str) -> Result<(), PmError>;

    /// Split the targeted pane. Returns `None` (with no state change)
    /// when the window is already at its pane limit.
    async fn split_pane(
        &self,
        target: &str,
        direction: SplitDirection,
        cwd: &Path,
    ) -> Result<Option<PaneRef>, PmError>;

    /// Kill a pane. Missing targets are not an error.
    async fn kill_pane(&self, target: &str) -> Result<(), PmError>;

    async fn get_pane_info(&self, target: &str) -> Result<Option<PaneInfo>, PmError>;

    async fn list_session_panes(&self, session: &str)
        -> Result<HashMap<String, PaneInfo>, PmError>;

    /// Write `command` into the pane, then a distinct submit key. Some
    /// interactive agent CLIs treat newline-as-text and newline-as-submit
    /// differently; the two writes must stay separate.
    async fn send_keys(&self, target: &str, command: &str) -> Result<(), PmError>;

    /// Write raw text with no submit.
    async fn send_literal(&self, target: &str, text: &str) -> Result<(), PmError>;

    /// Send named keys (e.g. `Enter`, `Escape`, `Up`).
    async fn send_raw_keys(&self, target: &str, keys: &[&str]) -> Result<(), PmError>;

    async fn send_ctrl_c(&self, target: &str) -> Result<(), PmError>;

    /// Capture pane text; `lines` limits to the last N lines.
    async fn capture_pane(&self, target: &str, lines: Option<usize>) -> Result<String, PmError>;

    /// Whether the current process runs inside a multiplexer session.
    fn is_inside_session(&self) -> bool;
}

/// Shared handle used across the engine and daemon.
pub type SharedPm = Arc<dyn Pm>;

/// Pick a backend: tmux when the binary is available, otherwise the
/// in-process PTY backend.
pub async fn detect_backend() -> SharedPm {
    if TmuxPm::available().await {
        Arc::new(TmuxPm::new())
    } else {
        tracing::debug!("tmux unavailable, using in-process pty backend");
        Arc::new(LocalPm::new())
    }
}

/// Make a name safe for window/branch use: lowercase, `[a-z0-9_-]` only,
/// runs of other characters collapsed to one `-`, trimmed, capped at 50
/// chars.
pub fn sanitize_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut last_dash = false;
    for c in name.chars().flat_map(|c| c.to_lowercase()) {
        if c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-' {
            out.push(c);
            last_dash = c == '-';
        } else if !last_dash && !out.is_empty() {
            out.push('-');
            last_dash = true;
        }
    }
    let trimmed = out.trim_matches('-');
    let mut s: String = trimmed.chars().take(50).collect();
    if s.is_empty() {
        s.push_str("unnamed");
    }
    s
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
