// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-process PTY backend.
//!
//! Maintains an in-memory registry of sessions → windows → panes. Each
//! pane owns one child shell on a pseudo-terminal; a reader thread drains
//! output into a bounded line buffer and records the exit status when the
//! child dies. Window layout is the persistent split tree in
//! [`tree::Node`].

mod buffer;
pub(crate) mod tree;

use crate::{
    PaneInfo, PaneRef, Pm, PmError, SplitDirection, WindowInfo, DEFAULT_SCROLLBACK_LINES,
};
use async_trait::async_trait;
use buffer::{OutputBuffer, Utf8Decoder};
use parking_lot::Mutex;
use portable_pty::{
    native_pty_system, Child, ChildKiller, CommandBuilder, MasterPty, PtySize, SlavePty,
};
use std::collections::{BTreeMap, HashMap};
use std::io::{Read, Write};
use std::path::Path;
use std::sync::Arc;
use tree::Node;

/// Exit state shared with the pane's reader thread.
#[derive(Default)]
struct PaneState {
    dead: bool,
    dead_status: Option<i32>,
}

/// One PTY-backed pane.
struct Pane {
    pane_id: String,
    /// Full target form `session:window.pane`.
    target: String,
    pid: Option<u32>,
    shell: String,
    state: Arc<Mutex<PaneState>>,
    output: Arc<Mutex<OutputBuffer>>,
    writer: Mutex<Box<dyn Write + Send>>,
    killer: Mutex<Box<dyn ChildKiller + Send + Sync>>,
    // Held so the PTY stays open for the pane's lifetime.
    _master: Mutex<Box<dyn MasterPty + Send>>,
}

impl Pane {
    fn info(&self) -> PaneInfo {
        let st = self.state.lock();
        PaneInfo {
            pane_id: self.pane_id.clone(),
            pane_pid: self.pid,
            current_command: if st.dead { String::new() } else { self.current_command() },
            is_dead: st.dead,
            dead_status: st.dead_status,
        }
    }

    /// Foreground command in the pane, falling back to the spawned shell.
    fn current_command(&self) -> String {
        self.pid.and_then(foreground_command).unwrap_or_else(|| self.shell.clone())
    }

    fn write_bytes(&self, bytes: &[u8]) {
        // Writes to dead panes are no-ops.
        if self.state.lock().dead {
            return;
        }
        let mut writer = self.writer.lock();
        if let Err(e) = writer.write_all(bytes).and_then(|()| writer.flush()) {
            tracing::debug!(pane = %self.pane_id, error = %e, "pane write failed");
        }
    }

    fn kill(&self) {
        if self.state.lock().dead {
            return;
        }
        if let Err(e) = self.killer.lock().kill() {
            tracing::debug!(pane = %self.pane_id, error = %e, "pane kill failed");
        }
    }
}

struct Window {
    index: u32,
    name: String,
    /// Target form `session:window`.
    target: String,
    tree: Node<Arc<Pane>>,
    panes: HashMap<String, Arc<Pane>>,
    next_pane_index: u32,
}

impl Window {
    fn first_pane(&self) -> Option<&Arc<Pane>> {
        self.tree.leaf_ids().first().and_then(|id| self.panes.get(*id))
    }

    fn last_pane_id(&self) -> Option<String> {
        self.tree.leaf_ids().last().map(|id| (*id).to_string())
    }
}

#[derive(Default)]
struct Session {
    windows: BTreeMap<u32, Window>,
    next_window_index: u32,
    active_window: Option<u32>,
}

#[derive(Default)]
struct State {
    sessions: HashMap<String, Session>,
    next_pane_id: u64,
}

/// In-process pseudo-terminal backend.
pub struct LocalPm {
    state: Mutex<State>,
    scrollback: usize,
}

impl Default for LocalPm {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalPm {
    pub fn new() -> Self {
        Self::with_scrollback(DEFAULT_SCROLLBACK_LINES)
    }

    pub fn with_scrollback(scrollback: usize) -> Self {
        Self { state: Mutex::new(State::default()), scrollback }
    }

    fn spawn_pane(
        &self,
        pane_id: String,
        target: String,
        cwd: &Path,
    ) -> Result<Arc<Pane>, PmError> {
        let shell_path = std::env::var("SHELL").unwrap_or_else(|_| "/bin/bash".to_string());
        let shell = shell_path.rsplit('/').next().unwrap_or("bash").to_string();

        let pty = native_pty_system();
        let pair = pty
            .openpty(PtySize { rows: 24, cols: 80, pixel_width: 0, pixel_height: 0 })
            .map_err(|e| PmError::Command(format!("openpty failed: {e}")))?;

        let mut cmd = CommandBuilder::new(&shell_path);
        cmd.cwd(cwd);
        let mut child = pair
            .slave
            .spawn_command(cmd)
            .map_err(|e| PmError::Command(format!("pty spawn failed: {e}")))?;
        drop(pair.slave);

        let killer = child.clone_killer();
        let pid = child.process_id();
        let mut reader = pair
            .master
            .try_clone_reader()
            .map_err(|e| PmError::Command(format!("pty reader failed: {e}")))?;
        let writer = pair
            .master
            .take_writer()
            .map_err(|e| PmError::Command(format!("pty writer failed: {e}")))?;

        let state = Arc::new(Mutex::new(PaneState::default()));
        let output = Arc::new(Mutex::new(OutputBuffer::new(self.scrollback)));

        // Reader thread: drain the PTY, then reap the child.
        let thread_state = Arc::clone(&state);
        let thread_output = Arc::clone(&output);
        let thread_pane_id = pane_id.clone();
        std::thread::spawn(move || {
            let mut decoder = Utf8Decoder::new();
            let mut buf = [0u8; 4096];
            loop {
                match reader.read(&mut buf) {
                    Ok(0) | Err(_) => break,
                    Ok(n) => {
                        let text = decoder.decode(&buf[..n]);
                        if !text.is_empty() {
                            thread_output.lock().push_chunk(&text);
                        }
                    }
                }
            }
            let status = child.wait().ok();
            let mut st = thread_state.lock();
            st.dead = true;
            st.dead_status = status.map(|s| s.exit_code() as i32);
            tracing::debug!(pane = %thread_pane_id, status = ?st.dead_status, "pane exited");
        });

        Ok(Arc::new(Pane {
            pane_id,
            target,
            pid,
            shell,
            state,
            output,
            writer: Mutex::new(writer),
            killer: Mutex::new(killer),
            _master: Mutex::new(pair.master),
        }))
    }

    fn find_pane(&self, target: &str) -> Option<Arc<Pane>> {
        let state = self.state.lock();
        if target.starts_with('%') {
            for session in state.sessions.values() {
                for window in session.windows.values() {
                    if let Some(pane) = window.panes.get(target) {
                        return Some(Arc::clone(pane));
                    }
                }
            }
            return None;
        }

        let (session_name, rest) = target.split_once(':')?;
        let session = state.sessions.get(session_name)?;
        match rest.split_once('.') {
            Some((window_idx, _)) => {
                let idx: u32 = window_idx.parse().ok()?;
                let window = session.windows.get(&idx)?;
                window
                    .panes
                    .values()
                    .find(|p| p.target == target)
                    .map(Arc::clone)
            }
            None => {
                let idx: u32 = rest.parse().ok()?;
                session.windows.get(&idx)?.first_pane().map(Arc::clone)
            }
        }
    }

    /// Resolve a target to its owning (session, window index).
    fn find_window_key(&self, target: &str) -> Option<(String, u32)> {
        let state = self.state.lock();
        if target.starts_with('%') {
            for (name, session) in &state.sessions {
                for window in session.windows.values() {
                    if window.panes.contains_key(target) {
                        return Some((name.clone(), window.index));
                    }
                }
            }
            return None;
        }
        let (session_name, rest) = target.split_once(':')?;
        let window_idx = rest.split_once('.').map_or(rest, |(w, _)| w);
        let idx: u32 = window_idx.parse().ok()?;
        state
            .sessions
            .get(session_name)
            .and_then(|s| s.windows.get(&idx))
            .map(|w| (session_name.to_string(), w.index))
    }
}

#[async_trait]
impl Pm for LocalPm {
    async fn ensure_session(&self, name: &str) -> Result<(), PmError> {
        let mut state = self.state.lock();
        state.sessions.entry(name.to_string()).or_insert_with(|| Session {
            next_window_index: 1,
            ..Session::default()
        });
        Ok(())
    }

    async fn session_exists(&self, name: &str) -> Result<bool, PmError> {
        Ok(self.state.lock().sessions.contains_key(name))
    }

    async fn create_window(
        &self,
        session: &str,
        name: &str,
        cwd: &Path,
    ) -> Result<String, PmError> {
        let (window_index, pane_id, window_target, pane_target) = {
            let mut state = self.state.lock();
            let pane_seq = {
                state.next_pane_id += 1;
                state.next_pane_id
            };
            let sess = state
                .sessions
                .get_mut(session)
                .ok_or_else(|| PmError::SessionNotFound(session.to_string()))?;
            let window_index = sess.next_window_index.max(1);
            sess.next_window_index = window_index + 1;
            (
                window_index,
                format!("%{pane_seq}"),
                format!("{session}:{window_index}"),
                format!("{session}:{window_index}.0"),
            )
        };

        let pane = self.spawn_pane(pane_id.clone(), pane_target, cwd)?;
        let tree = Node::leaf(pane_id.clone(), Some(Arc::clone(&pane)));

        let mut state = self.state.lock();
        let sess = state
            .sessions
            .get_mut(session)
            .ok_or_else(|| PmError::SessionNotFound(session.to_string()))?;
        sess.windows.insert(
            window_index,
            Window {
                index: window_index,
                name: name.to_string(),
                target: window_target.clone(),
                tree,
                panes: HashMap::from([(pane_id, pane)]),
                next_pane_index: 1,
            },
        );
        sess.active_window = Some(window_index);
        Ok(window_target)
    }

    async fn kill_window(&self, target: &str) -> Result<(), PmError> {
        let Some((session_name, window_index)) = self.find_window_key(target) else {
            return Ok(());
        };
        let removed = {
            let mut state = self.state.lock();
            state
                .sessions
                .get_mut(&session_name)
                .and_then(|s| s.windows.remove(&window_index))
        };
        if let Some(window) = removed {
            for pane in window.panes.values() {
                pane.kill();
            }
        }
        Ok(())
    }

    async fn list_session_windows(&self, session: &str) -> Result<Vec<WindowInfo>, PmError> {
        let state = self.state.lock();
        let sess = state
            .sessions
            .get(session)
            .ok_or_else(|| PmError::SessionNotFound(session.to_string()))?;
        Ok(sess
            .windows
            .values()
            .map(|w| WindowInfo { target: w.target.clone(), name: w.name.clone() })
            .collect())
    }

    async fn kill_orphan_windows(
        &self,
        session: &str,
        keep: &[String],
        self_pane: Option<&str>,
    ) -> Result<usize, PmError> {
        let targets: Vec<String> = {
            let state = self.state.lock();
            let sess = state
                .sessions
                .get(session)
                .ok_or_else(|| PmError::SessionNotFound(session.to_string()))?;
            sess.windows
                .values()
                .filter(|w| !keep.contains(&w.target))
                .filter(|w| match self_pane {
                    Some(pane_id) => !w.panes.contains_key(pane_id),
                    None => true,
                })
                .map(|w| w.target.clone())
                .collect()
        };
        for target in &targets {
            self.kill_window(target).await?;
        }
        Ok(targets.len())
    }

    async fn select_window(&self, target: &str) -> Result<(), PmError> {
        let (session_name, window_index) = self
            .find_window_key(target)
            .ok_or_else(|| PmError::TargetNotFound(target.to_string()))?;
        let mut state = self.state.lock();
        if let Some(sess) = state.sessions.get_mut(&session_name) {
            sess.active_window = Some(window_index);
        }
        Ok(())
    }

    async fn split_pane(
        &self,
        target: &str,
        direction: SplitDirection,
        cwd: &Path,
    ) -> Result<Option<PaneRef>, PmError> {
        let (session_name, window_index) = self
            .find_window_key(target)
            .ok_or_else(|| PmError::TargetNotFound(target.to_string()))?;

        // Resolve the reference leaf and check the grid before spawning.
        let (ref_leaf, pane_id, pane_target) = {
            let mut state = self.state.lock();
            let pane_seq = {
                state.next_pane_id += 1;
                state.next_pane_id
            };
            let window = state
                .sessions
                .get_mut(&session_name)
                .and_then(|s| s.windows.get_mut(&window_index))
                .ok_or_else(|| PmError::TargetNotFound(target.to_string()))?;

            let ref_leaf = if target.contains('.') || target.starts_with('%') {
                window
                    .panes
                    .values()
                    .find(|p| p.target == target || p.pane_id == target)
                    .map(|p| p.pane_id.clone())
            } else {
                window.last_pane_id()
            };
            let Some(ref_leaf) = ref_leaf else {
                return Err(PmError::TargetNotFound(target.to_string()));
            };

            if !window.tree.can_split(&ref_leaf, direction) {
                return Ok(None);
            }

            let pane_index = window.next_pane_index;
            window.next_pane_index += 1;
            (
                ref_leaf,
                format!("%{pane_seq}"),
                format!("{session_name}:{window_index}.{pane_index}"),
            )
        };

        let pane = self.spawn_pane(pane_id.clone(), pane_target.clone(), cwd)?;

        let mut state = self.state.lock();
        let window = state
            .sessions
            .get_mut(&session_name)
            .and_then(|s| s.windows.get_mut(&window_index))
            .ok_or_else(|| PmError::TargetNotFound(target.to_string()))?;

        let next = window
            .tree
            .splitting_leaf(&ref_leaf, &pane_id, direction, 0.5)
            .and_then(|t| t.setting_entry(&pane_id, Arc::clone(&pane)))
            .ok_or_else(|| PmError::TargetNotFound(ref_leaf.clone()))?;
        window.tree = next;
        window.panes.insert(pane_id.clone(), pane);

        Ok(Some(PaneRef { pane_id, target: pane_target }))
    }

    async fn kill_pane(&self, target: &str) -> Result<(), PmError> {
        let Some(pane) = self.find_pane(target) else {
            return Ok(());
        };
        pane.kill();

        let Some((session_name, window_index)) = self.find_window_key(&pane.target) else {
            return Ok(());
        };
        let mut state = self.state.lock();
        let Some(sess) = state.sessions.get_mut(&session_name) else {
            return Ok(());
        };
        let Some(window) = sess.windows.get_mut(&window_index) else {
            return Ok(());
        };
        match window.tree.removing_leaf(&pane.pane_id) {
            Some(Some(next)) => {
                window.tree = next;
                window.panes.remove(&pane.pane_id);
            }
            Some(None) => {
                // Last pane: the window goes with it.
                sess.windows.remove(&window_index);
            }
            None => {}
        }
        Ok(())
    }

    async fn get_pane_info(&self, target: &str) -> Result<Option<PaneInfo>, PmError> {
        Ok(self.find_pane(target).map(|p| p.info()))
    }

    async fn list_session_panes(
        &self,
        session: &str,
    ) -> Result<HashMap<String, PaneInfo>, PmError> {
        let state = self.state.lock();
        let sess = state
            .sessions
            .get(session)
            .ok_or_else(|| PmError::SessionNotFound(session.to_string()))?;

        let mut map = HashMap::new();
        for window in sess.windows.values() {
            for (position, leaf_id) in window.tree.leaf_ids().iter().enumerate() {
                let Some(pane) = window.panes.get(*leaf_id) else { continue };
                let info = pane.info();
                if position == 0 {
                    map.insert(window.target.clone(), info.clone());
                }
                map.insert(pane.pane_id.clone(), info.clone());
                map.insert(pane.target.clone(), info);
            }
        }
        Ok(map)
    }

    async fn send_keys(&self, target: &str, command: &str) -> Result<(), PmError> {
        self.send_literal(target, command).await?;
        self.send_raw_keys(target, &["Enter"]).await
    }

    async fn send_literal(&self, target: &str, text: &str) -> Result<(), PmError> {
        let pane = self
            .find_pane(target)
            .ok_or_else(|| PmError::TargetNotFound(target.to_string()))?;
        pane.write_bytes(text.as_bytes());
        Ok(())
    }

    async fn send_raw_keys(&self, target: &str, keys: &[&str]) -> Result<(), PmError> {
        let pane = self
            .find_pane(target)
            .ok_or_else(|| PmError::TargetNotFound(target.to_string()))?;
        for key in keys {
            pane.write_bytes(&key_bytes(key));
        }
        Ok(())
    }

    async fn send_ctrl_c(&self, target: &str) -> Result<(), PmError> {
        self.send_raw_keys(target, &["C-c"]).await
    }

    async fn capture_pane(&self, target: &str, lines: Option<usize>) -> Result<String, PmError> {
        let pane = self
            .find_pane(target)
            .ok_or_else(|| PmError::TargetNotFound(target.to_string()))?;
        let tail = pane.output.lock().tail(lines);
        Ok(tail)
    }

    fn is_inside_session(&self) -> bool {
        false
    }
}

/// Translate a tmux-style key name into raw bytes.
fn key_bytes(key: &str) -> Vec<u8> {
    match key {
        "Enter" => b"\r".to_vec(),
        "Escape" => b"\x1b".to_vec(),
        "Tab" => b"\t".to_vec(),
        "Space" => b" ".to_vec(),
        "BSpace" | "Backspace" => b"\x7f".to_vec(),
        "Up" => b"\x1b[A".to_vec(),
        "Down" => b"\x1b[B".to_vec(),
        "Right" => b"\x1b[C".to_vec(),
        "Left" => b"\x1b[D".to_vec(),
        _ => match key.strip_prefix("C-") {
            Some(rest) if rest.len() == 1 => {
                let c = rest.as_bytes()[0].to_ascii_uppercase();
                if c.is_ascii_uppercase() {
                    vec![c - b'A' + 1]
                } else {
                    key.as_bytes().to_vec()
                }
            }
            _ => key.as_bytes().to_vec(),
        },
    }
}

/// Foreground command for a shell PID, via the controlling terminal's
/// process group (`/proc/<pid>/stat` field `tpgid`).
#[cfg(target_os = "linux")]
fn foreground_command(shell_pid: u32) -> Option<String> {
    let stat = std::fs::read_to_string(format!("/proc/{shell_pid}/stat")).ok()?;
    let rest = stat.rsplit_once(')')?.1;
    let fields: Vec<&str> = rest.split_whitespace().collect();
    // After the comm field: state ppid pgrp session tty_nr tpgid ...
    let tpgid: i32 = fields.get(5)?.parse().ok()?;
    if tpgid <= 0 {
        return None;
    }
    let comm = std::fs::read_to_string(format!("/proc/{tpgid}/comm")).ok()?;
    let comm = comm.trim();
    if comm.is_empty() {
        None
    } else {
        Some(comm.to_string())
    }
}

#[cfg(not(target_os = "linux"))]
fn foreground_command(_shell_pid: u32) -> Option<String> {
    None
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
