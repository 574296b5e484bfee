// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scripted [`Pm`] implementation for tests.
//!
//! Holds a pane map that tests mutate directly, records every
//! destructive/IO call, and replays queued `capture_pane` outputs.

use crate::{PaneInfo, PaneRef, Pm, PmError, SplitDirection, WindowInfo};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::path::Path;

/// A recorded call against the fake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FakeCall {
    EnsureSession(String),
    CreateWindow { session: String, name: String },
    KillWindow(String),
    SelectWindow(String),
    SplitPane { target: String, direction: SplitDirection },
    KillPane(String),
    SendKeys { target: String, command: String },
    SendLiteral { target: String, text: String },
    SendRawKeys { target: String, keys: Vec<String> },
    SendCtrlC(String),
    CapturePane(String),
}

#[derive(Default)]
struct FakeState {
    sessions: HashMap<String, Vec<WindowInfo>>,
    panes: HashMap<String, PaneInfo>,
    captures: HashMap<String, VecDeque<String>>,
    calls: Vec<FakeCall>,
    next_window: u32,
    next_pane: u32,
    /// Targets whose capture_pane should fail.
    capture_errors: Vec<String>,
    split_budget: Option<usize>,
}

/// In-memory fake process manager.
#[derive(Default)]
pub struct FakePm {
    state: Mutex<FakeState>,
    pub inside_session: bool,
}

impl FakePm {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a pane under every target form it should resolve by.
    pub fn add_pane(&self, keys: &[&str], info: PaneInfo) {
        let mut st = self.state.lock();
        for key in keys {
            st.panes.insert((*key).to_string(), info.clone());
        }
    }

    pub fn remove_pane(&self, key: &str) {
        self.state.lock().panes.remove(key);
    }

    pub fn set_pane_command(&self, key: &str, command: &str) {
        let mut st = self.state.lock();
        if let Some(info) = st.panes.get_mut(key) {
            info.current_command = command.to_string();
        }
    }

    pub fn set_pane_dead(&self, key: &str, status: i32) {
        let mut st = self.state.lock();
        if let Some(info) = st.panes.get_mut(key) {
            info.is_dead = true;
            info.dead_status = Some(status);
            info.current_command = String::new();
        }
    }

    /// Queue a capture_pane result; the last queued value repeats.
    pub fn push_capture(&self, target: &str, text: &str) {
        self.state
            .lock()
            .captures
            .entry(target.to_string())
            .or_default()
            .push_back(text.to_string());
    }

    /// Make capture_pane fail for this target from now on.
    pub fn fail_capture(&self, target: &str) {
        self.state.lock().capture_errors.push(target.to_string());
    }

    /// Cap the number of successful splits (further splits return None).
    pub fn set_split_budget(&self, budget: usize) {
        self.state.lock().split_budget = Some(budget);
    }

    pub fn calls(&self) -> Vec<FakeCall> {
        self.state.lock().calls.clone()
    }

    pub fn calls_of<F: Fn(&FakeCall) -> bool>(&self, pred: F) -> Vec<FakeCall> {
        self.state.lock().calls.iter().filter(|c| pred(c)).cloned().collect()
    }
}

#[async_trait]
impl Pm for FakePm {
    async fn ensure_session(&self, name: &str) -> Result<(), PmError> {
        let mut st = self.state.lock();
        st.calls.push(FakeCall::EnsureSession(name.to_string()));
        st.sessions.entry(name.to_string()).or_default();
        Ok(())
    }

    async fn session_exists(&self, name: &str) -> Result<bool, PmError> {
        Ok(self.state.lock().sessions.contains_key(name))
    }

    async fn create_window(
        &self,
        session: &str,
        name: &str,
        _cwd: &Path,
    ) -> Result<String, PmError> {
        let mut st = self.state.lock();
        st.next_window += 1;
        st.next_pane += 1;
        let window_index = st.next_window;
        let pane_seq = st.next_pane;
        let target = format!("{session}:{window_index}");
        let pane_target = format!("{session}:{window_index}.0");
        let info = PaneInfo {
            pane_id: format!("%{pane_seq}"),
            pane_pid: Some(10_000 + pane_seq),
            current_command: "bash".to_string(),
            is_dead: false,
            dead_status: None,
        };
        st.panes.insert(pane_target, info.clone());
        st.panes.insert(target.clone(), info.clone());
        st.panes.insert(info.pane_id.clone(), info);
        st.calls.push(FakeCall::CreateWindow {
            session: session.to_string(),
            name: name.to_string(),
        });
        st.sessions
            .entry(session.to_string())
            .or_default()
            .push(WindowInfo { target: target.clone(), name: name.to_string() });
        Ok(target)
    }

    async fn kill_window(&self, target: &str) -> Result<(), PmError> {
        let mut st = self.state.lock();
        st.calls.push(FakeCall::KillWindow(target.to_string()));
        for windows in st.sessions.values_mut() {
            windows.retain(|w| w.target != target);
        }
        let prefix = format!("{target}.");
        st.panes.retain(|key, _| key != target && !key.starts_with(&prefix));
        Ok(())
    }

    async fn list_session_windows(&self, session: &str) -> Result<Vec<WindowInfo>, PmError> {
        Ok(self.state.lock().sessions.get(session).cloned().unwrap_or_default())
    }

    async fn kill_orphan_windows(
        &self,
        session: &str,
        keep: &[String],
        self_pane: Option<&str>,
    ) -> Result<usize, PmError> {
        let targets: Vec<String> = {
            let st = self.state.lock();
            st.sessions
                .get(session)
                .map(|windows| {
                    windows
                        .iter()
                        .filter(|w| !keep.contains(&w.target))
                        .filter(|w| {
                            let prefix = format!("{}.", w.target);
                            self_pane.is_none_or(|pane_id| {
                                !st.panes
                                    .iter()
                                    .any(|(k, p)| k.starts_with(&prefix) && p.pane_id == pane_id)
                            })
                        })
                        .map(|w| w.target.clone())
                        .collect()
                })
                .unwrap_or_default()
        };
        for target in &targets {
            self.kill_window(target).await?;
        }
        Ok(targets.len())
    }

    async fn select_window(&self, target: &str) -> Result<(), PmError> {
        self.state.lock().calls.push(FakeCall::SelectWindow(target.to_string()));
        Ok(())
    }

    async fn split_pane(
        &self,
        target: &str,
        direction: SplitDirection,
        _cwd: &Path,
    ) -> Result<Option<PaneRef>, PmError> {
        let mut st = self.state.lock();
        st.calls.push(FakeCall::SplitPane { target: target.to_string(), direction });
        if let Some(budget) = st.split_budget {
            if budget == 0 {
                return Ok(None);
            }
            st.split_budget = Some(budget - 1);
        }
        st.next_pane += 1;
        let pane_seq = st.next_pane;
        let window = target.split_once('.').map_or(target, |(w, _)| w);
        let pane_target = format!("{window}.{pane_seq}");
        let info = PaneInfo {
            pane_id: format!("%{pane_seq}"),
            pane_pid: Some(10_000 + pane_seq),
            current_command: "bash".to_string(),
            is_dead: false,
            dead_status: None,
        };
        st.panes.insert(pane_target.clone(), info.clone());
        st.panes.insert(info.pane_id.clone(), info.clone());
        Ok(Some(PaneRef { pane_id: info.pane_id, target: pane_target }))
    }

    async fn kill_pane(&self, target: &str) -> Result<(), PmError> {
        let mut st = self.state.lock();
        st.calls.push(FakeCall::KillPane(target.to_string()));
        let pane_id = st.panes.get(target).map(|p| p.pane_id.clone());
        st.panes.retain(|key, info| {
            key != target && Some(&info.pane_id) != pane_id.as_ref()
        });
        Ok(())
    }

    async fn get_pane_info(&self, target: &str) -> Result<Option<PaneInfo>, PmError> {
        Ok(self.state.lock().panes.get(target).cloned())
    }

    async fn list_session_panes(
        &self,
        _session: &str,
    ) -> Result<HashMap<String, PaneInfo>, PmError> {
        Ok(self.state.lock().panes.clone())
    }

    async fn send_keys(&self, target: &str, command: &str) -> Result<(), PmError> {
        self.state.lock().calls.push(FakeCall::SendKeys {
            target: target.to_string(),
            command: command.to_string(),
        });
        Ok(())
    }

    async fn send_literal(&self, target: &str, text: &str) -> Result<(), PmError> {
        self.state.lock().calls.push(FakeCall::SendLiteral {
            target: target.to_string(),
            text: text.to_string(),
        });
        Ok(())
    }

    async fn send_raw_keys(&self, target: &str, keys: &[&str]) -> Result<(), PmError> {
        self.state.lock().calls.push(FakeCall::SendRawKeys {
            target: target.to_string(),
            keys: keys.iter().map(|k| (*k).to_string()).collect(),
        });
        Ok(())
    }

    async fn send_ctrl_c(&self, target: &str) -> Result<(), PmError> {
        self.state.lock().calls.push(FakeCall::SendCtrlC(target.to_string()));
        Ok(())
    }

    async fn capture_pane(&self, target: &str, _lines: Option<usize>) -> Result<String, PmError> {
        let mut st = self.state.lock();
        st.calls.push(FakeCall::CapturePane(target.to_string()));
        if st.capture_errors.iter().any(|t| t == target) {
            return Err(PmError::TargetNotFound(target.to_string()));
        }
        let queue = st.captures.entry(target.to_string()).or_default();
        let text = if queue.len() > 1 {
            queue.pop_front().unwrap_or_default()
        } else {
            queue.front().cloned().unwrap_or_default()
        };
        Ok(text)
    }

    fn is_inside_session(&self) -> bool {
        self.inside_session
    }
}
