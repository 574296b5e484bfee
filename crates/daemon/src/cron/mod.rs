// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cron scheduler: fires swarm/prompt jobs from `schedules.yaml`.
//!
//! The daemon loop wakes every 30 seconds, hot-reloads the schedule
//! file when its mtime changes (keeping the old state if the reload
//! fails), fires every due entry concurrently with per-job error
//! isolation, and advances each entry's next-run time from its cron
//! expression.

mod runner;

pub use runner::TemplateRunner;

use chrono::{DateTime, Utc};
use cron::Schedule;
use parking_lot::Mutex;
use ppg_core::{Clock, ErrorCode, ProjectPaths};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::Write;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Fixed scheduler period.
pub const TICK_INTERVAL: Duration = Duration::from_secs(30);

/// Errors from schedule handling.
#[derive(Debug, Error)]
pub enum CronError {
    #[error("invalid schedule: {0}")]
    Invalid(String),

    #[error("schedules file unreadable: {0}")]
    Io(#[from] std::io::Error),

    #[error("schedules file malformed: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl CronError {
    pub fn code(&self) -> ErrorCode {
        match self {
            CronError::Invalid(_) | CronError::Yaml(_) => ErrorCode::InvalidArgs,
            CronError::Io(_) => ErrorCode::Internal,
        }
    }
}

/// One entry in `schedules.yaml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleEntry {
    pub name: String,
    /// 5-field cron expression.
    pub cron: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub swarm: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub vars: HashMap<String, String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct ScheduleFile {
    #[serde(default)]
    schedules: Vec<ScheduleEntry>,
}

/// Load and validate the schedule file; missing file is an empty set.
pub fn load_schedules(path: &Path) -> Result<Vec<ScheduleEntry>, CronError> {
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };
    let file: ScheduleFile = serde_yaml::from_str(&text)?;
    for entry in &file.schedules {
        validate_entry(entry)?;
    }
    Ok(file.schedules)
}

/// Name is `[A-Za-z0-9_-]+`, cron parses, exactly one of swarm/prompt.
pub fn validate_entry(entry: &ScheduleEntry) -> Result<(), CronError> {
    if entry.name.is_empty()
        || !entry
            .name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(CronError::Invalid(format!("unsafe schedule name: {:?}", entry.name)));
    }
    parse_cron(&entry.cron)?;
    match (&entry.swarm, &entry.prompt) {
        (Some(_), None) | (None, Some(_)) => Ok(()),
        _ => Err(CronError::Invalid(format!(
            "schedule {:?} must set exactly one of swarm/prompt",
            entry.name
        ))),
    }
}

/// Parse a 5-field expression. The `cron` crate wants a seconds field,
/// so a zero-seconds field is prepended after the field-count check.
pub fn parse_cron(expr: &str) -> Result<Schedule, CronError> {
    let fields = expr.split_whitespace().count();
    if fields != 5 {
        return Err(CronError::Invalid(format!(
            "cron expression must have 5 fields, got {fields}: {expr:?}"
        )));
    }
    Schedule::from_str(&format!("0 {expr}"))
        .map_err(|e| CronError::Invalid(format!("bad cron expression {expr:?}: {e}")))
}

/// Next fire time strictly after `after`.
pub fn next_run_after(expr: &str, after: DateTime<Utc>) -> Result<DateTime<Utc>, CronError> {
    let schedule = parse_cron(expr)?;
    schedule
        .after(&after)
        .next()
        .ok_or_else(|| CronError::Invalid(format!("cron expression never fires: {expr:?}")))
}

/// Fires one due schedule entry.
#[async_trait::async_trait]
pub trait JobRunner: Send + Sync {
    async fn fire(&self, entry: &ScheduleEntry) -> Result<(), String>;
}

struct EntryState {
    entry: ScheduleEntry,
    next_run_at: DateTime<Utc>,
}

/// The long-running scheduler.
pub struct CronDaemon<C: Clock> {
    paths: ProjectPaths,
    clock: C,
    runner: Arc<dyn JobRunner>,
    states: Mutex<Vec<EntryState>>,
    loaded_mtime: Mutex<Option<SystemTime>>,
    cancel: CancellationToken,
}

impl<C: Clock> CronDaemon<C> {
    pub fn new(root: &Path, clock: C, runner: Arc<dyn JobRunner>) -> Self {
        Self {
            paths: ProjectPaths::new(root),
            clock,
            runner,
            states: Mutex::new(Vec::new()),
            loaded_mtime: Mutex::new(None),
            cancel: CancellationToken::new(),
        }
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Run until cancelled. Ticks never overlap: the next sleep starts
    /// only after the previous tick (including its job joins) finished.
    pub async fn run(&self) {
        self.reload_if_changed(true);
        loop {
            tokio::select! {
                () = self.cancel.cancelled() => return,
                () = tokio::time::sleep(TICK_INTERVAL) => {}
            }
            self.tick().await;
        }
    }

    /// One scheduler cycle: hot-reload, fire due entries, advance.
    pub async fn tick(&self) {
        self.reload_if_changed(false);
        let now = self.clock.now_utc();

        let due: Vec<ScheduleEntry> = {
            let states = self.states.lock();
            states
                .iter()
                .filter(|s| now >= s.next_run_at)
                .map(|s| s.entry.clone())
                .collect()
        };
        if due.is_empty() {
            return;
        }

        // All due jobs fire concurrently; a failure only logs.
        let results = futures_util::future::join_all(due.iter().map(|entry| {
            let runner = Arc::clone(&self.runner);
            async move {
                self.log_line(&format!("Triggering schedule: {}", entry.name));
                runner.fire(entry).await
            }
        }))
        .await;

        for (entry, result) in due.iter().zip(results) {
            if let Err(e) = result {
                self.log_line(&format!("Schedule {} failed: {e}", entry.name));
                tracing::warn!(schedule = %entry.name, error = %e, "cron job failed");
            }
        }

        let mut states = self.states.lock();
        for state in states.iter_mut() {
            if now >= state.next_run_at {
                match next_run_after(&state.entry.cron, now) {
                    Ok(next) => state.next_run_at = next,
                    Err(e) => {
                        tracing::warn!(schedule = %state.entry.name, error = %e, "cron advance failed");
                        state.next_run_at = now + chrono::Duration::days(3650);
                    }
                }
            }
        }
    }

    /// Reload the schedule file when its mtime moved. A failed reload
    /// logs and keeps the previous in-memory state.
    fn reload_if_changed(&self, force: bool) {
        let mtime = std::fs::metadata(&self.paths.schedules_file)
            .and_then(|m| m.modified())
            .ok();
        {
            let loaded = self.loaded_mtime.lock();
            if !force && *loaded == mtime {
                return;
            }
        }

        match load_schedules(&self.paths.schedules_file) {
            Ok(entries) => {
                let now = self.clock.now_utc();
                let mut states = self.states.lock();
                let old: HashMap<String, DateTime<Utc>> =
                    states.drain(..).map(|s| (s.entry.name.clone(), s.next_run_at)).collect();
                for entry in entries {
                    // Keep an unchanged entry's already-computed next
                    // run so edits to one entry do not re-arm the rest.
                    let next_run_at = old
                        .get(&entry.name)
                        .copied()
                        .or_else(|| next_run_after(&entry.cron, now).ok());
                    let Some(next_run_at) = next_run_at else { continue };
                    states.push(EntryState { entry, next_run_at });
                }
                *self.loaded_mtime.lock() = mtime;
                self.log_line(&format!("Loaded {} schedule(s)", states.len()));
            }
            Err(e) => {
                self.log_line(&format!("Schedule reload failed: {e}"));
                tracing::warn!(error = %e, "schedule reload failed, keeping previous state");
            }
        }
    }

    /// Next run times by schedule name (for `cron list`).
    pub fn next_runs(&self) -> Vec<(String, DateTime<Utc>)> {
        self.states
            .lock()
            .iter()
            .map(|s| (s.entry.name.clone(), s.next_run_at))
            .collect()
    }

    fn log_line(&self, line: &str) {
        append_cron_log(&self.paths, line);
    }
}

/// Append one timestamped line to `logs/cron.log` (best-effort).
pub fn append_cron_log(paths: &ProjectPaths, line: &str) {
    let _ = std::fs::create_dir_all(&paths.logs_dir);
    let result = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&paths.cron_log)
        .and_then(|mut f| writeln!(f, "[{}] {line}", Utc::now().to_rfc3339()));
    if let Err(e) = result {
        tracing::warn!(error = %e, "cron log append failed");
    }
}

/// Write the cron PID file.
pub fn write_pid_file(paths: &ProjectPaths) -> std::io::Result<()> {
    std::fs::create_dir_all(&paths.ppg_dir)?;
    std::fs::write(&paths.cron_pid, format!("{}\n", std::process::id()))
}

pub fn remove_pid_file(paths: &ProjectPaths) {
    let _ = std::fs::remove_file(&paths.cron_pid);
}

/// Whether a cron daemon is alive: PID file exists and `kill(pid, 0)`
/// succeeds. A stale file is removed on the way out.
pub fn is_cron_running(root: &Path) -> Option<u32> {
    let paths = ProjectPaths::new(root);
    let pid: u32 = std::fs::read_to_string(&paths.cron_pid).ok()?.trim().parse().ok()?;
    let alive = nix::sys::signal::kill(nix::unistd::Pid::from_raw(pid as i32), None).is_ok();
    if alive {
        Some(pid)
    } else {
        remove_pid_file(&paths);
        None
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
