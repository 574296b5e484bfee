// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `ppg cron {start,stop,list,status,add,remove}`.

use crate::exit_error::ExitError;
use crate::output::OutputMode;
use clap::Subcommand;
use ppg_core::{ErrorCode, ProjectPaths};
use ppg_daemon::cron::{
    is_cron_running, load_schedules, next_run_after, validate_entry, ScheduleEntry,
};
use std::collections::HashMap;
use std::path::Path;

#[derive(Subcommand)]
pub enum CronCommand {
    /// Start the cron daemon in the background
    Start,
    /// Stop the running cron daemon
    Stop,
    /// List schedules and their next run times
    List,
    /// Show whether the cron daemon is running
    Status,
    /// Add a schedule entry
    Add {
        name: String,
        /// 5-field cron expression
        #[arg(long)]
        cron: String,
        #[arg(long, conflicts_with = "prompt")]
        swarm: Option<String>,
        #[arg(long)]
        prompt: Option<String>,
        /// Template variables as key=value
        #[arg(long = "var", value_parser = super::spawn::parse_kv)]
        vars: Vec<(String, String)>,
    },
    /// Remove a schedule entry
    Remove { name: String },
}

pub async fn run(root: &Path, command: CronCommand, mode: OutputMode) -> Result<(), ExitError> {
    let paths = ProjectPaths::new(root);
    match command {
        CronCommand::Start => {
            if let Some(pid) = is_cron_running(root) {
                return Err(ExitError::new(
                    ErrorCode::InvalidArgs,
                    format!("cron daemon already running (pid {pid})"),
                ));
            }
            let pid = spawn_daemon(root, "cron")?;
            mode.success(
                &format!("cron daemon started (pid {pid})"),
                &serde_json::json!({ "pid": pid }),
            );
            Ok(())
        }
        CronCommand::Stop => {
            let Some(pid) = is_cron_running(root) else {
                return Err(ExitError::new(ErrorCode::InvalidArgs, "cron daemon not running"));
            };
            nix::sys::signal::kill(
                nix::unistd::Pid::from_raw(pid as i32),
                nix::sys::signal::Signal::SIGTERM,
            )
            .map_err(|e| ExitError::internal(format!("signal failed: {e}")))?;
            mode.success(
                &format!("stopped cron daemon (pid {pid})"),
                &serde_json::json!({ "pid": pid }),
            );
            Ok(())
        }
        CronCommand::List => {
            let entries = load_schedules(&paths.schedules_file)?;
            if mode == OutputMode::Json {
                mode.success("", &entries);
                return Ok(());
            }
            if entries.is_empty() {
                println!("no schedules (add one with `ppg cron add`)");
                return Ok(());
            }
            let now = chrono::Utc::now();
            for entry in &entries {
                let target = entry
                    .swarm
                    .as_ref()
                    .map(|s| format!("swarm:{s}"))
                    .or_else(|| entry.prompt.as_ref().map(|p| format!("prompt:{p}")))
                    .unwrap_or_default();
                let next = next_run_after(&entry.cron, now)
                    .map(|t| t.to_rfc3339())
                    .unwrap_or_else(|_| "never".to_string());
                println!("{}  {}  {}  next: {}", entry.name, entry.cron, target, next);
            }
            Ok(())
        }
        CronCommand::Status => {
            let pid = is_cron_running(root);
            match pid {
                Some(pid) => mode.success(
                    &format!("cron daemon running (pid {pid})"),
                    &serde_json::json!({ "running": true, "pid": pid }),
                ),
                None => mode.success(
                    "cron daemon not running",
                    &serde_json::json!({ "running": false }),
                ),
            }
            Ok(())
        }
        CronCommand::Add { name, cron, swarm, prompt, vars } => {
            let entry = ScheduleEntry {
                name,
                cron,
                swarm,
                prompt,
                vars: vars.into_iter().collect::<HashMap<_, _>>(),
            };
            validate_entry(&entry)?;

            let mut entries = load_schedules(&paths.schedules_file)?;
            if entries.iter().any(|e| e.name == entry.name) {
                return Err(ExitError::new(
                    ErrorCode::InvalidArgs,
                    format!("schedule {:?} already exists", entry.name),
                ));
            }
            entries.push(entry.clone());
            write_schedules(&paths, &entries)?;
            mode.success(
                &format!("added schedule {}", entry.name),
                &serde_json::json!({ "name": entry.name }),
            );
            Ok(())
        }
        CronCommand::Remove { name } => {
            let mut entries = load_schedules(&paths.schedules_file)?;
            let before = entries.len();
            entries.retain(|e| e.name != name);
            if entries.len() == before {
                return Err(ExitError::new(
                    ErrorCode::InvalidArgs,
                    format!("no schedule named {name:?}"),
                ));
            }
            write_schedules(&paths, &entries)?;
            mode.success(
                &format!("removed schedule {name}"),
                &serde_json::json!({ "name": name }),
            );
            Ok(())
        }
    }
}

fn write_schedules(paths: &ProjectPaths, entries: &[ScheduleEntry]) -> Result<(), ExitError> {
    #[derive(serde::Serialize)]
    struct File<'a> {
        schedules: &'a [ScheduleEntry],
    }
    let yaml = serde_yaml::to_string(&File { schedules: entries })
        .map_err(|e| ExitError::internal(e.to_string()))?;
    std::fs::create_dir_all(&paths.ppg_dir)?;
    std::fs::write(&paths.schedules_file, yaml)?;
    Ok(())
}

/// Launch `ppgd <command>` detached; returns its PID.
pub(crate) fn spawn_daemon(root: &Path, command: &str) -> Result<u32, ExitError> {
    let ppgd = find_ppgd();
    let child = std::process::Command::new(ppgd)
        .arg(command)
        .arg("--root")
        .arg(root)
        .stdin(std::process::Stdio::null())
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .spawn()
        .map_err(|e| ExitError::internal(format!("could not launch ppgd: {e}")))?;
    Ok(child.id())
}

/// Prefer a `ppgd` sitting next to this binary, fall back to PATH.
fn find_ppgd() -> std::path::PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| {
            let sibling = exe.parent()?.join("ppgd");
            sibling.exists().then_some(sibling)
        })
        .unwrap_or_else(|| std::path::PathBuf::from("ppgd"))
}
