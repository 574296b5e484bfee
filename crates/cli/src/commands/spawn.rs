// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `ppg spawn` / `ppg swarm` / `ppg prompt`.

use crate::exit_error::ExitError;
use crate::output::OutputMode;
use clap::Args;
use ppg_core::SystemClock;
use ppg_daemon::cron::{ScheduleEntry, TemplateRunner};
use ppg_engine::agent::{spawn_agents_in_worktree, AgentConfig, BatchSpawnSpec, Placement};
use ppg_engine::worktree::{create, CreateParams};
use ppg_pm::sanitize_name;
use std::collections::HashMap;
use std::path::Path;

#[derive(Args)]
pub struct SpawnArgs {
    /// The prompt handed to every agent
    pub prompt: String,

    /// Worktree/branch name (derived from the prompt when omitted)
    #[arg(long)]
    pub name: Option<String>,

    /// How many agents to spawn
    #[arg(long, default_value_t = 1)]
    pub agents: usize,

    /// One window with split panes instead of one window per agent
    #[arg(long)]
    pub split: bool,

    /// Base branch (defaults to the current branch)
    #[arg(long)]
    pub base: Option<String>,

    /// Spawn into an existing worktree instead of creating one
    #[arg(long)]
    pub worktree: Option<String>,

    /// Agent command to execute
    #[arg(long, default_value = "claude")]
    pub command: String,
}

#[derive(Args)]
pub struct TemplateArgs {
    /// Template name under `.ppg/prompts/` or `.ppg/swarms/`
    pub name: String,

    /// Template variables as key=value
    #[arg(long = "var", value_parser = parse_kv)]
    pub vars: Vec<(String, String)>,
}

pub(crate) fn parse_kv(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .ok_or_else(|| format!("expected key=value, got {raw:?}"))
}

pub async fn run(root: &Path, args: SpawnArgs, mode: OutputMode) -> Result<(), ExitError> {
    let pm = ppg_pm::detect_backend().await;

    let wt_ref = match &args.worktree {
        Some(existing) => existing.clone(),
        None => {
            let name = args.name.clone().unwrap_or_else(|| derive_name(&args.prompt));
            let wt = create(
                root,
                pm.as_ref(),
                &SystemClock,
                CreateParams { name, base: args.base.clone(), ..CreateParams::default() },
            )
            .await?;
            wt.id.to_string()
        }
    };

    let config = AgentConfig { command: args.command.clone(), ..AgentConfig::default() };
    let placement = if args.split { Placement::Split } else { Placement::Windows };
    let agents = spawn_agents_in_worktree(
        root,
        pm.as_ref(),
        &SystemClock,
        &wt_ref,
        BatchSpawnSpec {
            count: args.agents,
            config,
            prompt_text: args.prompt.clone(),
            placement,
        },
    )
    .await?;

    let ids: Vec<String> = agents.iter().map(|a| a.id.to_string()).collect();
    mode.success(
        &format!("spawned {} agent(s) in {}: {}", agents.len(), wt_ref, ids.join(", ")),
        &serde_json::json!({ "worktree": wt_ref, "agents": ids }),
    );
    Ok(())
}

/// First words of the prompt, made branch-safe.
fn derive_name(prompt: &str) -> String {
    let head: String = prompt.split_whitespace().take(4).collect::<Vec<_>>().join("-");
    sanitize_name(&head)
}

pub async fn swarm(root: &Path, args: TemplateArgs, mode: OutputMode) -> Result<(), ExitError> {
    fire_template(root, args, TemplateKind::Swarm, mode).await
}

pub async fn prompt(root: &Path, args: TemplateArgs, mode: OutputMode) -> Result<(), ExitError> {
    fire_template(root, args, TemplateKind::Prompt, mode).await
}

enum TemplateKind {
    Swarm,
    Prompt,
}

async fn fire_template(
    root: &Path,
    args: TemplateArgs,
    kind: TemplateKind,
    mode: OutputMode,
) -> Result<(), ExitError> {
    use ppg_daemon::cron::JobRunner;

    let pm = ppg_pm::detect_backend().await;
    let runner = TemplateRunner::new(root.to_path_buf(), pm);
    let vars: HashMap<String, String> = args.vars.into_iter().collect();
    let entry = match kind {
        TemplateKind::Swarm => ScheduleEntry {
            name: args.name.clone(),
            cron: "* * * * *".to_string(),
            swarm: Some(args.name.clone()),
            prompt: None,
            vars,
        },
        TemplateKind::Prompt => ScheduleEntry {
            name: args.name.clone(),
            cron: "* * * * *".to_string(),
            swarm: None,
            prompt: Some(args.name.clone()),
            vars,
        },
    };

    runner
        .fire(&entry)
        .await
        .map_err(|e| ExitError::new(ppg_core::ErrorCode::InvalidArgs, e))?;
    mode.success(
        &format!("spawned template {}", args.name),
        &serde_json::json!({ "template": args.name }),
    );
    Ok(())
}

#[cfg(test)]
#[path = "spawn_tests.rs"]
mod tests;
