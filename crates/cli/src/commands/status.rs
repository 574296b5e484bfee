// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `ppg status` / `ppg logs` / `ppg attach`.

use crate::exit_error::ExitError;
use crate::output::OutputMode;
use ppg_core::{ErrorCode, SystemClock};
use ppg_engine::agent::refresh_all_statuses;
use std::path::Path;

pub async fn run(root: &Path, mode: OutputMode) -> Result<(), ExitError> {
    let pm = ppg_pm::detect_backend().await;
    refresh_all_statuses(root, pm.as_ref(), &SystemClock).await?;
    let manifest = ppg_store::read_manifest(root)?;

    if mode == OutputMode::Json {
        mode.success("", &manifest);
        return Ok(());
    }

    if manifest.worktrees.is_empty() {
        println!("no worktrees (try `ppg spawn`)");
        return Ok(());
    }
    for wt in manifest.worktrees.values() {
        println!("{}  {}  [{}]  {}", wt.id, wt.name, wt.status, wt.branch);
        if let Some(url) = &wt.pr_url {
            println!("    pr: {url}");
        }
        for agent in wt.agents.values() {
            let exit = agent
                .exit_code
                .map(|c| format!(" exit={c}"))
                .unwrap_or_default();
            println!("    {}  {}  [{}]{}", agent.id, agent.name, agent.status, exit);
        }
    }
    Ok(())
}

pub async fn logs(
    root: &Path,
    agent_ref: &str,
    lines: usize,
    mode: OutputMode,
) -> Result<(), ExitError> {
    let manifest = ppg_store::read_manifest(root)?;
    let (_, agent) = manifest
        .find_agent(agent_ref)
        .ok_or_else(|| ExitError::new(ErrorCode::AgentNotFound, format!("no agent {agent_ref}")))?;

    let pm = ppg_pm::detect_backend().await;
    let text = pm.capture_pane(&agent.tmux_target, Some(lines)).await?;
    mode.success(&text, &serde_json::json!({ "agentId": agent.id, "lines": text.lines().collect::<Vec<_>>() }));
    Ok(())
}

pub async fn attach(root: &Path, agent_ref: &str, mode: OutputMode) -> Result<(), ExitError> {
    let manifest = ppg_store::read_manifest(root)?;
    let (wt, agent) = manifest
        .find_agent(agent_ref)
        .ok_or_else(|| ExitError::new(ErrorCode::AgentNotFound, format!("no agent {agent_ref}")))?;

    let pm = ppg_pm::detect_backend().await;
    pm.select_window(&agent.tmux_target).await?;

    if pm.is_inside_session() {
        mode.success(
            &format!("selected {} ({})", agent.id, wt.name),
            &serde_json::json!({ "agentId": agent.id }),
        );
        return Ok(());
    }

    // Outside the multiplexer: hand the terminal over to tmux.
    let status = std::process::Command::new("tmux")
        .args(["attach", "-t", &manifest.session_name])
        .status()
        .map_err(|e| ExitError::new(ErrorCode::PmNotFound, format!("tmux attach failed: {e}")))?;
    if !status.success() {
        return Err(ExitError::internal("tmux attach exited with failure"));
    }
    Ok(())
}
