// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `ppg restart` / `ppg resume`.

use crate::exit_error::ExitError;
use crate::output::OutputMode;
use ppg_core::SystemClock;
use ppg_engine::agent::{restart_agent, resume_agent, AgentConfig, RestartOptions};
use std::path::Path;

pub async fn restart(
    root: &Path,
    agent_ref: &str,
    prompt_override: Option<String>,
    mode: OutputMode,
) -> Result<(), ExitError> {
    let pm = ppg_pm::detect_backend().await;
    let fresh = restart_agent(
        root,
        pm.as_ref(),
        &SystemClock,
        agent_ref,
        RestartOptions { prompt_override, ..RestartOptions::default() },
    )
    .await?;

    mode.success(
        &format!("restarted {agent_ref} as {}", fresh.id),
        &serde_json::json!({ "oldAgent": agent_ref, "newAgent": fresh.id }),
    );
    Ok(())
}

pub async fn resume(root: &Path, agent_ref: &str, mode: OutputMode) -> Result<(), ExitError> {
    let pm = ppg_pm::detect_backend().await;
    let pane = resume_agent(root, pm.as_ref(), agent_ref, AgentConfig::default()).await?;
    mode.success(
        &format!("resumed {agent_ref} in {pane}"),
        &serde_json::json!({ "agent": agent_ref, "paneTarget": pane }),
    );
    Ok(())
}
