// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Restart and resume: fresh windows for old agents.

use crate::agent::kill::kill_agent;
use crate::agent::spawn::{first_pane_of, spawn_agent, AgentConfig, SpawnParams};
use crate::EngineError;
use ppg_core::{Agent, AgentId, AgentStatus, Clock, ProjectPaths};
use ppg_pm::{sanitize_name, Pm};
use std::path::Path;
use std::time::Duration;

/// Options for [`restart_agent`].
pub struct RestartOptions {
    pub config: AgentConfig,
    /// Replaces the recorded prompt when set.
    pub prompt_override: Option<String>,
    pub grace: Duration,
}

impl Default for RestartOptions {
    fn default() -> Self {
        Self { config: AgentConfig::default(), prompt_override: None, grace: crate::KILL_GRACE }
    }
}

/// Kill the old agent, open a `<wt>-restart` window, spawn a fresh
/// agent with the prior prompt, and swap the records in one manifest
/// transaction (old → `gone`, new inserted under a new ID).
pub async fn restart_agent<C: Clock>(
    root: &Path,
    pm: &dyn Pm,
    clock: &C,
    agent_ref: &str,
    opts: RestartOptions,
) -> Result<Agent, EngineError> {
    let manifest = ppg_store::read_manifest(root)?;
    let (wt, old) = manifest
        .find_agent(agent_ref)
        .ok_or_else(|| EngineError::AgentNotFound(agent_ref.to_string()))?;
    let (wt_id, wt_name, wt_path) = (wt.id, wt.name.clone(), wt.path.clone());
    let (old_id, old_target, old_type) = (old.id, old.tmux_target.clone(), old.agent_type.clone());
    let session = manifest.session_name.clone();

    let paths = ProjectPaths::new(root);
    let prompt_text = match &opts.prompt_override {
        Some(text) => text.clone(),
        None => tokio::fs::read_to_string(paths.agent_prompt(&old_id))
            .await
            .map_err(|_| EngineError::PromptNotFound(old_id.to_string()))?,
    };

    kill_agent(pm, &old_target, opts.grace).await?;

    pm.ensure_session(&session).await?;
    let window = pm
        .create_window(&session, &sanitize_name(&format!("{wt_name}-restart")), &wt_path)
        .await?;
    let pane_target = first_pane_of(pm, &window).await?;

    let mut config = opts.config;
    config.agent_type = old_type;
    let agent = spawn_agent(
        root,
        pm,
        clock,
        SpawnParams {
            agent_id: AgentId::new(),
            config,
            prompt_text,
            worktree_path: wt_path,
            pane_target,
            session_id: None,
        },
    )
    .await?;

    let recorded = agent.clone();
    ppg_store::update_manifest::<_, EngineError, _, _>(root, |mut m| async move {
        if let Some((_, old)) = m.find_agent_mut(&old_id) {
            old.status = AgentStatus::Gone;
        }
        m.insert_agent(&wt_id, recorded)?;
        Ok((m, ()))
    })
    .await?;

    Ok(agent)
}

/// Reopen an agent with a recorded session ID in a fresh window,
/// replacing its pane target in place.
pub async fn resume_agent(
    root: &Path,
    pm: &dyn Pm,
    agent_ref: &str,
    config: AgentConfig,
) -> Result<String, EngineError> {
    let manifest = ppg_store::read_manifest(root)?;
    let (wt, agent) = manifest
        .find_agent(agent_ref)
        .ok_or_else(|| EngineError::AgentNotFound(agent_ref.to_string()))?;
    let session_id = agent
        .session_id
        .clone()
        .ok_or_else(|| EngineError::NoSessionId(agent.id.to_string()))?;
    let (wt_name, wt_path) = (wt.name.clone(), wt.path.clone());
    let agent_id = agent.id;
    let session = manifest.session_name.clone();

    pm.ensure_session(&session).await?;
    let window = pm
        .create_window(&session, &sanitize_name(&format!("{wt_name}-resume")), &wt_path)
        .await?;
    let pane_target = first_pane_of(pm, &window).await?;

    let exec = format!(
        "unset CLAUDECODE; {} {} {}",
        config.command, config.resume_flag, session_id
    );
    pm.send_keys(&pane_target, &exec).await?;

    let recorded = pane_target.clone();
    ppg_store::update_manifest::<_, EngineError, _, _>(root, |mut m| async move {
        let (_, agent) = m
            .find_agent_mut(&agent_id)
            .ok_or_else(|| EngineError::AgentNotFound(agent_id.to_string()))?;
        agent.tmux_target = recorded;
        agent.status = AgentStatus::Running;
        agent.exit_code = None;
        agent.completed_at = None;
        Ok((m, ()))
    })
    .await?;

    Ok(pane_target)
}

#[cfg(test)]
#[path = "restart_tests.rs"]
mod tests;
