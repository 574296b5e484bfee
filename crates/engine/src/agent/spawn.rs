// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent spawning: prompt snapshots, exec-string assembly, placement.

use crate::EngineError;
use ppg_core::{truncate_prompt, Agent, AgentId, AgentStatus, Clock, ProjectPaths};
use ppg_pm::{sanitize_name, Pm, SplitDirection, MAX_PANES_PER_WINDOW};
use std::path::{Path, PathBuf};

/// How the agent binary is invoked. The command itself is opaque to the
/// engine; it is executed inside the pane's shell.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub name: String,
    /// Opaque label stored on the record, e.g. "claude".
    pub agent_type: String,
    pub command: String,
    /// Flag that precedes the prompt argument, e.g. `-p`. None passes
    /// the prompt as a bare argument.
    pub prompt_flag: Option<String>,
    /// Flag used to resume a recorded session.
    pub resume_flag: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            name: "claude".to_string(),
            agent_type: "claude".to_string(),
            command: "claude".to_string(),
            prompt_flag: None,
            resume_flag: "--resume".to_string(),
        }
    }
}

/// Parameters for spawning one agent into an existing pane.
pub struct SpawnParams {
    pub agent_id: AgentId,
    pub config: AgentConfig,
    pub prompt_text: String,
    pub worktree_path: PathBuf,
    pub pane_target: String,
    pub session_id: Option<String>,
}

/// Pane placement for batch spawns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Placement {
    /// One window per agent.
    #[default]
    Windows,
    /// One window, panes split alternately h/v.
    Split,
}

/// Batch spawn request for one worktree.
pub struct BatchSpawnSpec {
    pub count: usize,
    pub config: AgentConfig,
    pub prompt_text: String,
    pub placement: Placement,
}

/// The shell line sent to the pane.
///
/// `CLAUDECODE` is unset so an agent spawned from inside another agent's
/// session does not detect itself as nested; the prompt rides in a file
/// and is substituted at execution time.
pub fn build_exec_string(
    config: &AgentConfig,
    session_id: Option<&str>,
    prompt_file: &Path,
) -> String {
    let mut cmd = format!("unset CLAUDECODE; {}", config.command);
    if let Some(id) = session_id {
        cmd.push_str(&format!(" --session-id {id}"));
    }
    if let Some(flag) = &config.prompt_flag {
        cmd.push_str(&format!(" {flag}"));
    }
    cmd.push_str(&format!(" \"$(cat '{}')\"", prompt_file.display()));
    cmd
}

/// Spawn one agent: snapshot the prompt, send the exec string, return
/// the manifest record (status `running`, prompt truncated for storage).
pub async fn spawn_agent<C: Clock>(
    root: &Path,
    pm: &dyn Pm,
    clock: &C,
    params: SpawnParams,
) -> Result<Agent, EngineError> {
    let paths = ProjectPaths::new(root);
    let prompt_file = paths.agent_prompt(&params.agent_id);
    tokio::fs::create_dir_all(&paths.agent_prompts_dir).await?;
    tokio::fs::write(&prompt_file, &params.prompt_text).await?;

    let exec = build_exec_string(&params.config, params.session_id.as_deref(), &prompt_file);
    pm.send_keys(&params.pane_target, &exec).await?;

    tracing::info!(
        agent = %params.agent_id,
        pane = %params.pane_target,
        "spawned agent"
    );

    Ok(Agent {
        id: params.agent_id,
        name: params.config.name,
        agent_type: params.config.agent_type,
        status: AgentStatus::Running,
        tmux_target: params.pane_target,
        prompt: truncate_prompt(&params.prompt_text),
        session_id: params.session_id,
        started_at: clock.now_utc(),
        exit_code: None,
        completed_at: None,
    })
}

/// Spawn N agents into a worktree.
///
/// `Windows` placement creates one window per agent; `Split` creates a
/// single fresh window whose first agent takes the initial pane and the
/// rest split alternating horizontal/vertical.
pub async fn spawn_agents_in_worktree<C: Clock>(
    root: &Path,
    pm: &dyn Pm,
    clock: &C,
    wt_ref: &str,
    spec: BatchSpawnSpec,
) -> Result<Vec<Agent>, EngineError> {
    if spec.count == 0 {
        return Err(EngineError::InvalidArgs("agent count must be at least 1".into()));
    }
    if spec.placement == Placement::Split && spec.count > MAX_PANES_PER_WINDOW {
        return Err(EngineError::InvalidArgs(format!(
            "split placement caps at {MAX_PANES_PER_WINDOW} agents per window"
        )));
    }

    let manifest = ppg_store::read_manifest(root)?;
    let wt = manifest
        .resolve_worktree(wt_ref)
        .ok_or_else(|| EngineError::WorktreeNotFound(wt_ref.to_string()))?;
    let (wt_id, wt_name, wt_path) = (wt.id, wt.name.clone(), wt.path.clone());
    let session = manifest.session_name.clone();

    pm.ensure_session(&session).await?;

    // Allocate panes first, then send prompts, then record.
    let mut pane_targets: Vec<String> = Vec::with_capacity(spec.count);
    match spec.placement {
        Placement::Windows => {
            for i in 0..spec.count {
                let window_name = sanitize_name(&format!("{wt_name}-{}", i + 1));
                let window = pm.create_window(&session, &window_name, &wt_path).await?;
                pane_targets.push(first_pane_of(pm, &window).await?);
            }
        }
        Placement::Split => {
            let window_name = sanitize_name(&wt_name);
            let window = pm.create_window(&session, &window_name, &wt_path).await?;
            pane_targets.push(first_pane_of(pm, &window).await?);
            let mut direction = SplitDirection::Horizontal;
            for _ in 1..spec.count {
                let pane = pm
                    .split_pane(&window, direction, &wt_path)
                    .await?
                    .ok_or_else(|| {
                        EngineError::InvalidArgs("window is at its pane limit".into())
                    })?;
                pane_targets.push(pane.pane_id);
                direction = direction.toggled();
            }
        }
    }

    let mut agents = Vec::with_capacity(spec.count);
    for (i, pane_target) in pane_targets.into_iter().enumerate() {
        let mut config = spec.config.clone();
        if spec.count > 1 {
            config.name = format!("{}-{}", config.name, i + 1);
        }
        let agent = spawn_agent(
            root,
            pm,
            clock,
            SpawnParams {
                agent_id: AgentId::new(),
                config,
                prompt_text: spec.prompt_text.clone(),
                worktree_path: wt_path.clone(),
                pane_target,
                session_id: None,
            },
        )
        .await?;
        agents.push(agent);
    }

    let recorded = agents.clone();
    ppg_store::update_manifest::<_, EngineError, _, _>(root, |mut m| async move {
        for agent in recorded {
            m.insert_agent(&wt_id, agent)?;
        }
        Ok((m, ()))
    })
    .await?;

    Ok(agents)
}

/// The stable pane handle for a window's first pane.
pub(crate) async fn first_pane_of(pm: &dyn Pm, window: &str) -> Result<String, EngineError> {
    let info = pm
        .get_pane_info(window)
        .await?
        .ok_or_else(|| ppg_pm::PmError::TargetNotFound(window.to_string()))?;
    Ok(info.pane_id)
}

#[cfg(test)]
#[path = "spawn_tests.rs"]
mod tests;
