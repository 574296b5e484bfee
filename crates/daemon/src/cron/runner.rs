// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Default job runner: resolves swarm/prompt templates and spawns
//! agents into a fresh worktree.

use super::{JobRunner, ScheduleEntry};
use ppg_core::{ProjectPaths, SystemClock, WorktreeId};
use ppg_engine::agent::{spawn_agents_in_worktree, AgentConfig, BatchSpawnSpec, Placement};
use ppg_engine::worktree::{create, CreateParams};
use ppg_pm::Pm;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

/// Shape of `swarms/<name>.yaml`.
#[derive(Debug, Clone, Deserialize)]
pub struct SwarmSpec {
    /// Prompt template name under `prompts/`.
    pub prompt: String,
    #[serde(default = "default_agents")]
    pub agents: usize,
    #[serde(default)]
    pub split: bool,
}

fn default_agents() -> usize {
    1
}

/// Spawns scheduled jobs through the engine.
pub struct TemplateRunner {
    root: PathBuf,
    pm: Arc<dyn Pm>,
}

impl TemplateRunner {
    pub fn new(root: PathBuf, pm: Arc<dyn Pm>) -> Self {
        Self { root, pm }
    }

    fn paths(&self) -> ProjectPaths {
        ProjectPaths::new(&self.root)
    }

    fn render_prompt(&self, template: &str, vars: &HashMap<String, String>) -> Result<String, String> {
        let path = self.paths().prompt_template(template);
        let text = std::fs::read_to_string(&path)
            .map_err(|e| format!("prompt template {template:?} unreadable: {e}"))?;
        Ok(interpolate(&text, vars))
    }

    async fn spawn(
        &self,
        entry: &ScheduleEntry,
        prompt_text: String,
        count: usize,
        placement: Placement,
    ) -> Result<(), String> {
        // Worktree names must be unique per firing.
        let suffix = WorktreeId::new();
        let name = format!("{}-{}", entry.name, &suffix.suffix()[..4]);
        let wt = create(
            &self.root,
            self.pm.as_ref(),
            &SystemClock,
            CreateParams { name, ..CreateParams::default() },
        )
        .await
        .map_err(|e| format!("worktree create failed: {e}"))?;

        spawn_agents_in_worktree(
            &self.root,
            self.pm.as_ref(),
            &SystemClock,
            &wt.id.to_string(),
            BatchSpawnSpec { count, config: AgentConfig::default(), prompt_text, placement },
        )
        .await
        .map_err(|e| format!("agent spawn failed: {e}"))?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl JobRunner for TemplateRunner {
    async fn fire(&self, entry: &ScheduleEntry) -> Result<(), String> {
        if let Some(prompt) = &entry.prompt {
            let text = self.render_prompt(prompt, &entry.vars)?;
            return self.spawn(entry, text, 1, Placement::Windows).await;
        }
        if let Some(swarm) = &entry.swarm {
            let path = self.paths().swarm_template(swarm);
            let yaml = std::fs::read_to_string(&path)
                .map_err(|e| format!("swarm template {swarm:?} unreadable: {e}"))?;
            let spec: SwarmSpec = serde_yaml::from_str(&yaml)
                .map_err(|e| format!("swarm template {swarm:?} malformed: {e}"))?;
            let text = self.render_prompt(&spec.prompt, &entry.vars)?;
            let placement = if spec.split { Placement::Split } else { Placement::Windows };
            return self.spawn(entry, text, spec.agents.max(1), placement).await;
        }
        Err(format!("schedule {:?} has no target", entry.name))
    }
}

/// Replace `{{key}}` with its value; unknown keys stay verbatim.
pub fn interpolate(template: &str, vars: &HashMap<String, String>) -> String {
    let mut out = template.to_string();
    for (key, value) in vars {
        out = out.replace(&format!("{{{{{key}}}}}"), value);
    }
    out
}

#[cfg(test)]
#[path = "runner_tests.rs"]
mod tests;
