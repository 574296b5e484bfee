// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent lifecycle: spawn, status derivation, kill, restart, resume.

mod kill;
mod restart;
mod spawn;
mod status;

pub use kill::{kill_agent, kill_agents, KillOutcome, KillSummary};
pub use restart::{restart_agent, resume_agent, RestartOptions};
pub use spawn::{
    build_exec_string, spawn_agent, spawn_agents_in_worktree, AgentConfig, BatchSpawnSpec,
    Placement, SpawnParams,
};
pub use status::{
    agent_status, check_agent_status, derive_status, refresh_all_statuses, StatusChange,
    IDLE_SHELLS,
};
