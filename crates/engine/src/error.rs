// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Engine error taxonomy.

use ppg_core::ErrorCode;
use thiserror::Error;

/// Errors surfaced by agent and worktree operations.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("worktree not found: {0}")]
    WorktreeNotFound(String),

    #[error("agent not found: {0}")]
    AgentNotFound(String),

    #[error("agents still running: {0}")]
    AgentsRunning(String),

    #[error("merge failed: {0}")]
    MergeFailed(String),

    #[error("prompt file not readable: {0}")]
    PromptNotFound(String),

    #[error("agent has no recorded session id: {0}")]
    NoSessionId(String),

    #[error("not a git repository: {0}")]
    NotGitRepo(String),

    #[error("invalid arguments: {0}")]
    InvalidArgs(String),

    #[error(transparent)]
    Store(#[from] ppg_store::StoreError),

    #[error(transparent)]
    Pm(#[from] ppg_pm::PmError),

    #[error(transparent)]
    Manifest(#[from] ppg_core::ManifestError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl EngineError {
    pub fn code(&self) -> ErrorCode {
        match self {
            EngineError::WorktreeNotFound(_) => ErrorCode::WorktreeNotFound,
            EngineError::AgentNotFound(_) => ErrorCode::AgentNotFound,
            EngineError::AgentsRunning(_) => ErrorCode::AgentsRunning,
            EngineError::MergeFailed(_) => ErrorCode::MergeFailed,
            EngineError::PromptNotFound(_) => ErrorCode::PromptNotFound,
            EngineError::NoSessionId(_) => ErrorCode::NoSessionId,
            EngineError::NotGitRepo(_) => ErrorCode::NotGitRepo,
            EngineError::InvalidArgs(_) => ErrorCode::InvalidArgs,
            EngineError::Store(e) => e.code(),
            EngineError::Pm(ppg_pm::PmError::PmNotFound) => ErrorCode::PmNotFound,
            EngineError::Pm(_) => ErrorCode::Internal,
            EngineError::Manifest(_) => ErrorCode::Internal,
            EngineError::Io(_) => ErrorCode::Internal,
        }
    }
}
