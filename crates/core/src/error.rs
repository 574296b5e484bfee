// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Stable machine-readable error codes.
//!
//! Every surfaced failure maps to one code; the CLI uses the code for its
//! exit status and for `--json` envelopes (`{ok:false, code, message}`).

use serde::{Deserialize, Serialize};

/// The error taxonomy shared by every crate in the workspace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    NotInitialized,
    NotGitRepo,
    ManifestLock,
    AgentNotFound,
    WorktreeNotFound,
    PromptNotFound,
    AgentsRunning,
    MergeFailed,
    InvalidArgs,
    DuplicateToken,
    AuthCorrupt,
    PmNotFound,
    NoSessionId,
    /// Unlisted I/O or subprocess failure.
    Internal,
}

impl ErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::NotInitialized => "NOT_INITIALIZED",
            ErrorCode::NotGitRepo => "NOT_GIT_REPO",
            ErrorCode::ManifestLock => "MANIFEST_LOCK",
            ErrorCode::AgentNotFound => "AGENT_NOT_FOUND",
            ErrorCode::WorktreeNotFound => "WORKTREE_NOT_FOUND",
            ErrorCode::PromptNotFound => "PROMPT_NOT_FOUND",
            ErrorCode::AgentsRunning => "AGENTS_RUNNING",
            ErrorCode::MergeFailed => "MERGE_FAILED",
            ErrorCode::InvalidArgs => "INVALID_ARGS",
            ErrorCode::DuplicateToken => "DUPLICATE_TOKEN",
            ErrorCode::AuthCorrupt => "AUTH_CORRUPT",
            ErrorCode::PmNotFound => "PM_NOT_FOUND",
            ErrorCode::NoSessionId => "NO_SESSION_ID",
            ErrorCode::Internal => "INTERNAL",
        }
    }

    /// Process exit code for the CLI.
    pub fn exit_code(self) -> i32 {
        match self {
            ErrorCode::NotInitialized => 3,
            ErrorCode::NotGitRepo => 4,
            ErrorCode::ManifestLock => 5,
            ErrorCode::AgentNotFound | ErrorCode::WorktreeNotFound => 6,
            ErrorCode::PromptNotFound => 7,
            ErrorCode::AgentsRunning => 8,
            ErrorCode::MergeFailed => 9,
            ErrorCode::InvalidArgs => 2,
            ErrorCode::DuplicateToken | ErrorCode::AuthCorrupt => 10,
            ErrorCode::PmNotFound => 11,
            ErrorCode::NoSessionId => 12,
            ErrorCode::Internal => 1,
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
