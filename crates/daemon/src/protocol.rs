// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! WebSocket wire protocol.
//!
//! All frames are UTF-8 JSON tagged objects. Commands with an unknown
//! `type` (or missing required fields) fail to parse and are answered
//! with `{type:"error", code:"INVALID_COMMAND"}`.

use ppg_core::{AgentStatus, Manifest};
use serde::{Deserialize, Serialize};

/// Inbound commands from a connected client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientCommand {
    #[serde(rename = "ping")]
    Ping,

    #[serde(rename = "terminal:subscribe", rename_all = "camelCase")]
    TerminalSubscribe { agent_id: String },

    #[serde(rename = "terminal:unsubscribe", rename_all = "camelCase")]
    TerminalUnsubscribe { agent_id: String },

    #[serde(rename = "terminal:input", rename_all = "camelCase")]
    TerminalInput { agent_id: String, data: String },

    #[serde(rename = "terminal:resize", rename_all = "camelCase")]
    TerminalResize { agent_id: String, cols: u16, rows: u16 },
}

/// Machine-readable error codes on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WsErrorCode {
    InvalidCommand,
    TerminalInputFailed,
}

/// Outbound events the hub produces or relays.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerEvent {
    #[serde(rename = "pong")]
    Pong,

    #[serde(rename = "manifest:updated")]
    ManifestUpdated { manifest: Manifest },

    #[serde(rename = "agent:status", rename_all = "camelCase")]
    AgentStatus {
        agent_id: String,
        worktree_id: String,
        status: AgentStatus,
        previous_status: AgentStatus,
    },

    #[serde(rename = "terminal", rename_all = "camelCase")]
    Terminal { agent_id: String, lines: Vec<String> },

    #[serde(rename = "terminal:error", rename_all = "camelCase")]
    TerminalError { agent_id: String, error: String },

    #[serde(rename = "error")]
    Error {
        code: WsErrorCode,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
}

impl ServerEvent {
    /// Serialize for the wire; protocol types always serialize.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| {
            tracing::error!(error = %e, "server event serialization failed");
            r#"{"type":"error","code":"INVALID_COMMAND"}"#.to_string()
        })
    }
}

#[cfg(test)]
#[path = "protocol_tests.rs"]
mod tests;
