// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

#[test]
fn ping_parses() {
    let cmd: ClientCommand = serde_json::from_str(r#"{"type":"ping"}"#).unwrap();
    assert_eq!(cmd, ClientCommand::Ping);
}

#[test]
fn subscribe_parses_camel_case() {
    let cmd: ClientCommand =
        serde_json::from_str(r#"{"type":"terminal:subscribe","agentId":"ag-aa11aa11"}"#).unwrap();
    assert_eq!(cmd, ClientCommand::TerminalSubscribe { agent_id: "ag-aa11aa11".to_string() });
}

#[test]
fn input_and_resize_parse() {
    let cmd: ClientCommand = serde_json::from_str(
        r#"{"type":"terminal:input","agentId":"ag-aa11aa11","data":"ls\r"}"#,
    )
    .unwrap();
    assert!(matches!(cmd, ClientCommand::TerminalInput { .. }));

    let cmd: ClientCommand = serde_json::from_str(
        r#"{"type":"terminal:resize","agentId":"ag-aa11aa11","cols":80,"rows":24}"#,
    )
    .unwrap();
    assert_eq!(
        cmd,
        ClientCommand::TerminalResize { agent_id: "ag-aa11aa11".to_string(), cols: 80, rows: 24 }
    );
}

#[parameterized(
    unknown_type = { r#"{"type":"shutdown"}"# },
    missing_tag = { r#"{"agentId":"ag-1"}"# },
    missing_field = { r#"{"type":"terminal:subscribe"}"# },
    wrong_field_type = { r#"{"type":"terminal:resize","agentId":"a","cols":"x","rows":1}"# },
)]
fn malformed_commands_fail_to_parse(json: &str) {
    assert!(serde_json::from_str::<ClientCommand>(json).is_err());
}

#[test]
fn terminal_event_wire_shape() {
    let event = ServerEvent::Terminal {
        agent_id: "ag-aa11aa11".to_string(),
        lines: vec!["a".to_string(), "b".to_string()],
    };
    assert_eq!(
        event.to_json(),
        r#"{"type":"terminal","agentId":"ag-aa11aa11","lines":["a","b"]}"#
    );
}

#[test]
fn error_event_wire_shape() {
    let event = ServerEvent::Error { code: WsErrorCode::InvalidCommand, message: None };
    assert_eq!(event.to_json(), r#"{"type":"error","code":"INVALID_COMMAND"}"#);
}

#[test]
fn agent_status_event_round_trips() {
    let event = ServerEvent::AgentStatus {
        agent_id: "ag-00000001".to_string(),
        worktree_id: "wt-abc12345".to_string(),
        status: AgentStatus::Idle,
        previous_status: AgentStatus::Running,
    };
    let json = event.to_json();
    assert!(json.contains(r#""type":"agent:status""#));
    assert!(json.contains(r#""previousStatus":"running""#));
    let back: ServerEvent = serde_json::from_str(&json).unwrap();
    assert_eq!(back, event);
}
