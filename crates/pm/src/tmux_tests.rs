// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

#[parameterized(
    cant_find = { "can't find window: ppg:7", true },
    no_such = { "no such session: ppg", true },
    uppercase = { "CAN'T FIND PANE %3", true },
    other = { "invalid option -- q", false },
)]
fn missing_target_detection(stderr: &str, expected: bool) {
    assert_eq!(is_missing_target(stderr), expected);
}

#[parameterized(
    pane_target = { "ppg:1.0", "ppg:1" },
    window_target = { "ppg:1", "ppg:1" },
    nested_dot = { "ppg:2.3", "ppg:2" },
)]
fn window_of_strips_pane(target: &str, expected: &str) {
    assert_eq!(window_of(target), expected);
}

#[test]
fn parse_pane_line_alive() {
    let line = "ppg:1.0\t%5\t4242\tnode\t0\t";
    let (target, info) = TmuxPm::parse_pane_line(line).unwrap();
    assert_eq!(target, "ppg:1.0");
    assert_eq!(info.pane_id, "%5");
    assert_eq!(info.pane_pid, Some(4242));
    assert_eq!(info.current_command, "node");
    assert!(!info.is_dead);
    assert_eq!(info.dead_status, None);
}

#[test]
fn parse_pane_line_dead_records_status() {
    let line = "ppg:1.1\t%6\t4243\tbash\t1\t137";
    let (_, info) = TmuxPm::parse_pane_line(line).unwrap();
    assert!(info.is_dead);
    assert_eq!(info.dead_status, Some(137));
}

#[test]
fn parse_pane_line_ignores_garbage() {
    assert!(TmuxPm::parse_pane_line("").is_none());
}

#[test]
fn session_ref_is_exact_match() {
    assert_eq!(TmuxPm::session_ref("ppg"), "=ppg");
}
