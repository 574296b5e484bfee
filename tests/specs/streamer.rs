// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Terminal streamer diff scenario.

use ppg_daemon::{diff_lines, ServerEvent, TerminalStreamer};
use ppg_pm::FakePm;
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn subscriber_sees_full_snapshot_then_only_new_lines() {
    let pm = Arc::new(FakePm::new());
    pm.push_capture("s:1.0", "a\nb\nc");
    pm.push_capture("s:1.0", "b\nc\nd\ne");

    let streamer = TerminalStreamer::with_poll(
        Arc::clone(&pm) as Arc<dyn ppg_pm::Pm>,
        Duration::from_millis(20),
    );

    let events: Arc<parking_lot::Mutex<Vec<ServerEvent>>> =
        Arc::new(parking_lot::Mutex::new(Vec::new()));
    let sink = Arc::clone(&events);
    let subscription = streamer.subscribe(
        "ag-aa11",
        "s:1.0",
        Arc::new(move |event| {
            sink.lock().push(event.clone());
            Ok(())
        }),
    );

    for _ in 0..200 {
        if events.lock().len() >= 2 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    let got = events.lock().clone();
    assert!(got.len() >= 2, "only {} events arrived", got.len());
    assert_eq!(
        got[0],
        ServerEvent::Terminal {
            agent_id: "ag-aa11".to_string(),
            lines: vec!["a".to_string(), "b".to_string(), "c".to_string()],
        }
    );
    assert_eq!(
        got[1],
        ServerEvent::Terminal {
            agent_id: "ag-aa11".to_string(),
            lines: vec!["d".to_string(), "e".to_string()],
        }
    );
    subscription.unsubscribe();
}

#[test]
fn diff_lines_spec_properties() {
    let to = |items: &[&str]| items.iter().map(|s| s.to_string()).collect::<Vec<_>>();

    // diff(x, x) == []
    assert!(diff_lines(&to(&["a", "b"]), &to(&["a", "b"])).is_empty());
    // diff([], curr) == curr
    assert_eq!(diff_lines(&[], &to(&["a"])), to(&["a"]));
    // curr = prev ++ extra  =>  diff == extra
    assert_eq!(diff_lines(&to(&["a", "b"]), &to(&["a", "b", "c"])), to(&["c"]));
    // no shared suffix/prefix  =>  diff == curr
    assert_eq!(diff_lines(&to(&["a"]), &to(&["x", "y"])), to(&["x", "y"]));
}
