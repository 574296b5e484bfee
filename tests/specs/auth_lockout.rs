// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Auth rate-limit lockout against a live hub endpoint.

use crate::prelude::Project;
use ppg_daemon::{AuthStore, Hub, HubHooks, RateLimiter, TerminalStreamer};
use ppg_pm::FakePm;
use std::sync::Arc;
use std::time::Duration;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Error as WsError;

async fn start_endpoint(project: &Project) -> (std::net::SocketAddr, String) {
    let root = project.root().to_path_buf();
    let auth = Arc::new(AuthStore::new(root.join(".ppg/auth.json")));
    let token = auth.add_token("dashboard").unwrap();
    let pm: Arc<dyn ppg_pm::Pm> = Arc::new(FakePm::new());
    let streamer = Arc::new(TerminalStreamer::with_poll(pm, Duration::from_millis(50)));
    let hub = Arc::new(Hub::new(
        root,
        auth,
        Arc::new(RateLimiter::new()),
        streamer,
        HubHooks::default(),
    ));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        loop {
            let Ok((stream, peer)) = listener.accept().await else { break };
            let hub = Arc::clone(&hub);
            tokio::spawn(async move {
                hub.handle_connection(stream, peer.ip().to_string()).await;
            });
        }
    });
    (addr, token)
}

fn status_of(err: &WsError) -> Option<u16> {
    match err {
        WsError::Http(resp) => Some(resp.status().as_u16()),
        _ => None,
    }
}

#[tokio::test]
async fn five_failures_then_429_even_for_valid_token() {
    let project = Project::new().await;
    let (addr, token) = start_endpoint(&project).await;

    // First five bad tokens: 401 each.
    for attempt in 1..=5 {
        let err = connect_async(format!("ws://{addr}/ws?token=tk_bad"))
            .await
            .unwrap_err();
        assert_eq!(status_of(&err), Some(401), "attempt {attempt}");
    }

    // Sixth: locked out.
    let err = connect_async(format!("ws://{addr}/ws?token=tk_bad")).await.unwrap_err();
    assert_eq!(status_of(&err), Some(429));

    // Valid token during lockout is still refused.
    let err = connect_async(format!("ws://{addr}/ws?token={token}")).await.unwrap_err();
    assert_eq!(status_of(&err), Some(429));
}

#[tokio::test]
async fn valid_token_resets_failure_count() {
    let project = Project::new().await;
    let (addr, token) = start_endpoint(&project).await;

    for _ in 0..4 {
        let _ = connect_async(format!("ws://{addr}/ws?token=tk_bad")).await.unwrap_err();
    }
    // Success clears the slate...
    let (ws, _) = connect_async(format!("ws://{addr}/ws?token={token}")).await.unwrap();
    drop(ws);
    // ...so four more failures still return 401, not 429.
    for _ in 0..4 {
        let err = connect_async(format!("ws://{addr}/ws?token=tk_bad")).await.unwrap_err();
        assert_eq!(status_of(&err), Some(401));
    }
}
