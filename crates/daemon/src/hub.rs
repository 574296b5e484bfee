// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! WebSocket hub: upgrade gating, per-client subscriptions, broadcast.
//!
//! The upgrade callback enforces, in order: path `/ws`, rate-limit
//! check (429), token presence (401), token validity (401, 500 on a
//! store failure). Successful auth resets the client IP's limiter and
//! admits the socket into the client set.

use crate::auth::AuthStore;
use crate::protocol::{ClientCommand, ServerEvent, WsErrorCode};
use crate::rate_limit::RateLimiter;
use crate::streamer::{SendFn, Subscription, TerminalStreamer};
use crate::watcher::WatchEvent;
use futures_util::future::BoxFuture;
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;

/// Host-provided handlers for terminal commands.
#[derive(Clone, Default)]
pub struct HubHooks {
    /// Receives `(agent_id, data)`; an `Err` is reported to the client
    /// as `TERMINAL_INPUT_FAILED`.
    pub on_terminal_input:
        Option<Arc<dyn Fn(String, String) -> BoxFuture<'static, Result<(), String>> + Send + Sync>>,
    /// Receives `(agent_id, cols, rows)`; best-effort.
    pub on_terminal_resize: Option<Arc<dyn Fn(String, u16, u16) + Send + Sync>>,
}

struct ClientState {
    tx: mpsc::UnboundedSender<Message>,
    subscribed_agents: HashMap<String, Subscription>,
}

/// The hub itself; one per serve process.
pub struct Hub {
    root: PathBuf,
    auth: Arc<AuthStore>,
    limiter: Arc<RateLimiter>,
    streamer: Arc<TerminalStreamer>,
    hooks: HubHooks,
    clients: Mutex<HashMap<u64, ClientState>>,
    next_client: AtomicU64,
}

impl Hub {
    pub fn new(
        root: PathBuf,
        auth: Arc<AuthStore>,
        limiter: Arc<RateLimiter>,
        streamer: Arc<TerminalStreamer>,
        hooks: HubHooks,
    ) -> Self {
        Self {
            root,
            auth,
            limiter,
            streamer,
            hooks,
            clients: Mutex::new(HashMap::new()),
            next_client: AtomicU64::new(1),
        }
    }

    pub fn client_count(&self) -> usize {
        self.clients.lock().len()
    }

    /// Serve one upgraded connection until it closes.
    pub async fn handle_connection<S>(self: &Arc<Self>, stream: S, ip: String)
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let auth = Arc::clone(&self.auth);
        let limiter = Arc::clone(&self.limiter);
        let gate_ip = ip.clone();

        let callback = move |req: &Request, resp: Response| -> Result<Response, ErrorResponse> {
            if req.uri().path() != "/ws" {
                return Err(error_response(StatusCode::NOT_FOUND));
            }
            if !limiter.check(&gate_ip) {
                return Err(error_response(StatusCode::TOO_MANY_REQUESTS));
            }
            let Some(token) = query_param(req.uri().query(), "token") else {
                limiter.record(&gate_ip);
                return Err(error_response(StatusCode::UNAUTHORIZED));
            };
            match auth.validate_token(&token) {
                Ok(Some(entry)) => {
                    limiter.reset(&gate_ip);
                    tracing::debug!(label = %entry.label, "ws client authenticated");
                    Ok(resp)
                }
                Ok(None) => {
                    limiter.record(&gate_ip);
                    Err(error_response(StatusCode::UNAUTHORIZED))
                }
                Err(e) => {
                    tracing::error!(error = %e, "auth store failed during upgrade");
                    Err(error_response(StatusCode::INTERNAL_SERVER_ERROR))
                }
            }
        };

        let ws = match tokio_tungstenite::accept_hdr_async(stream, callback).await {
            Ok(ws) => ws,
            Err(e) => {
                tracing::debug!(ip = %ip, error = %e, "ws upgrade rejected");
                return;
            }
        };
        let (mut sink, mut source) = ws.split();

        let client_id = self.next_client.fetch_add(1, Ordering::Relaxed);
        let (tx, mut rx) = mpsc::unbounded_channel::<Message>();
        self.clients.lock().insert(
            client_id,
            ClientState { tx, subscribed_agents: HashMap::new() },
        );
        tracing::info!(client = client_id, ip = %ip, "ws client connected");

        let writer = tokio::spawn(async move {
            while let Some(message) = rx.recv().await {
                if sink.send(message).await.is_err() {
                    break;
                }
            }
        });

        while let Some(message) = source.next().await {
            match message {
                Ok(Message::Text(text)) => self.handle_text(client_id, text.as_str()).await,
                Ok(Message::Close(_)) | Err(_) => break,
                Ok(_) => {} // Ping/Pong/Binary handled by tungstenite or ignored
            }
        }

        self.remove_client(client_id);
        writer.abort();
        tracing::info!(client = client_id, "ws client disconnected");
    }

    async fn handle_text(self: &Arc<Self>, client_id: u64, text: &str) {
        match serde_json::from_str::<ClientCommand>(text) {
            Ok(cmd) => self.handle_command(client_id, cmd).await,
            Err(_) => self.send_to(
                client_id,
                &ServerEvent::Error { code: WsErrorCode::InvalidCommand, message: None },
            ),
        }
    }

    pub(crate) async fn handle_command(self: &Arc<Self>, client_id: u64, cmd: ClientCommand) {
        match cmd {
            ClientCommand::Ping => self.send_to(client_id, &ServerEvent::Pong),

            ClientCommand::TerminalSubscribe { agent_id } => {
                let Some(pane_target) = self.pane_target_of(&agent_id) else {
                    self.send_to(
                        client_id,
                        &ServerEvent::Error {
                            code: WsErrorCode::InvalidCommand,
                            message: Some(format!("unknown agent: {agent_id}")),
                        },
                    );
                    return;
                };
                let send = self.sender_for(client_id);
                let subscription = self.streamer.subscribe(&agent_id, &pane_target, send);
                let mut clients = self.clients.lock();
                if let Some(client) = clients.get_mut(&client_id) {
                    if let Some(old) = client.subscribed_agents.insert(agent_id, subscription)
                    {
                        old.unsubscribe();
                    }
                }
            }

            ClientCommand::TerminalUnsubscribe { agent_id } => {
                let removed = {
                    let mut clients = self.clients.lock();
                    clients
                        .get_mut(&client_id)
                        .and_then(|c| c.subscribed_agents.remove(&agent_id))
                };
                if let Some(subscription) = removed {
                    subscription.unsubscribe();
                }
            }

            ClientCommand::TerminalInput { agent_id, data } => {
                let result = match &self.hooks.on_terminal_input {
                    Some(hook) => hook(agent_id, data).await,
                    None => Err("terminal input not supported".to_string()),
                };
                if let Err(e) = result {
                    self.send_to(
                        client_id,
                        &ServerEvent::Error {
                            code: WsErrorCode::TerminalInputFailed,
                            message: Some(e),
                        },
                    );
                }
            }

            ClientCommand::TerminalResize { agent_id, cols, rows } => {
                if let Some(hook) = &self.hooks.on_terminal_resize {
                    hook(agent_id, cols, rows);
                }
            }
        }
    }

    /// Push an event to every connected client, skipping closed sockets.
    pub fn broadcast(&self, event: &ServerEvent) {
        let message = Message::text(event.to_json());
        let clients = self.clients.lock();
        for client in clients.values() {
            let _ = client.tx.send(message.clone());
        }
    }

    /// Relay watcher events to all clients until the stream ends.
    pub fn relay_watch_events(
        self: Arc<Self>,
        mut rx: mpsc::UnboundedReceiver<WatchEvent>,
    ) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                let event = match event {
                    WatchEvent::ManifestUpdated(manifest) => {
                        ServerEvent::ManifestUpdated { manifest }
                    }
                    WatchEvent::AgentStatus {
                        agent_id,
                        worktree_id,
                        status,
                        previous_status,
                    } => ServerEvent::AgentStatus {
                        agent_id: agent_id.to_string(),
                        worktree_id: worktree_id.to_string(),
                        status,
                        previous_status,
                    },
                };
                self.broadcast(&event);
            }
        })
    }

    /// 1001 to every client, then clear the set.
    pub fn close(&self) {
        let mut clients = self.clients.lock();
        for (_, client) in clients.drain() {
            let frame = CloseFrame { code: CloseCode::Away, reason: "server shutdown".into() };
            let _ = client.tx.send(Message::Close(Some(frame)));
            for (_, subscription) in client.subscribed_agents {
                subscription.unsubscribe();
            }
        }
    }

    fn send_to(&self, client_id: u64, event: &ServerEvent) {
        let clients = self.clients.lock();
        if let Some(client) = clients.get(&client_id) {
            let _ = client.tx.send(Message::text(event.to_json()));
        }
    }

    /// Streamer callback bound to one client's outbound channel.
    fn sender_for(&self, client_id: u64) -> SendFn {
        let tx = {
            let clients = self.clients.lock();
            clients.get(&client_id).map(|c| c.tx.clone())
        };
        Arc::new(move |event: &ServerEvent| match &tx {
            Some(tx) => tx.send(Message::text(event.to_json())).map_err(|_| ()),
            None => Err(()),
        })
    }

    fn pane_target_of(&self, agent_ref: &str) -> Option<String> {
        let manifest = ppg_store::read_manifest(&self.root).ok()?;
        let (_, agent) = manifest.find_agent(agent_ref)?;
        Some(agent.tmux_target.clone())
    }

    fn remove_client(&self, client_id: u64) {
        let removed = self.clients.lock().remove(&client_id);
        if let Some(client) = removed {
            for (_, subscription) in client.subscribed_agents {
                subscription.unsubscribe();
            }
        }
    }
}

fn error_response(status: StatusCode) -> ErrorResponse {
    let mut resp = ErrorResponse::new(None);
    *resp.status_mut() = status;
    resp
}

/// Minimal query-string lookup (`a=1&b=2`), percent-decoding skipped:
/// tokens are base64url and never need it.
fn query_param(query: Option<&str>, key: &str) -> Option<String> {
    query?.split('&').find_map(|pair| {
        let (k, v) = pair.split_once('=')?;
        (k == key && !v.is_empty()).then(|| v.to_string())
    })
}

#[cfg(test)]
#[path = "hub_tests.rs"]
mod tests;
