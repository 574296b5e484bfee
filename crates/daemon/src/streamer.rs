// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Terminal streamer: N subscribers per agent share one poll loop.
//!
//! Each agent stream captures its pane every 500 ms, diffs the snapshot
//! against the previous one, and broadcasts only the new lines.
//! Subscribers receive consecutive non-overlapping diffs in order; the
//! first subscriber starts the loop and the last one leaving stops it.

use crate::protocol::ServerEvent;
use parking_lot::Mutex;
use ppg_pm::Pm;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

pub const DEFAULT_POLL: Duration = Duration::from_millis(500);

/// Delivery callback; an `Err` evicts the subscriber immediately.
pub type SendFn = Arc<dyn Fn(&ServerEvent) -> Result<(), ()> + Send + Sync>;

/// Incremental diff between two pane snapshots.
///
/// Finds the longest suffix of `prev` that equals a prefix of `curr`
/// (searching from the longest possible overlap down) and returns the
/// remainder of `curr`. Scrollback sliding content up still matches;
/// a full TUI redraw degrades to resending the whole buffer.
pub fn diff_lines(prev: &[String], curr: &[String]) -> Vec<String> {
    if prev.is_empty() || curr.is_empty() {
        return curr.to_vec();
    }
    let max_overlap = prev.len().min(curr.len());
    for overlap in (1..=max_overlap).rev() {
        if prev[prev.len() - overlap..] == curr[..overlap] {
            return curr[overlap..].to_vec();
        }
    }
    curr.to_vec()
}

struct Stream {
    pane_target: String,
    subscribers: HashMap<u64, SendFn>,
    last_lines: Vec<String>,
    cancel: CancellationToken,
}

/// Handle for one subscription; unsubscribing is idempotent.
pub struct Subscription {
    agent_id: String,
    sub_id: u64,
    streams: Arc<Mutex<HashMap<String, Stream>>>,
}

impl Subscription {
    pub fn unsubscribe(&self) {
        let mut streams = self.streams.lock();
        let Some(stream) = streams.get_mut(&self.agent_id) else { return };
        stream.subscribers.remove(&self.sub_id);
        if stream.subscribers.is_empty() {
            stream.cancel.cancel();
            streams.remove(&self.agent_id);
        }
    }
}

/// Shared per-agent pane pollers.
pub struct TerminalStreamer {
    pm: Arc<dyn Pm>,
    poll: Duration,
    streams: Arc<Mutex<HashMap<String, Stream>>>,
    next_sub: AtomicU64,
}

impl TerminalStreamer {
    pub fn new(pm: Arc<dyn Pm>) -> Self {
        Self::with_poll(pm, DEFAULT_POLL)
    }

    pub fn with_poll(pm: Arc<dyn Pm>, poll: Duration) -> Self {
        Self { pm, poll, streams: Arc::new(Mutex::new(HashMap::new())), next_sub: AtomicU64::new(1) }
    }

    /// Join (or start) the stream for `agent_id`.
    pub fn subscribe(&self, agent_id: &str, pane_target: &str, send: SendFn) -> Subscription {
        let sub_id = self.next_sub.fetch_add(1, Ordering::Relaxed);
        let mut streams = self.streams.lock();

        match streams.get_mut(agent_id) {
            Some(stream) => {
                stream.subscribers.insert(sub_id, send);
            }
            None => {
                let cancel = CancellationToken::new();
                let mut subscribers = HashMap::new();
                subscribers.insert(sub_id, send);
                streams.insert(
                    agent_id.to_string(),
                    Stream {
                        pane_target: pane_target.to_string(),
                        subscribers,
                        last_lines: Vec::new(),
                        cancel: cancel.clone(),
                    },
                );
                self.spawn_poller(agent_id.to_string(), cancel);
            }
        }

        Subscription { agent_id: agent_id.to_string(), sub_id, streams: Arc::clone(&self.streams) }
    }

    pub fn active_streams(&self) -> usize {
        self.streams.lock().len()
    }

    /// Tear down every stream.
    pub fn destroy(&self) {
        let mut streams = self.streams.lock();
        for (_, stream) in streams.drain() {
            stream.cancel.cancel();
        }
    }

    fn spawn_poller(&self, agent_id: String, cancel: CancellationToken) {
        let pm = Arc::clone(&self.pm);
        let streams = Arc::clone(&self.streams);
        let poll = self.poll;

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    () = cancel.cancelled() => return,
                    () = tokio::time::sleep(poll) => {}
                }

                let pane_target = match streams.lock().get(&agent_id) {
                    Some(stream) => stream.pane_target.clone(),
                    None => return,
                };

                match pm.capture_pane(&pane_target, None).await {
                    Ok(text) => {
                        let curr: Vec<String> =
                            text.split('\n').map(|l| l.to_string()).collect();
                        let mut streams = streams.lock();
                        let Some(stream) = streams.get_mut(&agent_id) else { return };
                        let diff = diff_lines(&stream.last_lines, &curr);
                        stream.last_lines = curr;
                        if !diff.is_empty() {
                            let event = ServerEvent::Terminal {
                                agent_id: agent_id.clone(),
                                lines: diff,
                            };
                            deliver(stream, &event);
                        }
                        if stream.subscribers.is_empty() {
                            stream.cancel.cancel();
                            streams.remove(&agent_id);
                            return;
                        }
                    }
                    Err(e) => {
                        tracing::warn!(agent = %agent_id, error = %e, "terminal capture failed");
                        let mut streams = streams.lock();
                        if let Some(stream) = streams.get_mut(&agent_id) {
                            let event = ServerEvent::TerminalError {
                                agent_id: agent_id.clone(),
                                error: "Pane no longer available".to_string(),
                            };
                            deliver(stream, &event);
                            stream.cancel.cancel();
                        }
                        streams.remove(&agent_id);
                        return;
                    }
                }
            }
        });
    }
}

/// Send to every subscriber, evicting any whose callback fails.
fn deliver(stream: &mut Stream, event: &ServerEvent) {
    stream.subscribers.retain(|_, send| send(event).is_ok());
}

#[cfg(test)]
#[path = "streamer_tests.rs"]
mod tests;
