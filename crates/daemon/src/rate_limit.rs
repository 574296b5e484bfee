// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-IP auth failure limiter: 5 failures in a 5-minute fixed window
//! locks the client out until the window elapses. In-memory only; the
//! map is pruned so it never grows past 10k entries.

use parking_lot::Mutex;
use ppg_core::{Clock, SystemClock};
use std::collections::HashMap;
use std::time::{Duration, Instant};

pub const MAX_FAILURES: u32 = 5;
pub const WINDOW: Duration = Duration::from_secs(5 * 60);
pub const MAX_ENTRIES: usize = 10_000;

struct Entry {
    failures: u32,
    window_start: Instant,
}

/// Fixed-window failure counter keyed by client IP.
pub struct RateLimiter<C: Clock = SystemClock> {
    clock: C,
    entries: Mutex<HashMap<String, Entry>>,
}

impl RateLimiter<SystemClock> {
    pub fn new() -> Self {
        Self::with_clock(SystemClock)
    }
}

impl Default for RateLimiter<SystemClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Clock> RateLimiter<C> {
    pub fn with_clock(clock: C) -> Self {
        Self { clock, entries: Mutex::new(HashMap::new()) }
    }

    /// False when the IP is locked out. The window expires exactly at
    /// `window_start + WINDOW`.
    pub fn check(&self, ip: &str) -> bool {
        let now = self.clock.now();
        let entries = self.entries.lock();
        match entries.get(ip) {
            Some(entry) if now.duration_since(entry.window_start) < WINDOW => {
                entry.failures < MAX_FAILURES
            }
            _ => true,
        }
    }

    /// Count one auth failure; starts a fresh window when the previous
    /// one has elapsed.
    pub fn record(&self, ip: &str) {
        let now = self.clock.now();
        let mut entries = self.entries.lock();
        if entries.len() >= MAX_ENTRIES && !entries.contains_key(ip) {
            prune(&mut entries, now);
        }
        match entries.get_mut(ip) {
            Some(entry) if now.duration_since(entry.window_start) < WINDOW => {
                entry.failures += 1;
            }
            _ => {
                entries.insert(ip.to_string(), Entry { failures: 1, window_start: now });
            }
        }
    }

    /// Clear an IP after a successful auth.
    pub fn reset(&self, ip: &str) {
        self.entries.lock().remove(ip);
    }

    pub fn tracked(&self) -> usize {
        self.entries.lock().len()
    }
}

/// Drop expired windows; if everything is live, drop the oldest to keep
/// the map bounded.
fn prune(entries: &mut HashMap<String, Entry>, now: Instant) {
    entries.retain(|_, e| now.duration_since(e.window_start) < WINDOW);
    while entries.len() >= MAX_ENTRIES {
        let oldest = entries
            .iter()
            .min_by_key(|(_, e)| e.window_start)
            .map(|(ip, _)| ip.clone());
        match oldest {
            Some(ip) => entries.remove(&ip),
            None => break,
        };
    }
}

#[cfg(test)]
#[path = "rate_limit_tests.rs"]
mod tests;
