// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use ppg_core::FakeClock;

#[test]
fn five_failures_lock_out() {
    let limiter = RateLimiter::with_clock(FakeClock::new());
    for _ in 0..4 {
        limiter.record("1.2.3.4");
        assert!(limiter.check("1.2.3.4"));
    }
    limiter.record("1.2.3.4");
    assert!(!limiter.check("1.2.3.4"));
    // Other IPs are unaffected.
    assert!(limiter.check("5.6.7.8"));
}

#[test]
fn window_resets_exactly_at_five_minutes() {
    let clock = FakeClock::new();
    let limiter = RateLimiter::with_clock(clock.clone());
    for _ in 0..MAX_FAILURES {
        limiter.record("1.2.3.4");
    }
    assert!(!limiter.check("1.2.3.4"));

    clock.advance(WINDOW - Duration::from_millis(1));
    assert!(!limiter.check("1.2.3.4"), "still inside the window");

    clock.advance(Duration::from_millis(1));
    assert!(limiter.check("1.2.3.4"), "window must expire exactly at +5min");
}

#[test]
fn failure_after_expiry_starts_fresh_window() {
    let clock = FakeClock::new();
    let limiter = RateLimiter::with_clock(clock.clone());
    for _ in 0..MAX_FAILURES {
        limiter.record("1.2.3.4");
    }
    clock.advance(WINDOW);
    limiter.record("1.2.3.4");
    assert!(limiter.check("1.2.3.4"), "one failure in a fresh window");
}

#[test]
fn reset_clears_on_success() {
    let limiter = RateLimiter::with_clock(FakeClock::new());
    for _ in 0..MAX_FAILURES {
        limiter.record("1.2.3.4");
    }
    limiter.reset("1.2.3.4");
    assert!(limiter.check("1.2.3.4"));
    assert_eq!(limiter.tracked(), 0);
}

#[test]
fn map_is_bounded_at_capacity() {
    let clock = FakeClock::new();
    let limiter = RateLimiter::with_clock(clock.clone());
    for i in 0..MAX_ENTRIES {
        limiter.record(&format!("10.0.{}.{}", i / 256, i % 256));
    }
    assert_eq!(limiter.tracked(), MAX_ENTRIES);

    // Everything expires; the next record prunes instead of growing.
    clock.advance(WINDOW);
    limiter.record("99.99.99.99");
    assert!(limiter.tracked() <= MAX_ENTRIES);
    assert!(limiter.tracked() < MAX_ENTRIES / 2, "expired entries were not pruned");
}
