// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cron scenario: a nightly entry fires at 02:00 and re-arms.

use chrono::TimeZone;
use chrono::Utc;
use ppg_core::{FakeClock, ProjectPaths};
use ppg_daemon::cron::{CronDaemon, JobRunner, ScheduleEntry};
use std::sync::Arc;
use std::time::Duration;

struct Recorder {
    fired: parking_lot::Mutex<Vec<ScheduleEntry>>,
}

#[async_trait::async_trait]
impl JobRunner for Recorder {
    async fn fire(&self, entry: &ScheduleEntry) -> Result<(), String> {
        self.fired.lock().push(entry.clone());
        Ok(())
    }
}

#[tokio::test]
async fn nightly_entry_fires_at_two_am() {
    let dir = tempfile::tempdir().unwrap();
    let paths = ProjectPaths::new(dir.path());
    std::fs::create_dir_all(&paths.ppg_dir).unwrap();
    std::fs::write(
        &paths.schedules_file,
        "schedules:\n  - name: nightly\n    cron: \"0 2 * * *\"\n    swarm: rev\n",
    )
    .unwrap();

    let clock = FakeClock::new();
    let start = Utc.with_ymd_and_hms(2026, 5, 1, 1, 30, 0).single().unwrap();
    clock.set_epoch_ms(start.timestamp_millis() as u64);

    let runner = Arc::new(Recorder { fired: parking_lot::Mutex::new(Vec::new()) });
    let daemon = CronDaemon::new(dir.path(), clock.clone(), Arc::clone(&runner) as _);

    // Arm, then cross 02:00.
    daemon.tick().await;
    assert!(runner.fired.lock().is_empty());

    clock.advance(Duration::from_secs(30 * 60));
    daemon.tick().await;

    let fired = runner.fired.lock().clone();
    assert_eq!(fired.len(), 1);
    assert_eq!(fired[0].name, "nightly");
    assert_eq!(fired[0].swarm.as_deref(), Some("rev"));

    // Next run advanced to tomorrow 02:00.
    let next = daemon.next_runs();
    assert_eq!(next[0].1, Utc.with_ymd_and_hms(2026, 5, 2, 2, 0, 0).single().unwrap());

    // One trigger line in the log.
    let log = std::fs::read_to_string(&paths.cron_log).unwrap();
    assert_eq!(log.matches("Triggering schedule: nightly").count(), 1);
}
