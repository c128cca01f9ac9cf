//! Nightly rebuild scheduling glue.
//!
//! The scheduler owns its own store connection and runs the windowed
//! rebuild once per day at a configured UTC hour. A failed run is logged
//! and dropped — the rebuild is idempotent, so the next scheduled run is
//! the retry mechanism.

use crate::config::RollupConfig;
use crate::rebuild::RebuildEngine;
use crate::store::RollupStore;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::thread;
use std::time::Duration;

pub struct NightlyScheduler {
    store: RollupStore,
    config: RollupConfig,
}

impl NightlyScheduler {
    pub fn new(store: RollupStore, config: RollupConfig) -> Self {
        Self { store, config }
    }

    /// Run one windowed rebuild, swallowing and logging any failure.
    pub fn run_once(&self) {
        let engine = RebuildEngine::new(&self.store, self.config.clone());
        match engine.windowed_rebuild(Utc::now()) {
            Ok(summary) => log::info!(
                "nightly rebuild done: {} months active, {} records scanned",
                summary.months_with_activity,
                summary.records_scanned
            ),
            Err(e) => log::error!("nightly rebuild failed (next run retries): {e}"),
        }
    }

    /// Block forever, firing [`run_once`](Self::run_once) at the
    /// configured hour each day.
    pub fn run_forever(&self) -> ! {
        loop {
            let wait = until_next_run(Utc::now(), self.config.rebuild_hour_utc);
            log::info!("next windowed rebuild in {}s", wait.as_secs());
            thread::sleep(wait);
            self.run_once();
        }
    }
}

/// Duration until the next occurrence of `hour_utc`:00.
fn until_next_run(now: DateTime<Utc>, hour_utc: u32) -> Duration {
    let today_run = now
        .date_naive()
        .and_hms_opt(hour_utc.min(23), 0, 0)
        .unwrap()
        .and_utc();
    let next = if today_run > now {
        today_run
    } else {
        today_run + ChronoDuration::days(1)
    };
    (next - now).to_std().unwrap_or(Duration::from_secs(0))
}
