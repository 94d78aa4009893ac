//! `CronJob`: `spec.md` §4.6 Cron. The source's cron-expression parser is a
//! placeholder that always returns `now + 15m` (`spec.md` §9 design note);
//! this realizes the looser requirement it actually specifies — interval
//! scheduling with a monotonically advancing `next_run` — rather than a
//! full cron-expression grammar.

use chrono::{DateTime, Utc};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct CronJob {
    pub name: String,
    pub interval: Duration,
    pub next_run: DateTime<Utc>,
    pub last_run: Option<DateTime<Utc>>,
    pub is_running: bool,
    pub run_count: u64,
    pub error_count: u64,
}

impl CronJob {
    pub fn new(name: impl Into<String>, interval: Duration, now: DateTime<Utc>) -> Self {
        Self {
            name: name.into(),
            next_run: now + chrono::Duration::from_std(interval).unwrap_or(chrono::Duration::zero()),
            interval,
            last_run: None,
            is_running: false,
            run_count: 0,
            error_count: 0,
        }
    }

    pub fn due(&self, now: DateTime<Utc>) -> bool {
        !self.is_running && self.next_run <= now
    }

    pub fn mark_enqueued(&mut self, now: DateTime<Utc>) {
        self.is_running = true;
        self.last_run = Some(now);
        self.run_count += 1;
        self.next_run = now + chrono::Duration::from_std(self.interval).unwrap_or(chrono::Duration::zero());
    }

    pub fn mark_finished(&mut self, succeeded: bool) {
        self.is_running = false;
        if !succeeded {
            self.error_count += 1;
        }
    }
}
