//! Daily batch flush schedule
//!
//! Fires the faculty batch flush at fixed local wall-clock times.

use anyhow::{bail, Context, Result};
use chrono::{Local, NaiveDateTime, NaiveTime, TimeDelta};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{error, info};

use crate::notifier::{FlushOutcome, Notifier};

/// Sorted, de-duplicated times of day at which to flush
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlushSchedule {
    times: Vec<NaiveTime>,
}

impl FlushSchedule {
    /// Parse a comma-separated list of `HH:MM` times
    pub fn parse(list: &str) -> Result<Self> {
        let mut times = list
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(|t| {
                NaiveTime::parse_from_str(t, "%H:%M")
                    .with_context(|| format!("Invalid flush time {:?}, expected HH:MM", t))
            })
            .collect::<Result<Vec<_>>>()?;

        if times.is_empty() {
            bail!("Flush schedule must list at least one time");
        }

        times.sort();
        times.dedup();
        Ok(Self { times })
    }

    pub fn times(&self) -> &[NaiveTime] {
        &self.times
    }

    /// First scheduled instant strictly after `now`
    pub fn next_after(&self, now: NaiveDateTime) -> NaiveDateTime {
        let today = now.date();
        self.times
            .iter()
            .map(|t| today.and_time(*t))
            .find(|at| *at > now)
            .unwrap_or_else(|| (today + TimeDelta::days(1)).and_time(self.times[0]))
    }
}

/// Run scheduled flushes until the task is dropped
pub async fn run(schedule: FlushSchedule, notifier: Arc<Notifier>) {
    info!(
        "Starting batch flush scheduler at {}",
        schedule
            .times()
            .iter()
            .map(|t| t.format("%H:%M").to_string())
            .collect::<Vec<_>>()
            .join(", ")
    );

    let mut last_slot: Option<NaiveDateTime> = None;

    loop {
        // Sleep can wake a hair early; never fire the same slot twice
        let mut now = Local::now().naive_local();
        if let Some(last) = last_slot {
            now = now.max(last);
        }
        let next = schedule.next_after(now);
        let wait = (next - Local::now().naive_local())
            .to_std()
            .unwrap_or(Duration::ZERO);

        info!("Next batch flush at {}", next.format("%Y-%m-%d %H:%M"));
        sleep(wait).await;
        last_slot = Some(next);

        match notifier.flush().await {
            Ok(FlushOutcome::Sent { count }) => {
                info!("Scheduled flush sent {} registration(s)", count)
            }
            Ok(FlushOutcome::NothingToSend) => info!("Scheduled flush: nothing to send"),
            Ok(FlushOutcome::AlreadyRunning) => info!("Scheduled flush skipped, already running"),
            // Entries stay queued for the next slot
            Err(e) => error!("Scheduled flush failed: {:#}", e),
        }
    }
}
