//! Replay of a recorded event feed through the monitor.
//!
//! Each line of the feed is one JSON event. The replay clock follows event
//! timestamps, and the coarse evaluation and sweep run whenever replay time
//! crosses their interval, so a day of readings replays in moments with the
//! same findings a live run would produce.

use std::io::BufRead;
use std::sync::Arc;

use anyhow::Context;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use aqua_monitor::{Clock, ManualClock, PondMonitor, SchedulerConfig};
use aqua_store::{PassthroughResolver, PondResolver};
use aqua_types::{FindingKey, LiveReading, PondId, UserId};

/// One line of the feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReplayEvent {
    Reading {
        pond_id: PondId,
        reading: LiveReading,
    },
    Mortality {
        pond_id: PondId,
        at: DateTime<Utc>,
        period_date: NaiveDate,
        rate_percent: f64,
    },
    Growth {
        pond_id: PondId,
        at: DateTime<Utc>,
        abw_grams: f64,
        #[serde(default)]
        note: Option<String>,
    },
    Feeding {
        pond_id: PondId,
        at: DateTime<Utc>,
        amount_kg: f64,
        #[serde(default)]
        suggested_kg: Option<f64>,
    },
    Target {
        pond_id: PondId,
        at: DateTime<Utc>,
        target_grams: Option<f64>,
    },
    Snooze {
        pond_id: PondId,
        at: DateTime<Utc>,
        user: UserId,
        key: FindingKey,
        hours: f64,
    },
    Resolve {
        pond_id: PondId,
        at: DateTime<Utc>,
        key: FindingKey,
    },
}

impl ReplayEvent {
    pub fn at(&self) -> DateTime<Utc> {
        match self {
            ReplayEvent::Reading { reading, .. } => reading.ts,
            ReplayEvent::Mortality { at, .. }
            | ReplayEvent::Growth { at, .. }
            | ReplayEvent::Feeding { at, .. }
            | ReplayEvent::Target { at, .. }
            | ReplayEvent::Snooze { at, .. }
            | ReplayEvent::Resolve { at, .. } => *at,
        }
    }

    pub fn pond_id(&self) -> &PondId {
        match self {
            ReplayEvent::Reading { pond_id, .. }
            | ReplayEvent::Mortality { pond_id, .. }
            | ReplayEvent::Growth { pond_id, .. }
            | ReplayEvent::Feeding { pond_id, .. }
            | ReplayEvent::Target { pond_id, .. }
            | ReplayEvent::Snooze { pond_id, .. }
            | ReplayEvent::Resolve { pond_id, .. } => pond_id,
        }
    }
}

/// Counters reported at the end of a replay.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReplaySummary {
    pub events: usize,
    pub rejected: usize,
    pub malformed: usize,
    pub coarse_ticks: usize,
    pub sweep_ticks: usize,
}

/// Drives a monitor from recorded events on a manual clock.
pub struct Replayer {
    monitor: Arc<PondMonitor>,
    resolver: Arc<dyn PondResolver>,
    clock: Arc<ManualClock>,
    coarse_every: Duration,
    sweep_every: Duration,
    next_coarse: Option<DateTime<Utc>>,
    next_sweep: Option<DateTime<Utc>>,
    summary: ReplaySummary,
}

impl Replayer {
    pub fn new(monitor: Arc<PondMonitor>, clock: Arc<ManualClock>, scheduler: &SchedulerConfig) -> Self {
        Self {
            monitor,
            resolver: Arc::new(PassthroughResolver),
            clock,
            coarse_every: Duration::seconds(scheduler.coarse_interval_secs.max(1) as i64),
            sweep_every: Duration::seconds(scheduler.sweep_interval_secs.max(1) as i64),
            next_coarse: None,
            next_sweep: None,
            summary: ReplaySummary::default(),
        }
    }

    /// Map feed pond ids (which may be viewer aliases) to canonical ids.
    pub fn with_resolver(mut self, resolver: Arc<dyn PondResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    /// Replay every line of `input`. Malformed lines are counted and skipped.
    pub async fn run<R: BufRead>(&mut self, input: R) -> anyhow::Result<()> {
        for (index, line) in input.lines().enumerate() {
            let line = line.with_context(|| format!("reading feed line {}", index + 1))?;
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            match serde_json::from_str::<ReplayEvent>(line) {
                Ok(event) => self.apply(event).await,
                Err(e) => {
                    warn!(line = index + 1, error = %e, "Skipping malformed feed line");
                    self.summary.malformed += 1;
                }
            }
        }
        Ok(())
    }

    /// Apply one event, first running any ticks that fall due before it.
    pub async fn apply(&mut self, event: ReplayEvent) {
        self.advance_to(event.at()).await;
        self.summary.events += 1;

        let pond_id = match self.resolver.resolve(event.pond_id().as_str()).await {
            Ok(pond_id) => pond_id,
            Err(e) => {
                warn!(pond_id = %event.pond_id(), error = %e, "Unresolvable pond id");
                self.summary.rejected += 1;
                return;
            }
        };
        let monitor = &self.monitor;
        let result = match event {
            ReplayEvent::Reading { reading, .. } => monitor.ingest_reading(&pond_id, reading).await,
            ReplayEvent::Mortality {
                period_date,
                rate_percent,
                ..
            } => monitor
                .record_mortality(&pond_id, period_date, rate_percent)
                .await
                .map(|_| ()),
            ReplayEvent::Growth {
                at, abw_grams, note, ..
            } => monitor
                .record_growth_measurement(&pond_id, at, abw_grams, note)
                .await
                .map(|_| ()),
            ReplayEvent::Feeding {
                at,
                amount_kg,
                suggested_kg,
                ..
            } => monitor
                .record_feeding(&pond_id, at, amount_kg, suggested_kg)
                .await
                .map(|_| ()),
            ReplayEvent::Target { target_grams, .. } => monitor
                .set_target_weight(&pond_id, target_grams)
                .await
                .map(|_| ()),
            ReplayEvent::Snooze { user, key, hours, .. } => monitor
                .snooze_finding(&user, &pond_id, key, hours)
                .await
                .map(|_| ()),
            ReplayEvent::Resolve { key, .. } => monitor.resolve_finding(&pond_id, key).await.map(|_| ()),
        };

        if let Err(e) = result {
            warn!(pond_id = %pond_id, error = %e, "Event rejected");
            self.summary.rejected += 1;
        }
    }

    /// Move the replay clock to `at`, running every tick due on the way.
    /// The clock never moves backwards.
    pub async fn advance_to(&mut self, at: DateTime<Utc>) {
        let (mut next_coarse, mut next_sweep) = match (self.next_coarse, self.next_sweep) {
            (Some(coarse), Some(sweep)) => (coarse, sweep),
            _ => (at, at),
        };

        loop {
            let due = next_coarse.min(next_sweep);
            if due >= at {
                break;
            }
            if due > self.clock.now() {
                self.clock.set(due);
            }
            if next_sweep == due {
                self.monitor.sweep_tick().await;
                self.summary.sweep_ticks += 1;
                next_sweep = due + self.sweep_every;
            }
            if next_coarse == due {
                self.monitor.coarse_tick().await;
                self.summary.coarse_ticks += 1;
                next_coarse = due + self.coarse_every;
            }
        }
        self.next_coarse = Some(next_coarse);
        self.next_sweep = Some(next_sweep);

        let now = self.clock.now();
        if at > now {
            self.clock.set(at);
        } else if at < now {
            debug!(%at, %now, "Out-of-order event; replay clock held");
        }
    }

    /// Run the final coarse evaluation and sweep at the current replay time.
    pub async fn finish(mut self) -> ReplaySummary {
        self.monitor.sweep_tick().await;
        self.monitor.coarse_tick().await;
        self.summary.sweep_ticks += 1;
        self.summary.coarse_ticks += 1;
        self.summary
    }
}
