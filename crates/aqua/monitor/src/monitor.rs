//! Pond monitor facade.
//!
//! The [`PondMonitor`] is the only surface collaborators (UI, exports,
//! notification senders) talk to. It validates manual log entries at the
//! write boundary, runs the relevant evaluators synchronously after each
//! write and applies their results through the lifecycle engine. Failures
//! inside evaluations are logged and swallowed: a bad reading or a store
//! hiccup never escapes into the caller's control flow once the write
//! itself has succeeded.

use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use aqua_growth::{
    actuals_from_measurements, can_record_now, compute_survival, live_forecast, survival_forecast,
    validate_correction, DaysToTarget, ForecastPoint, SurvivalState,
};
use aqua_insights::{
    ApplyReport, Clock, Evaluation, FeedingEvaluator, GrowthEvaluator, HeartbeatEvaluator,
    InsightStore, MortalityEvaluator, ResolveOutcome, SnoozeOverlay, WaterEvaluator,
};
use aqua_store::{
    get_typed, record_daily, set_typed, DocumentStore, EntryLog, InMemoryDocumentStore,
    InMemoryEntryLog, InMemoryPondDirectory, PondDirectory, UpdateFn,
};
use aqua_types::{
    EntryId, FeedingEvent, Finding, FindingKey, GrowthMeasurement, GrowthSetup, LiveReading,
    MortalityEntry, Pond, PondId, Signal, SnoozeEntry, UserId, ValidationError,
};

use crate::config::MonitorConfig;
use crate::error::{MonitorError, Result};
use crate::events::MonitorEvent;

/// Collection holding one [`GrowthSetup`] per pond.
pub const GROWTH_SETUP_COLLECTION: &str = "growth_setup";

/// Collection holding the latest online reading per pond. Its timestamp is
/// the pond's heartbeat.
pub const LATEST_READING_COLLECTION: &str = "latest_reading";

const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// Storage the monitor runs on.
pub struct MonitorBackends {
    pub store: Arc<dyn DocumentStore>,
    pub ponds: Arc<dyn PondDirectory>,
    pub mortality: Arc<dyn EntryLog<MortalityEntry>>,
    pub growth: Arc<dyn EntryLog<GrowthMeasurement>>,
    pub feeding: Arc<dyn EntryLog<FeedingEvent>>,
}

impl MonitorBackends {
    /// Process-local backends.
    pub fn in_memory() -> Self {
        Self {
            store: Arc::new(InMemoryDocumentStore::new()),
            ponds: Arc::new(InMemoryPondDirectory::new()),
            mortality: Arc::new(InMemoryEntryLog::new()),
            growth: Arc::new(InMemoryEntryLog::new()),
            feeding: Arc::new(InMemoryEntryLog::new()),
        }
    }
}

/// Baseline and live ABW forecasts for a pond.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Forecast {
    /// Rebase-aware long-horizon series, one point per period.
    pub baseline: Vec<ForecastPoint>,
    /// Short-horizon series from the latest anchor with environmental stress applied.
    pub live: Vec<ForecastPoint>,
    pub growth_multiplier: f64,
    pub target_weight_grams: Option<f64>,
}

impl Forecast {
    fn empty(target_weight_grams: Option<f64>) -> Self {
        Self {
            baseline: Vec::new(),
            live: Vec::new(),
            growth_multiplier: aqua_growth::NEUTRAL_FACTOR,
            target_weight_grams,
        }
    }
}

/// Core facade over forecasting and insight detection.
pub struct PondMonitor {
    config: MonitorConfig,
    clock: Arc<dyn Clock>,

    store: Arc<dyn DocumentStore>,
    ponds: Arc<dyn PondDirectory>,
    mortality: Arc<dyn EntryLog<MortalityEntry>>,
    growth: Arc<dyn EntryLog<GrowthMeasurement>>,
    feeding: Arc<dyn EntryLog<FeedingEvent>>,

    insights: InsightStore,
    snoozes: SnoozeOverlay,

    water: WaterEvaluator,
    mortality_evaluator: MortalityEvaluator,
    growth_evaluator: GrowthEvaluator,
    feeding_evaluator: FeedingEvaluator,
    heartbeat: HeartbeatEvaluator,

    /// Last reported device state. Absent means online.
    online: DashMap<PondId, bool>,

    /// Offline clears waiting out their grace delay.
    pending_clears: DashMap<PondId, CancellationToken>,

    event_tx: broadcast::Sender<MonitorEvent>,
}

impl PondMonitor {
    pub fn new(config: MonitorConfig, clock: Arc<dyn Clock>, backends: MonitorBackends) -> Self {
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let insight_config = &config.insights;

        Self {
            insights: InsightStore::new(backends.store.clone(), clock.clone()),
            snoozes: SnoozeOverlay::new(backends.store.clone(), clock.clone()),
            water: WaterEvaluator::new(insight_config.clone()),
            mortality_evaluator: MortalityEvaluator::new(insight_config.mortality.clone()),
            growth_evaluator: GrowthEvaluator::new(insight_config.growth.clone()),
            feeding_evaluator: FeedingEvaluator::new(
                insight_config.feeding.clone(),
                insight_config.ephemeral_ttl(),
            ),
            heartbeat: HeartbeatEvaluator::new(insight_config.heartbeat_grace()),
            store: backends.store,
            ponds: backends.ponds,
            mortality: backends.mortality,
            growth: backends.growth,
            feeding: backends.feeding,
            online: DashMap::new(),
            pending_clears: DashMap::new(),
            event_tx,
            clock,
            config,
        }
    }

    /// Monitor over process-local storage.
    pub fn in_memory(config: MonitorConfig, clock: Arc<dyn Clock>) -> Self {
        Self::new(config, clock, MonitorBackends::in_memory())
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    pub fn clock(&self) -> Arc<dyn Clock> {
        self.clock.clone()
    }

    pub fn insights(&self) -> &InsightStore {
        &self.insights
    }

    pub fn snoozes(&self) -> &SnoozeOverlay {
        &self.snoozes
    }

    pub fn document_store(&self) -> Arc<dyn DocumentStore> {
        self.store.clone()
    }

    /// Subscribe to monitor events.
    pub fn subscribe_events(&self) -> broadcast::Receiver<MonitorEvent> {
        self.event_tx.subscribe()
    }

    // ---- ponds -----------------------------------------------------------

    /// Register (or update) a pond and make sure it has a growth setup.
    #[instrument(skip(self, pond), fields(pond_id = %pond.id))]
    pub async fn register_pond(&self, pond: Pond) -> Result<()> {
        let pond_id = pond.id.clone();
        let cadence = pond.cadence_days;
        let initial_abw = pond.initial_abw_grams;
        self.ponds.upsert(pond).await?;

        self.update_setup(&pond_id, cadence, move |setup| {
            setup.cadence_days = cadence;
            if setup.current_abw.is_none() {
                setup.current_abw = initial_abw;
            }
        })
        .await?;

        info!(cadence_days = cadence, "Pond registered");
        let _ = self.event_tx.send(MonitorEvent::PondRegistered(pond_id));
        Ok(())
    }

    pub async fn pond(&self, pond_id: &PondId) -> Result<Pond> {
        self.ponds
            .get(pond_id)
            .await?
            .ok_or_else(|| MonitorError::PondNotFound(pond_id.clone()))
    }

    pub async fn ponds(&self) -> Result<Vec<Pond>> {
        Ok(self.ponds.list().await?)
    }

    pub async fn growth_setup(&self, pond_id: &PondId) -> Result<GrowthSetup> {
        let pond = self.pond(pond_id).await?;
        let setup: Option<GrowthSetup> =
            get_typed(self.store.as_ref(), GROWTH_SETUP_COLLECTION, pond_id.as_str()).await?;
        Ok(setup.unwrap_or_else(|| {
            let mut setup = GrowthSetup::new(pond_id.clone(), pond.cadence_days);
            setup.current_abw = pond.initial_abw_grams;
            setup
        }))
    }

    // ---- reads -----------------------------------------------------------

    pub async fn get_survival(&self, pond_id: &PondId) -> Result<SurvivalState> {
        let pond = self.pond(pond_id).await?;
        let entries = self.mortality.list(pond_id).await?;
        Ok(compute_survival(&entries, pond.initial_stocked_count))
    }

    /// Baseline forecast `horizon_periods` past the latest actual, plus the
    /// live forecast under the current water conditions.
    #[instrument(skip(self))]
    pub async fn get_forecast(&self, pond_id: &PondId, horizon_periods: u32) -> Result<Forecast> {
        let pond = self.pond(pond_id).await?;
        let setup = self.growth_setup(pond_id).await?;
        let model = self.config.growth.model(pond.cadence_days)?;
        let measurements = self.growth.list(pond_id).await?;
        let actuals = actuals_from_measurements(&pond, &measurements);

        let Some(seed) = seed_weight(&pond, &measurements) else {
            debug!("No seed weight; forecast is empty");
            return Ok(Forecast::empty(setup.target_weight_grams));
        };

        let baseline = model.forward_forecast(&actuals, seed, setup.target_weight_grams, horizon_periods);
        let reading = self.current_reading(pond_id).await?;
        let multiplier = self.config.growth.modulator.growth_multiplier(reading.as_ref());
        let live = live_forecast(&baseline, &actuals, multiplier);

        Ok(Forecast {
            baseline,
            live,
            growth_multiplier: multiplier,
            target_weight_grams: setup.target_weight_grams,
        })
    }

    /// Projected survival percentage per day for the next `days` days.
    pub async fn get_survival_forecast(&self, pond_id: &PondId, days: u32) -> Result<Vec<f64>> {
        let survival = self.get_survival(pond_id).await?;
        let reading = self.current_reading(pond_id).await?;
        let risk = self
            .config
            .growth
            .modulator
            .survival_risk_multiplier(reading.as_ref());
        Ok(survival_forecast(survival.survival_percent, days, risk))
    }

    pub async fn days_to_target(&self, pond_id: &PondId) -> Result<DaysToTarget> {
        let pond = self.pond(pond_id).await?;
        let setup = self.growth_setup(pond_id).await?;
        let model = self.config.growth.model(pond.cadence_days)?;
        Ok(model.days_to_target(setup.current_abw, setup.target_weight_grams))
    }

    /// Active findings the user has not snoozed, oldest first.
    pub async fn visible_findings(&self, pond_id: &PondId, user_id: &UserId) -> Result<Vec<Finding>> {
        self.pond(pond_id).await?;
        Ok(self.snoozes.visible(&self.insights, pond_id, user_id).await?)
    }

    // ---- manual logs -----------------------------------------------------

    /// Record a mortality entry. Rejected when it comes before the cadence
    /// allows or would push cumulative mortality over 100%.
    #[instrument(skip(self))]
    pub async fn record_mortality(
        &self,
        pond_id: &PondId,
        period_date: NaiveDate,
        rate_percent: f64,
    ) -> Result<MortalityEntry> {
        let pond = self.pond(pond_id).await?;
        let entry = MortalityEntry::new(pond_id.clone(), period_date, rate_percent, self.clock.now());
        let cadence = pond.cadence_days;

        self.mortality
            .append_checked(
                entry.clone(),
                Box::new(move |existing: &[MortalityEntry]| {
                    can_record_now(existing, period_date, rate_percent, cadence)
                }),
            )
            .await?;
        info!(rate_percent, "Mortality recorded");

        let evaluation = self.mortality_evaluation(pond_id).await;
        self.apply_logged(pond_id, "mortality", evaluation).await;
        Ok(entry)
    }

    /// Change the rate of an existing mortality entry under the same checks.
    #[instrument(skip(self))]
    pub async fn correct_mortality(&self, pond_id: &PondId, entry_id: EntryId, rate_percent: f64) -> Result<()> {
        self.pond(pond_id).await?;
        let entries = self.mortality.list(pond_id).await?;
        let Some(existing) = entries.iter().find(|e| e.id == entry_id) else {
            return Err(MonitorError::EntryNotFound(entry_id));
        };

        let mut corrected = existing.clone();
        corrected.mortality_rate_percent = rate_percent;
        let replaced = self
            .mortality
            .replace_checked(
                corrected,
                Box::new(move |current: &[MortalityEntry]| {
                    validate_correction(current, &entry_id, rate_percent).unwrap_or(Ok(()))
                }),
            )
            .await?;
        if !replaced {
            return Err(MonitorError::EntryNotFound(entry_id));
        }
        info!(rate_percent, "Mortality corrected");

        let evaluation = self.mortality_evaluation(pond_id).await;
        self.apply_logged(pond_id, "mortality", evaluation).await;
        Ok(())
    }

    /// Record a sampled ABW. The newest measurement becomes the forecast's
    /// rebase anchor.
    #[instrument(skip(self, note))]
    pub async fn record_growth_measurement(
        &self,
        pond_id: &PondId,
        recorded_at: DateTime<Utc>,
        abw_grams: f64,
        note: Option<String>,
    ) -> Result<GrowthMeasurement> {
        let pond = self.pond(pond_id).await?;
        if !abw_grams.is_finite() || abw_grams <= 0.0 {
            return Err(ValidationError::NonPositiveWeight(abw_grams).into());
        }

        let mut measurement = GrowthMeasurement::new(pond_id.clone(), recorded_at, abw_grams);
        if let Some(note) = note {
            measurement = measurement.with_note(note);
        }
        self.growth.append(measurement.clone()).await?;

        let anchor = measurement.clone();
        self.update_setup(pond_id, pond.cadence_days, move |setup| setup.apply_measurement(&anchor))
            .await?;
        info!(abw_grams, period = pond.period_index(recorded_at), "Growth measurement recorded");

        let evaluation = self.growth_evaluation(&pond).await;
        self.apply_logged(pond_id, "growth", evaluation).await;
        Ok(measurement)
    }

    /// Set or clear the harvest target weight.
    #[instrument(skip(self))]
    pub async fn set_target_weight(&self, pond_id: &PondId, target_grams: Option<f64>) -> Result<GrowthSetup> {
        let pond = self.pond(pond_id).await?;
        if let Some(target) = target_grams {
            if !target.is_finite() || target <= 0.0 {
                return Err(ValidationError::NonPositiveWeight(target).into());
            }
        }

        let setup = self
            .update_setup(pond_id, pond.cadence_days, move |setup| {
                setup.target_weight_grams = target_grams;
            })
            .await?;

        let evaluation = self.growth_evaluation(&pond).await;
        self.apply_logged(pond_id, "growth", evaluation).await;
        Ok(setup)
    }

    /// Record a feeding and check it against the suggested amount.
    #[instrument(skip(self))]
    pub async fn record_feeding(
        &self,
        pond_id: &PondId,
        fed_at: DateTime<Utc>,
        amount_kg: f64,
        suggested_kg: Option<f64>,
    ) -> Result<FeedingEvent> {
        self.pond(pond_id).await?;
        for amount in std::iter::once(amount_kg).chain(suggested_kg) {
            if !amount.is_finite() || amount <= 0.0 {
                return Err(ValidationError::NonPositiveAmount(amount).into());
            }
        }

        let mut event = FeedingEvent::new(pond_id.clone(), fed_at, amount_kg);
        if let Some(suggested) = suggested_kg {
            event = event.with_suggested(suggested);
        }
        self.feeding.append(event.clone()).await?;
        info!(amount_kg, "Feeding recorded");

        let evaluation = self.feeding_evaluation(pond_id, &event).await;
        self.apply_logged(pond_id, "feeding", evaluation).await;
        Ok(event)
    }

    // ---- live readings ---------------------------------------------------

    /// Ingest one live reading.
    ///
    /// Only an unknown pond is reported back. Aggregate and evaluator
    /// failures are logged so a single bad reading cannot stall the feed.
    pub async fn ingest_reading(self: &Arc<Self>, pond_id: &PondId, reading: LiveReading) -> Result<()> {
        self.pond(pond_id).await?;
        if !reading.online {
            return self.set_device_online(pond_id, false).await;
        }
        self.set_device_online(pond_id, true).await?;

        if let Err(e) = set_typed(
            self.store.as_ref(),
            LATEST_READING_COLLECTION,
            pond_id.as_str(),
            &reading,
        )
        .await
        {
            warn!(pond_id = %pond_id, error = %e, "Failed to store heartbeat");
        }

        let date = reading.ts.date_naive();
        for signal in Signal::ALL {
            let Some(value) = reading.value(signal) else {
                continue;
            };
            if let Err(e) = record_daily(self.store.as_ref(), pond_id, date, signal, value).await {
                warn!(pond_id = %pond_id, signal = %signal, error = %e, "Failed to update daily aggregate");
            }
        }

        let now = self.clock.now();
        for signal in Signal::ALL {
            let evaluation = match self.insights.signal_level(pond_id, signal).await {
                Ok(previous) => Ok(self.water.evaluate(signal, reading.value(signal), previous, now)),
                Err(e) => Err(e.into()),
            };
            self.apply_logged(pond_id, "water", evaluation).await;
        }

        let evaluation = self.heartbeat_evaluation(pond_id).await;
        self.apply_logged(pond_id, "heartbeat", evaluation).await;
        Ok(())
    }

    /// Track the device's online flag.
    ///
    /// Going offline schedules a clear of the pond's live-reading findings
    /// after the configured grace delay. Coming back online before it
    /// elapses cancels the clear.
    #[instrument(skip(self))]
    pub async fn set_device_online(self: &Arc<Self>, pond_id: &PondId, online: bool) -> Result<()> {
        self.pond(pond_id).await?;
        let was_online = self.online.insert(pond_id.clone(), online).unwrap_or(true);

        if online {
            if let Some((_, pending)) = self.pending_clears.remove(pond_id) {
                pending.cancel();
                debug!("Pending offline clear cancelled");
            }
            if !was_online {
                info!("Device back online");
                let _ = self.event_tx.send(MonitorEvent::DeviceOnline(pond_id.clone()));
            }
            return Ok(());
        }

        if !was_online {
            return Ok(());
        }

        info!(grace_secs = self.config.offline_clear_grace_secs, "Device offline; scheduling clear");
        let _ = self.event_tx.send(MonitorEvent::DeviceOffline(pond_id.clone()));

        let token = CancellationToken::new();
        if let Some(previous) = self.pending_clears.insert(pond_id.clone(), token.clone()) {
            previous.cancel();
        }

        let monitor = Arc::clone(self);
        let pond = pond_id.clone();
        let grace = self.config.offline_clear_grace();
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = tokio::time::sleep(grace) => {
                    monitor.pending_clears.remove(&pond);
                    monitor.clear_live_findings(&pond).await;
                }
            }
        });
        Ok(())
    }

    /// Whether the device last reported online.
    pub fn is_online(&self, pond_id: &PondId) -> bool {
        self.online.get(pond_id).map(|o| *o).unwrap_or(true)
    }

    /// Whether an offline clear is waiting out its grace delay.
    pub fn has_pending_clear(&self, pond_id: &PondId) -> bool {
        self.pending_clears.contains_key(pond_id)
    }

    // ---- findings --------------------------------------------------------

    /// Hide a finding from one user for `hours`.
    #[instrument(skip(self))]
    pub async fn snooze_finding(
        &self,
        user_id: &UserId,
        pond_id: &PondId,
        key: FindingKey,
        hours: f64,
    ) -> Result<SnoozeEntry> {
        self.pond(pond_id).await?;
        if !hours.is_finite() || hours <= 0.0 {
            return Err(ValidationError::InvalidSnoozeDuration(hours).into());
        }

        // Durations that overflow the timestamp range are rejected, not clamped.
        let until = Duration::try_milliseconds((hours * 3_600_000.0).round() as i64)
            .and_then(|snooze| self.clock.now().checked_add_signed(snooze))
            .ok_or(ValidationError::InvalidSnoozeDuration(hours))?;
        let entry = SnoozeEntry::new(user_id.clone(), key, until);
        self.snoozes.set_snooze(pond_id, &entry).await?;
        Ok(entry)
    }

    /// Explicit user resolution. Resolving an unknown key is a no-op.
    #[instrument(skip(self))]
    pub async fn resolve_finding(&self, pond_id: &PondId, key: FindingKey) -> Result<ResolveOutcome> {
        self.pond(pond_id).await?;
        let outcome = self.insights.resolve(pond_id, key).await?;
        if outcome == ResolveOutcome::Resolved {
            let _ = self.event_tx.send(MonitorEvent::FindingResolved {
                pond_id: pond_id.clone(),
                key,
            });
        }
        Ok(outcome)
    }

    /// Reset the pond for a new stocking cycle: the mortality, growth and
    /// feeding series and the growth setup are cleared and every finding is
    /// resolved.
    #[instrument(skip(self))]
    pub async fn start_new_cycle(
        &self,
        pond_id: &PondId,
        stocked_count: u64,
        stocked_at: DateTime<Utc>,
    ) -> Result<Pond> {
        let mut pond = self.pond(pond_id).await?;

        let mortality = self.mortality.clear(pond_id).await?;
        let growth = self.growth.clear(pond_id).await?;
        let feeding = self.feeding.clear(pond_id).await?;

        let mut setup = GrowthSetup::new(pond_id.clone(), pond.cadence_days);
        setup.current_abw = pond.initial_abw_grams;
        set_typed(self.store.as_ref(), GROWTH_SETUP_COLLECTION, pond_id.as_str(), &setup).await?;

        let resolved = self.insights.resolve_where(pond_id, |_| true).await?;
        self.publish(
            pond_id,
            &ApplyReport {
                activated: Vec::new(),
                resolved,
            },
        );
        self.insights.clear_signal_states(pond_id).await?;
        self.store.delete(LATEST_READING_COLLECTION, pond_id.as_str()).await?;
        if let Some((_, pending)) = self.pending_clears.remove(pond_id) {
            pending.cancel();
        }

        pond.initial_stocked_count = stocked_count;
        pond.stocked_at = stocked_at;
        self.ponds.upsert(pond.clone()).await?;

        info!(mortality, growth, feeding, stocked_count, "New stocking cycle started");
        let _ = self.event_tx.send(MonitorEvent::CycleStarted(pond_id.clone()));
        Ok(pond)
    }

    // ---- scheduled ticks -------------------------------------------------

    /// Re-run the mortality, growth and heartbeat evaluators for one pond.
    pub async fn evaluate_pond(&self, pond_id: &PondId) -> Result<ApplyReport> {
        let pond = self.pond(pond_id).await?;
        let mut report = ApplyReport::default();
        for evaluation in [
            self.mortality_evaluation(pond_id).await?,
            self.growth_evaluation(&pond).await?,
            self.heartbeat_evaluation(pond_id).await?,
        ] {
            let applied = self.apply(pond_id, evaluation).await?;
            report.activated.extend(applied.activated);
            report.resolved.extend(applied.resolved);
        }
        Ok(report)
    }

    /// Coarse re-evaluation of every pond. Never fails.
    pub async fn coarse_tick(&self) {
        let ponds = match self.ponds.list().await {
            Ok(ponds) => ponds,
            Err(e) => {
                warn!(error = %e, "Coarse tick could not list ponds");
                return;
            }
        };
        for pond in ponds {
            if let Err(e) = self.evaluate_pond(&pond.id).await {
                warn!(pond_id = %pond.id, error = %e, "Coarse evaluation failed");
            }
        }
    }

    /// Resolve expired findings and prune expired snoozes. Never fails.
    pub async fn sweep_tick(&self) {
        let ponds = match self.ponds.list().await {
            Ok(ponds) => ponds,
            Err(e) => {
                warn!(error = %e, "Sweep tick could not list ponds");
                return;
            }
        };
        for pond in ponds {
            match self.insights.sweep_expired(&pond.id).await {
                Ok(resolved) => self.publish(
                    &pond.id,
                    &ApplyReport {
                        activated: Vec::new(),
                        resolved,
                    },
                ),
                Err(e) => warn!(pond_id = %pond.id, error = %e, "Auto-resolve sweep failed"),
            }
            if let Err(e) = self.prune_snoozes(&pond.id).await {
                debug!(pond_id = %pond.id, error = %e, "Snooze pruning skipped");
            }
        }
    }

    // ---- internals -------------------------------------------------------

    async fn prune_snoozes(&self, pond_id: &PondId) -> Result<()> {
        let collection = aqua_insights::snooze_collection(pond_id);
        for doc in self.store.list(&collection).await? {
            self.snoozes.prune_expired(pond_id, &UserId::new(doc.key)).await?;
        }
        Ok(())
    }

    async fn current_reading(&self, pond_id: &PondId) -> Result<Option<LiveReading>> {
        if !self.is_online(pond_id) {
            return Ok(None);
        }
        Ok(get_typed(self.store.as_ref(), LATEST_READING_COLLECTION, pond_id.as_str()).await?)
    }

    async fn mortality_evaluation(&self, pond_id: &PondId) -> Result<Evaluation> {
        let entries = self.mortality.list(pond_id).await?;
        Ok(self.mortality_evaluator.evaluate(&entries, self.clock.now()))
    }

    async fn growth_evaluation(&self, pond: &Pond) -> Result<Evaluation> {
        let measurements = self.growth.list(&pond.id).await?;
        let Some(seed) = seed_weight(pond, &measurements) else {
            return Ok(Evaluation::none());
        };
        let setup = self.growth_setup(&pond.id).await?;
        let model = self.config.growth.model(pond.cadence_days)?;
        let actuals = actuals_from_measurements(pond, &measurements);
        Ok(self
            .growth_evaluator
            .evaluate(&model, &actuals, seed, setup.target_weight_grams))
    }

    async fn heartbeat_evaluation(&self, pond_id: &PondId) -> Result<Evaluation> {
        let latest: Option<LiveReading> =
            get_typed(self.store.as_ref(), LATEST_READING_COLLECTION, pond_id.as_str()).await?;
        Ok(self
            .heartbeat
            .evaluate(latest.map(|r| r.ts), self.clock.now()))
    }

    async fn feeding_evaluation(&self, pond_id: &PondId, event: &FeedingEvent) -> Result<Evaluation> {
        let survival = self.get_survival(pond_id).await?;
        let setup = self.growth_setup(pond_id).await?;
        Ok(self
            .feeding_evaluator
            .evaluate(event, survival.estimated_alive, setup.current_abw))
    }

    async fn apply(&self, pond_id: &PondId, evaluation: Evaluation) -> Result<ApplyReport> {
        let report = self.insights.apply(pond_id, evaluation).await?;
        self.publish(pond_id, &report);
        Ok(report)
    }

    /// Fire-and-forget application of an evaluation result.
    async fn apply_logged(&self, pond_id: &PondId, evaluator: &'static str, evaluation: Result<Evaluation>) {
        let result = match evaluation {
            Ok(evaluation) => self.apply(pond_id, evaluation).await,
            Err(e) => Err(e),
        };
        if let Err(e) = result {
            warn!(pond_id = %pond_id, evaluator, error = %e, "Evaluation failed");
        }
    }

    fn publish(&self, pond_id: &PondId, report: &ApplyReport) {
        for key in &report.resolved {
            let _ = self.event_tx.send(MonitorEvent::FindingResolved {
                pond_id: pond_id.clone(),
                key: *key,
            });
        }
        for key in &report.activated {
            let _ = self.event_tx.send(MonitorEvent::FindingActivated {
                pond_id: pond_id.clone(),
                key: *key,
            });
        }
    }

    async fn clear_live_findings(&self, pond_id: &PondId) {
        let cleared = match self
            .insights
            .resolve_where(pond_id, |f| f.key.is_live_reading())
            .await
        {
            Ok(cleared) => cleared,
            Err(e) => {
                warn!(pond_id = %pond_id, error = %e, "Offline clear failed");
                return;
            }
        };
        if let Err(e) = self.insights.clear_signal_states(pond_id).await {
            warn!(pond_id = %pond_id, error = %e, "Failed to reset signal states");
        }

        info!(pond_id = %pond_id, cleared = cleared.len(), "Live-reading findings cleared after offline grace");
        let _ = self.event_tx.send(MonitorEvent::OfflineCleared {
            pond_id: pond_id.clone(),
            cleared: cleared.len(),
        });
        self.publish(
            pond_id,
            &ApplyReport {
                activated: Vec::new(),
                resolved: cleared,
            },
        );
    }

    /// Atomic read-modify-write of the pond's growth setup.
    async fn update_setup<F>(&self, pond_id: &PondId, cadence_days: u32, update: F) -> Result<GrowthSetup>
    where
        F: FnOnce(&mut GrowthSetup) + Send + 'static,
    {
        let fresh = GrowthSetup::new(pond_id.clone(), cadence_days);
        let apply: UpdateFn = Box::new(move |current: Option<Value>| -> aqua_store::Result<Value> {
            let mut setup = match current {
                Some(value) => serde_json::from_value(value)?,
                None => fresh,
            };
            update(&mut setup);
            Ok(serde_json::to_value(setup)?)
        });
        let value = self
            .store
            .transact(GROWTH_SETUP_COLLECTION, pond_id.as_str(), apply)
            .await?;
        Ok(serde_json::from_value(value).map_err(aqua_store::StoreError::from)?)
    }
}

/// Weight the forecast starts from: the stocking ABW when known, otherwise
/// the first measurement.
fn seed_weight(pond: &Pond, measurements: &[GrowthMeasurement]) -> Option<f64> {
    pond.initial_abw_grams
        .or_else(|| measurements.first().map(|m| m.abw_grams))
        .filter(|w| w.is_finite() && *w > 0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use aqua_insights::ManualClock;
    use aqua_types::{FindingStatus, Severity};
    use chrono::TimeZone;

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    async fn setup() -> (Arc<PondMonitor>, Arc<ManualClock>, PondId) {
        let clock = Arc::new(ManualClock::new(start()));
        let monitor = Arc::new(PondMonitor::in_memory(MonitorConfig::default(), clock.clone()));
        let pond = Pond::new(PondId::new("p1"), "North", 1000, start()).with_initial_abw(5.0);
        let id = pond.id.clone();
        monitor.register_pond(pond).await.unwrap();
        (monitor, clock, id)
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    #[tokio::test]
    async fn test_unknown_pond() {
        let (monitor, _, _) = setup().await;
        let err = monitor.get_survival(&PondId::new("nope")).await.unwrap_err();
        assert!(matches!(err, MonitorError::PondNotFound(_)));
    }

    #[tokio::test]
    async fn test_survival_example() {
        let (monitor, _, id) = setup().await;
        monitor.record_mortality(&id, day(1), 5.0).await.unwrap();
        monitor.record_mortality(&id, day(16), 3.0).await.unwrap();

        let survival = monitor.get_survival(&id).await.unwrap();
        assert!((survival.survival_percent - 92.0).abs() < 1e-9);
        assert_eq!(survival.estimated_alive, 920);
    }

    #[tokio::test]
    async fn test_mortality_validation_surfaces() {
        let (monitor, _, id) = setup().await;
        monitor.record_mortality(&id, day(1), 1.0).await.unwrap();

        let early = monitor.record_mortality(&id, day(10), 1.0).await.unwrap_err();
        assert!(matches!(
            early,
            MonitorError::Validation(ValidationError::CadenceViolation { .. })
        ));
        let range = monitor.record_mortality(&id, day(20), 101.0).await.unwrap_err();
        assert!(matches!(
            range,
            MonitorError::Validation(ValidationError::RateOutOfRange { .. })
        ));
    }

    #[tokio::test]
    async fn test_mortality_spike_and_correction() {
        let (monitor, _, id) = setup().await;
        let entry = monitor.record_mortality(&id, day(1), 6.0).await.unwrap();
        let spike = monitor
            .insights()
            .get(&id, FindingKey::MortalitySpike)
            .await
            .unwrap()
            .unwrap();
        assert!(spike.is_active());
        assert_eq!(spike.severity, Severity::Danger);

        monitor.correct_mortality(&id, entry.id, 1.0).await.unwrap();
        let spike = monitor
            .insights()
            .get(&id, FindingKey::MortalitySpike)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(spike.status, FindingStatus::Resolved);

        let missing = monitor
            .correct_mortality(&id, EntryId::generate(), 1.0)
            .await
            .unwrap_err();
        assert!(matches!(missing, MonitorError::EntryNotFound(_)));
    }

    #[tokio::test]
    async fn test_resolved_spike_stays_resolved_across_ticks() {
        let (monitor, clock, id) = setup().await;
        monitor.record_mortality(&id, day(1), 6.0).await.unwrap();
        assert!(monitor
            .insights()
            .get(&id, FindingKey::MortalitySpike)
            .await
            .unwrap()
            .unwrap()
            .is_active());

        clock.advance(Duration::days(14));
        assert_eq!(
            monitor.resolve_finding(&id, FindingKey::MortalitySpike).await.unwrap(),
            ResolveOutcome::Resolved
        );
        monitor.coarse_tick().await;
        monitor.coarse_tick().await;
        let spike = monitor
            .insights()
            .get(&id, FindingKey::MortalitySpike)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(spike.status, FindingStatus::Resolved);

        // A fresh spike raises it again.
        clock.advance(Duration::days(1));
        monitor.record_mortality(&id, day(16), 5.5).await.unwrap();
        let spike = monitor
            .insights()
            .get(&id, FindingKey::MortalitySpike)
            .await
            .unwrap()
            .unwrap();
        assert!(spike.is_active());
        assert_eq!(spike.created_at, clock.now());
    }

    #[tokio::test]
    async fn test_growth_measurement_updates_setup_and_days() {
        let (monitor, _, id) = setup().await;
        assert_eq!(
            monitor.days_to_target(&id).await.unwrap(),
            DaysToTarget::NoTarget
        );

        monitor.set_target_weight(&id, Some(10.0)).await.unwrap();
        monitor
            .record_growth_measurement(&id, start() + Duration::days(15), 12.0, Some("sample".into()))
            .await
            .unwrap();

        let setup = monitor.growth_setup(&id).await.unwrap();
        assert_eq!(setup.current_abw, Some(12.0));
        assert_eq!(monitor.days_to_target(&id).await.unwrap(), DaysToTarget::Days(0));

        let bad = monitor
            .record_growth_measurement(&id, start(), -1.0, None)
            .await
            .unwrap_err();
        assert!(matches!(bad, MonitorError::Validation(ValidationError::NonPositiveWeight(_))));
    }

    #[tokio::test]
    async fn test_forecast_rebases_on_actuals() {
        let (monitor, _, id) = setup().await;
        let before = monitor.get_forecast(&id, 4).await.unwrap();
        assert_eq!(before.baseline.len(), 5);
        for (live, baseline) in before.live.iter().zip(&before.baseline) {
            assert!((live.abw_grams - baseline.abw_grams).abs() < 1e-9);
        }

        monitor
            .record_growth_measurement(&id, start() + Duration::days(15), 10.0, None)
            .await
            .unwrap();
        let after = monitor.get_forecast(&id, 4).await.unwrap();
        assert_eq!(after.baseline[..2], before.baseline[..2]);
        assert!(after.baseline[2].abw_grams < before.baseline[2].abw_grams);
        assert_eq!(after.live[0].period, 1);
        assert_eq!(after.live[0].abw_grams, 10.0);
    }

    #[tokio::test]
    async fn test_live_forecast_slows_under_stress() {
        let (monitor, _, id) = setup().await;
        monitor
            .ingest_reading(&id, LiveReading::new(start()).with_temp(34.0))
            .await
            .unwrap();

        let forecast = monitor.get_forecast(&id, 4).await.unwrap();
        assert!((forecast.growth_multiplier - 0.8).abs() < 1e-9);
        let last = forecast.live.len() - 1;
        assert!(forecast.live[last].abw_grams < forecast.baseline[last].abw_grams);
    }

    #[tokio::test]
    async fn test_feeding_findings_are_ephemeral() {
        let (monitor, clock, id) = setup().await;
        monitor
            .record_feeding(&id, start(), 5.0, Some(10.0))
            .await
            .unwrap();
        let finding = monitor
            .insights()
            .get(&id, FindingKey::FeedUnder)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(finding.auto_resolve_at, Some(start() + Duration::minutes(5)));

        monitor.record_feeding(&id, start(), 12.0, Some(10.0)).await.unwrap();
        let active: Vec<FindingKey> = monitor
            .insights()
            .active(&id)
            .await
            .unwrap()
            .iter()
            .map(|f| f.key)
            .collect();
        assert_eq!(active, vec![FindingKey::FeedOver]);

        clock.advance(Duration::minutes(5));
        monitor.sweep_tick().await;
        assert!(monitor.insights().active(&id).await.unwrap().is_empty());

        let bad = monitor.record_feeding(&id, start(), 0.0, None).await.unwrap_err();
        assert!(matches!(bad, MonitorError::Validation(ValidationError::NonPositiveAmount(_))));
    }

    #[tokio::test]
    async fn test_snooze_validation_and_visibility() {
        let (monitor, _, id) = setup().await;
        let user = UserId::new("u1");
        monitor
            .ingest_reading(&id, LiveReading::new(start()).with_ph(10.0))
            .await
            .unwrap();
        assert_eq!(monitor.visible_findings(&id, &user).await.unwrap().len(), 1);

        let bad = monitor
            .snooze_finding(&user, &id, FindingKey::High(Signal::Ph), 0.0)
            .await
            .unwrap_err();
        assert!(matches!(bad, MonitorError::Validation(ValidationError::InvalidSnoozeDuration(_))));

        monitor
            .snooze_finding(&user, &id, FindingKey::High(Signal::Ph), 1.5)
            .await
            .unwrap();
        assert!(monitor.visible_findings(&id, &user).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_snooze_beyond_timestamp_range_rejected() {
        let (monitor, _, id) = setup().await;
        let user = UserId::new("u1");
        for hours in [1e12, f64::MAX] {
            let err = monitor
                .snooze_finding(&user, &id, FindingKey::FeedOver, hours)
                .await
                .unwrap_err();
            assert!(matches!(err, MonitorError::Validation(ValidationError::InvalidSnoozeDuration(_))));
        }
        assert!(monitor.snoozes().snoozes(&id, &user).await.unwrap().is_empty());

        // A long but representable snooze still works.
        let year = monitor
            .snooze_finding(&user, &id, FindingKey::FeedOver, 24.0 * 365.0)
            .await
            .unwrap();
        assert_eq!(year.until, (start() + Duration::days(365)).timestamp_millis());
    }

    #[tokio::test]
    async fn test_heartbeat_offline_and_recovery() {
        let (monitor, clock, id) = setup().await;
        monitor
            .ingest_reading(&id, LiveReading::new(start()).with_temp(30.0))
            .await
            .unwrap();

        clock.advance(Duration::minutes(21));
        monitor.coarse_tick().await;
        let offline = monitor
            .insights()
            .get(&id, FindingKey::DeviceOffline)
            .await
            .unwrap()
            .unwrap();
        assert!(offline.is_active());
        assert_eq!(offline.severity, Severity::Error);

        monitor
            .ingest_reading(&id, LiveReading::new(clock.now()).with_temp(30.0))
            .await
            .unwrap();
        let offline = monitor
            .insights()
            .get(&id, FindingKey::DeviceOffline)
            .await
            .unwrap()
            .unwrap();
        assert!(!offline.is_active());
    }

    #[tokio::test]
    async fn test_new_cycle_resets_everything() {
        let (monitor, _, id) = setup().await;
        monitor.record_mortality(&id, day(1), 6.0).await.unwrap();
        monitor
            .record_growth_measurement(&id, start() + Duration::days(15), 10.0, None)
            .await
            .unwrap();
        monitor.set_target_weight(&id, Some(500.0)).await.unwrap();

        let restocked = start() + Duration::days(120);
        let pond = monitor.start_new_cycle(&id, 2000, restocked).await.unwrap();
        assert_eq!(pond.initial_stocked_count, 2000);
        assert_eq!(pond.stocked_at, restocked);

        let survival = monitor.get_survival(&id).await.unwrap();
        assert_eq!(survival.estimated_alive, 2000);
        assert!(monitor.insights().active(&id).await.unwrap().is_empty());
        let setup = monitor.growth_setup(&id).await.unwrap();
        assert_eq!(setup.target_weight_grams, None);
        assert_eq!(setup.current_abw, Some(5.0));
    }

    #[tokio::test]
    async fn test_store_outage_does_not_break_ingest() {
        let clock = Arc::new(ManualClock::new(start()));
        let store = Arc::new(InMemoryDocumentStore::new());
        let backends = MonitorBackends {
            store: store.clone(),
            ..MonitorBackends::in_memory()
        };
        let monitor = Arc::new(PondMonitor::new(MonitorConfig::default(), clock, backends));
        let pond = Pond::new(PondId::new("p1"), "North", 1000, start());
        monitor.register_pond(pond.clone()).await.unwrap();

        store.set_available(false);
        monitor
            .ingest_reading(&pond.id, LiveReading::new(start()).with_temp(35.0))
            .await
            .unwrap();
        monitor.coarse_tick().await;
        monitor.sweep_tick().await;

        store.set_available(true);
        monitor
            .ingest_reading(&pond.id, LiveReading::new(start()).with_temp(35.0))
            .await
            .unwrap();
        assert!(monitor
            .insights()
            .get(&pond.id, FindingKey::High(Signal::Temperature))
            .await
            .unwrap()
            .unwrap()
            .is_active());
    }
}
