//! # Aqua Insights - Detection and Lifecycle of Pond Findings
//!
//! Turns pond data into a live set of findings:
//!
//! - **Evaluators** ([`evaluator`]): pure detectors for water chemistry,
//!   mortality spikes, growth shortfall, feeding deviation and device
//!   heartbeat. Each returns an [`Evaluation`] of keys to activate and
//!   resolve.
//! - **Lifecycle** ([`InsightStore`]): idempotent upsert-if-not-active,
//!   resolve, auto-resolve sweeps and per-signal transition memory, all
//!   persisted through a [`DocumentStore`](aqua_store::DocumentStore).
//! - **Snooze overlay** ([`SnoozeOverlay`]): per-user timed suppression
//!   applied at read time.
//!
//! ## Example
//!
//! ```rust,ignore
//! let evaluation = WaterEvaluator::new(config).evaluate(
//!     Signal::Temperature,
//!     reading.temp_c,
//!     insights.signal_level(&pond_id, Signal::Temperature).await?,
//!     clock.now(),
//! );
//! insights.apply(&pond_id, evaluation).await?;
//! let visible = overlay.visible(&insights, &pond_id, &user_id).await?;
//! ```

#![deny(unsafe_code)]

pub mod clock;
pub mod config;
pub mod error;
pub mod evaluator;
pub mod lifecycle;
pub mod snooze;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{
    FeedRateTier, FeedingConfig, GrowthThresholds, InsightConfig, MortalityThresholds, WaterBand,
    WaterBands,
};
pub use error::{InsightError, Result};
pub use evaluator::{
    Evaluation, FeedingEvaluator, GrowthEvaluator, HeartbeatEvaluator, MortalityEvaluator,
    WaterEvaluator,
};
pub use lifecycle::{
    findings_collection, signal_state_collection, ApplyReport, InsightStore, ResolveOutcome,
    UpsertOutcome,
};
pub use snooze::{filter_visible, snooze_collection, SnoozeOverlay};
