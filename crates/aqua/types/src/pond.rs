//! Pond aggregate root.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::PondId;

/// Default number of days between allowed growth/mortality measurements.
pub const DEFAULT_CADENCE_DAYS: u32 = 15;

fn default_cadence_days() -> u32 {
    DEFAULT_CADENCE_DAYS
}

/// A stocked pond. Every log, finding and snooze is keyed by its id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pond {
    /// Canonical shared id
    pub id: PondId,

    /// Display name
    pub name: String,

    /// Fish stocked at the start of the current cycle
    pub initial_stocked_count: u64,

    /// Start of the current stocking cycle
    pub stocked_at: DateTime<Utc>,

    /// Days between allowed measurements
    #[serde(default = "default_cadence_days")]
    pub cadence_days: u32,

    /// ABW at stocking, used to seed the growth forecast
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_abw_grams: Option<f64>,
}

impl Pond {
    pub fn new(
        id: PondId,
        name: impl Into<String>,
        initial_stocked_count: u64,
        stocked_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            initial_stocked_count,
            stocked_at,
            cadence_days: DEFAULT_CADENCE_DAYS,
            initial_abw_grams: None,
        }
    }

    pub fn with_initial_abw(mut self, grams: f64) -> Self {
        self.initial_abw_grams = Some(grams);
        self
    }

    pub fn with_cadence_days(mut self, cadence_days: u32) -> Self {
        self.cadence_days = cadence_days.max(1);
        self
    }

    /// Period index a timestamp falls into, counted in whole cadences from
    /// stocking. Timestamps before stocking map to period 0.
    pub fn period_index(&self, at: DateTime<Utc>) -> u32 {
        let elapsed = at - self.stocked_at;
        if elapsed <= Duration::zero() {
            return 0;
        }
        let days = elapsed.num_seconds() as f64 / 86_400.0;
        (days / f64::from(self.cadence_days.max(1))).round() as u32
    }

    /// Start timestamp of a period index.
    pub fn period_start(&self, index: u32) -> DateTime<Utc> {
        self.stocked_at + Duration::days(i64::from(index) * i64::from(self.cadence_days))
    }
}
