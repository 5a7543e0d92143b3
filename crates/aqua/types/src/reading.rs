//! Live sensor readings and derived per-signal state.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::PondId;

/// One sample from the pond's sensor feed (~1 Hz).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiveReading {
    pub ts: DateTime<Utc>,
    #[serde(default)]
    pub temp_c: Option<f64>,
    #[serde(default)]
    pub ph: Option<f64>,
    #[serde(default)]
    pub dissolved_oxygen_mg_l: Option<f64>,
    /// Whether the device reported itself online with this sample
    #[serde(default = "default_online")]
    pub online: bool,
}

fn default_online() -> bool {
    true
}

impl LiveReading {
    pub fn new(ts: DateTime<Utc>) -> Self {
        Self {
            ts,
            temp_c: None,
            ph: None,
            dissolved_oxygen_mg_l: None,
            online: true,
        }
    }

    pub fn with_temp(mut self, temp_c: f64) -> Self {
        self.temp_c = Some(temp_c);
        self
    }

    pub fn with_ph(mut self, ph: f64) -> Self {
        self.ph = Some(ph);
        self
    }

    pub fn with_oxygen(mut self, mg_l: f64) -> Self {
        self.dissolved_oxygen_mg_l = Some(mg_l);
        self
    }

    /// Value for a signal, if present and finite.
    pub fn value(&self, signal: Signal) -> Option<f64> {
        let raw = match signal {
            Signal::Temperature => self.temp_c,
            Signal::Ph => self.ph,
            Signal::DissolvedOxygen => self.dissolved_oxygen_mg_l,
        };
        raw.filter(|v| v.is_finite())
    }
}

/// Water-chemistry signals carried by a live reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Signal {
    Temperature,
    Ph,
    DissolvedOxygen,
}

impl Signal {
    pub const ALL: [Signal; 3] = [Signal::Temperature, Signal::Ph, Signal::DissolvedOxygen];

    /// Prefix used in finding keys (`temp_low`, `ph_high`, `do_ok`).
    pub fn key_prefix(&self) -> &'static str {
        match self {
            Signal::Temperature => "temp",
            Signal::Ph => "ph",
            Signal::DissolvedOxygen => "do",
        }
    }

    pub fn unit(&self) -> &'static str {
        match self {
            Signal::Temperature => "°C",
            Signal::Ph => "",
            Signal::DissolvedOxygen => "mg/L",
        }
    }
}

impl std::fmt::Display for Signal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Signal::Temperature => write!(f, "temperature"),
            Signal::Ph => write!(f, "pH"),
            Signal::DissolvedOxygen => write!(f, "dissolved oxygen"),
        }
    }
}

/// Position of a value relative to its optimal band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalLevel {
    Low,
    Ok,
    High,
}

/// Last observed level of a signal for one pond.
///
/// Stored next to the pond's findings so the "recovered" notice can be
/// emitted exactly once per transition back into band.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalState {
    pub signal: Signal,
    pub level: SignalLevel,
    pub updated_at: DateTime<Utc>,
}

/// Daily count/sum/min/max bucket for one parameter of one pond.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyAggregate {
    pub pond_id: PondId,
    pub date: NaiveDate,
    pub signal: Signal,
    pub count: u64,
    pub sum: f64,
    pub min: f64,
    pub max: f64,
    pub average: f64,
}

impl DailyAggregate {
    pub fn empty(pond_id: PondId, date: NaiveDate, signal: Signal) -> Self {
        Self {
            pond_id,
            date,
            signal,
            count: 0,
            sum: 0.0,
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
            average: 0.0,
        }
    }

    /// Fold one sample into the bucket.
    pub fn record(&mut self, value: f64) {
        self.count += 1;
        self.sum += value;
        self.min = self.min.min(value);
        self.max = self.max.max(value);
        self.average = self.sum / self.count as f64;
    }
}
