//! Insight engine configuration.
//!
//! Bands, thresholds and time-to-live values used by the evaluators.

use serde::{Deserialize, Serialize};

use aqua_types::{Band, Signal};

/// Configuration for every rule evaluator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InsightConfig {
    /// Optimal water bands.
    pub water: WaterBands,

    /// Mortality spike thresholds.
    pub mortality: MortalityThresholds,

    /// Growth shortfall thresholds.
    pub growth: GrowthThresholds,

    /// Feeding deviation settings.
    pub feeding: FeedingConfig,

    /// Minutes without a heartbeat before a device counts as offline.
    pub heartbeat_grace_minutes: u32,

    /// Lifetime of a "recovered" notice.
    pub recovered_ttl_secs: u64,

    /// Lifetime of findings that describe a single logged event.
    pub ephemeral_ttl_secs: u64,
}

impl Default for InsightConfig {
    fn default() -> Self {
        Self {
            water: WaterBands::default(),
            mortality: MortalityThresholds::default(),
            growth: GrowthThresholds::default(),
            feeding: FeedingConfig::default(),
            heartbeat_grace_minutes: 20,
            recovered_ttl_secs: 300,
            ephemeral_ttl_secs: 300,
        }
    }
}

impl InsightConfig {
    pub fn recovered_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.recovered_ttl_secs as i64)
    }

    pub fn ephemeral_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.ephemeral_ttl_secs as i64)
    }

    pub fn heartbeat_grace(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.heartbeat_grace_minutes as i64)
    }
}

/// Band plus how far outside it a value must sit to be dangerous.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WaterBand {
    pub band: Band,
    pub danger_margin: f64,
}

impl WaterBand {
    pub const fn new(min: f64, max: f64, danger_margin: f64) -> Self {
        Self {
            band: Band::new(min, max),
            danger_margin,
        }
    }
}

/// Finding bands per signal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WaterBands {
    pub temperature: WaterBand,
    pub ph: WaterBand,
    pub dissolved_oxygen: WaterBand,
}

impl Default for WaterBands {
    fn default() -> Self {
        Self {
            temperature: WaterBand::new(29.0, 31.0, 2.0),
            ph: WaterBand::new(6.5, 9.0, 1.0),
            dissolved_oxygen: WaterBand::new(3.0, 8.0, 1.0),
        }
    }
}

impl WaterBands {
    pub fn for_signal(&self, signal: Signal) -> &WaterBand {
        match signal {
            Signal::Temperature => &self.temperature,
            Signal::Ph => &self.ph,
            Signal::DissolvedOxygen => &self.dissolved_oxygen,
        }
    }
}

/// Per-period mortality thresholds, in percent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MortalityThresholds {
    pub warning_percent: f64,
    pub danger_percent: f64,
    /// Window for the context baseline average.
    pub baseline_window_days: u32,
    /// Days an entry can raise a spike, counting its own period date.
    /// Older entries never re-raise a resolved finding.
    pub spike_freshness_days: u32,
}

impl Default for MortalityThresholds {
    fn default() -> Self {
        Self {
            warning_percent: 2.0,
            danger_percent: 5.0,
            baseline_window_days: 15,
            spike_freshness_days: 1,
        }
    }
}

/// Gap between predicted and actual ABW, in percent of the prediction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GrowthThresholds {
    pub warning_gap_percent: f64,
    pub danger_gap_percent: f64,
}

impl Default for GrowthThresholds {
    fn default() -> Self {
        Self {
            warning_gap_percent: 10.0,
            danger_gap_percent: 20.0,
        }
    }
}

/// One row of the feed-rate table: fish lighter than `below_grams` eat
/// `percent_body_weight` of their weight per day.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeedRateTier {
    pub below_grams: Option<f64>,
    pub percent_body_weight: f64,
}

/// Feeding deviation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedingConfig {
    pub under_ratio: f64,
    pub over_ratio: f64,
    pub feedings_per_day: u32,
    /// Ordered ascending; the last tier should be unbounded.
    pub rate_table: Vec<FeedRateTier>,
}

impl Default for FeedingConfig {
    fn default() -> Self {
        let tier = |below: Option<f64>, percent: f64| FeedRateTier {
            below_grams: below,
            percent_body_weight: percent,
        };
        Self {
            under_ratio: 0.9,
            over_ratio: 1.1,
            feedings_per_day: 4,
            rate_table: vec![
                tier(Some(5.0), 8.0),
                tier(Some(20.0), 5.0),
                tier(Some(100.0), 3.5),
                tier(Some(300.0), 2.5),
                tier(None, 1.8),
            ],
        }
    }
}

impl FeedingConfig {
    /// Daily feed as percent of body weight for fish of `abw_grams`.
    pub fn rate_percent(&self, abw_grams: f64) -> f64 {
        self.rate_table
            .iter()
            .find(|tier| tier.below_grams.map(|b| abw_grams < b).unwrap_or(true))
            .or(self.rate_table.last())
            .map(|tier| tier.percent_body_weight)
            .unwrap_or(0.0)
    }

    /// Suggested kilograms for one feeding.
    pub fn suggested_kg(&self, estimated_alive: u64, abw_grams: f64) -> f64 {
        let per_day = self.feedings_per_day.max(1) as f64;
        estimated_alive as f64 * abw_grams * self.rate_percent(abw_grams) / 100.0 / 1000.0 / per_day
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feed_rate_tiers() {
        let feeding = FeedingConfig::default();
        assert_eq!(feeding.rate_percent(2.0), 8.0);
        assert_eq!(feeding.rate_percent(5.0), 5.0);
        assert_eq!(feeding.rate_percent(50.0), 3.5);
        assert_eq!(feeding.rate_percent(299.9), 2.5);
        assert_eq!(feeding.rate_percent(800.0), 1.8);
    }

    #[test]
    fn test_suggested_kg() {
        // 10 000 fish at 50 g, 3.5 % per day over 4 feedings.
        let kg = FeedingConfig::default().suggested_kg(10_000, 50.0);
        assert!((kg - 4.375).abs() < 1e-9);
    }

    #[test]
    fn test_partial_config_falls_back_to_defaults() {
        let config: InsightConfig =
            serde_json::from_str(r#"{"heartbeat_grace_minutes": 5}"#).unwrap();
        assert_eq!(config.heartbeat_grace_minutes, 5);
        assert_eq!(config.mortality, MortalityThresholds::default());
        assert_eq!(config.water.for_signal(Signal::Ph).band, Band::new(6.5, 9.0));
    }
}
