//! Live forecast modulation from current water conditions.
//!
//! Each parameter maps to a factor in (0, 1] by band checks; missing
//! readings are neutral. The combined multiplier is the product of the
//! per-parameter factors and is applied to every forecast step, so stress
//! compounds over the horizon instead of being applied once.

use aqua_types::{Band, LiveReading, Signal};
use serde::{Deserialize, Serialize};

use crate::model::{ActualPoint, ForecastPoint};

/// Factor used when a reading is missing or inside its band.
pub const NEUTRAL_FACTOR: f64 = 1.0;

/// Band check for one parameter, with an optional harsher outer tier.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FactorBand {
    pub band: Band,
    /// Factor when outside the band (or within `severe_margin` of it)
    pub factor: f64,
    /// Distance outside the band beyond which `severe_factor` applies
    #[serde(default)]
    pub severe_margin: Option<f64>,
    #[serde(default)]
    pub severe_factor: Option<f64>,
}

impl FactorBand {
    pub const fn flat(band: Band, factor: f64) -> Self {
        Self {
            band,
            factor,
            severe_margin: None,
            severe_factor: None,
        }
    }

    pub const fn tiered(band: Band, mild_factor: f64, severe_margin: f64, severe_factor: f64) -> Self {
        Self {
            band,
            factor: mild_factor,
            severe_margin: Some(severe_margin),
            severe_factor: Some(severe_factor),
        }
    }

    pub fn factor_for(&self, value: Option<f64>) -> f64 {
        let Some(value) = value.filter(|v| v.is_finite()) else {
            return NEUTRAL_FACTOR;
        };
        let distance = self.band.distance_outside(value);
        if distance <= 0.0 {
            return NEUTRAL_FACTOR;
        }
        match (self.severe_margin, self.severe_factor) {
            (Some(margin), Some(severe)) if distance > margin => severe,
            _ => self.factor,
        }
    }
}

/// Per-parameter bands used to modulate growth and survival forecasts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModulatorBands {
    pub temperature: FactorBand,
    pub ph: FactorBand,
    pub dissolved_oxygen: FactorBand,
}

impl Default for ModulatorBands {
    fn default() -> Self {
        Self {
            temperature: FactorBand::flat(Band::new(28.0, 31.0), 0.8),
            ph: FactorBand::tiered(Band::new(6.5, 9.0), 0.9, 0.5, 0.7),
            dissolved_oxygen: FactorBand::flat(Band::new(3.0, 5.0), 0.7),
        }
    }
}

impl ModulatorBands {
    pub fn band_for(&self, signal: Signal) -> &FactorBand {
        match signal {
            Signal::Temperature => &self.temperature,
            Signal::Ph => &self.ph,
            Signal::DissolvedOxygen => &self.dissolved_oxygen,
        }
    }

    /// Product of per-parameter factors. `None` (no live data) is neutral.
    pub fn growth_multiplier(&self, reading: Option<&LiveReading>) -> f64 {
        let Some(reading) = reading else {
            return NEUTRAL_FACTOR;
        };
        Signal::ALL
            .iter()
            .map(|signal| self.band_for(*signal).factor_for(reading.value(*signal)))
            .product()
    }

    /// Survival risk for one forecast period; same band logic as growth.
    pub fn survival_risk_multiplier(&self, reading: Option<&LiveReading>) -> f64 {
        self.growth_multiplier(reading)
    }
}

/// Apply `multiplier` to each step of the rebased future track.
///
/// The live series starts at the latest anchor (the latest actual, else the
/// seed at period 0) and follows the baseline's per-period deltas scaled by
/// the multiplier.
pub fn live_forecast(
    baseline: &[ForecastPoint],
    actuals: &[ActualPoint],
    multiplier: f64,
) -> Vec<ForecastPoint> {
    let Some(first) = baseline.first() else {
        return Vec::new();
    };
    let anchor = actuals
        .iter()
        .max_by_key(|a| a.period)
        .filter(|a| (a.period as usize) < baseline.len())
        .map(|a| ForecastPoint {
            period: a.period,
            abw_grams: a.abw_grams,
        })
        .unwrap_or(*first);

    let mut live = vec![anchor];
    let mut previous_baseline = anchor.abw_grams;
    for point in baseline.iter().skip(anchor.period as usize + 1) {
        let delta = point.abw_grams - previous_baseline;
        let last = live[live.len() - 1].abw_grams;
        live.push(ForecastPoint {
            period: point.period,
            abw_grams: last + delta * multiplier,
        });
        previous_baseline = point.abw_grams;
    }
    live
}

/// Geometric daily decay of survival.
///
/// A period risk factor `risk` is spread over `days` so that
/// `soft_risk = 1 - (1 - risk) / days` is applied once per day. The result
/// holds `days + 1` points starting at `current_percent`.
pub fn survival_forecast(current_percent: f64, days: u32, risk: f64) -> Vec<f64> {
    let mut projected = current_percent.clamp(0.0, 100.0);
    let mut curve = Vec::with_capacity(days as usize + 1);
    curve.push(projected);
    if days == 0 {
        return curve;
    }
    let soft_risk = 1.0 - (1.0 - risk.clamp(0.0, 1.0)) / f64::from(days);
    for _ in 0..days {
        projected *= soft_risk;
        curve.push(projected);
    }
    curve
}
