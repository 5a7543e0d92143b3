//! Piecewise growth model and forward simulation.

use std::collections::BTreeMap;

use aqua_types::{GrowthMeasurement, Pond};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{GrowthError, Result};

/// Upper bound on simulated cadence steps, so a flat or shrinking stage
/// table still terminates.
pub const MAX_SIMULATION_PERIODS: u32 = 200;

/// One band of the weight-to-rate table.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GrowthStage {
    pub from_grams: f64,
    /// `None` marks the unbounded tail stage
    pub to_grams: Option<f64>,
    pub weekly_rate_grams: f64,
}

impl GrowthStage {
    pub const fn new(from_grams: f64, to_grams: Option<f64>, weekly_rate_grams: f64) -> Self {
        Self {
            from_grams,
            to_grams,
            weekly_rate_grams,
        }
    }

    fn matches(&self, weight: f64) -> bool {
        match self.to_grams {
            Some(to) => self.from_grams <= weight && weight < to,
            None => weight >= self.from_grams,
        }
    }
}

/// An observed ABW pinned to its period index.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ActualPoint {
    pub period: u32,
    pub abw_grams: f64,
}

/// One point of a forecast series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    pub period: u32,
    pub abw_grams: f64,
}

/// Answer to "how many days until the target weight".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "days", rename_all = "kebab-case")]
pub enum DaysToTarget {
    Days(u32),
    NoTarget,
    NoCurrentWeight,
    /// The stage table never reaches the target within the simulation cap
    Unreachable,
}

impl DaysToTarget {
    pub fn days(&self) -> Option<u32> {
        match self {
            DaysToTarget::Days(days) => Some(*days),
            _ => None,
        }
    }
}

/// Weight-to-growth-rate table plus the cadence it is simulated at.
#[derive(Debug, Clone, PartialEq)]
pub struct GrowthModel {
    stages: Vec<GrowthStage>,
    cadence_days: u32,
}

impl GrowthModel {
    /// Build a model, checking the table is ordered and ends unbounded.
    pub fn new(stages: Vec<GrowthStage>, cadence_days: u32) -> Result<Self> {
        if cadence_days == 0 {
            return Err(GrowthError::InvalidCadence(cadence_days));
        }
        let Some(last) = stages.last() else {
            return Err(GrowthError::InvalidStageTable("no stages".into()));
        };
        if last.to_grams.is_some() {
            return Err(GrowthError::InvalidStageTable(
                "last stage must be unbounded".into(),
            ));
        }
        for pair in stages.windows(2) {
            match pair[0].to_grams {
                Some(to) if to <= pair[1].from_grams + f64::EPSILON && to > pair[0].from_grams => {}
                Some(_) => {
                    return Err(GrowthError::InvalidStageTable(format!(
                        "stage starting at {} g is out of order",
                        pair[1].from_grams
                    )))
                }
                None => {
                    return Err(GrowthError::InvalidStageTable(
                        "only the last stage may be unbounded".into(),
                    ))
                }
            }
        }
        Ok(Self {
            stages,
            cadence_days,
        })
    }

    /// The canonical table (grams per week).
    pub fn canonical(cadence_days: u32) -> Self {
        Self {
            stages: canonical_stages(),
            cadence_days: cadence_days.max(1),
        }
    }

    pub fn stages(&self) -> &[GrowthStage] {
        &self.stages
    }

    pub fn cadence_days(&self) -> u32 {
        self.cadence_days
    }

    /// Same table, simulated at a different cadence.
    pub fn with_cadence(&self, cadence_days: u32) -> Self {
        Self {
            stages: self.stages.clone(),
            cadence_days: cadence_days.max(1),
        }
    }

    /// Weekly rate for a weight. First matching stage wins; weights below
    /// the table use the first stage.
    pub fn stage_rate(&self, weight: f64) -> f64 {
        self.stages
            .iter()
            .find(|stage| stage.matches(weight))
            .or_else(|| self.stages.first())
            .map(|stage| stage.weekly_rate_grams)
            .unwrap_or(0.0)
    }

    /// Gain over one cadence period starting at `weight`.
    pub fn rate_per_cadence(&self, weight: f64) -> f64 {
        self.stage_rate(weight) * f64::from(self.cadence_days) / 7.0
    }

    /// Advance one cadence period from `anchor`, holding flat at `target`
    /// once it is reached.
    pub fn step(&self, anchor: f64, target: Option<f64>) -> f64 {
        let next = anchor + self.rate_per_cadence(anchor);
        match target {
            Some(target) if anchor >= target => anchor,
            Some(target) => next.min(target),
            None => next,
        }
    }

    /// Baseline forecast with rebasing on actual measurements.
    ///
    /// `series[0]` is the seed. Each later point steps from the actual of the
    /// previous period when one exists, otherwise from the previous forecast
    /// point. Points at or before an actual keep what was predicted for them.
    /// The series covers every period up to the latest actual plus
    /// `extra_periods`, capped at [`MAX_SIMULATION_PERIODS`].
    pub fn forward_forecast(
        &self,
        actuals: &[ActualPoint],
        seed_weight: f64,
        target: Option<f64>,
        extra_periods: u32,
    ) -> Vec<ForecastPoint> {
        let by_period: BTreeMap<u32, f64> =
            actuals.iter().map(|a| (a.period, a.abw_grams)).collect();
        let observed = by_period.keys().next_back().map(|p| p + 1).unwrap_or(1);
        let len = observed
            .saturating_add(extra_periods)
            .clamp(1, MAX_SIMULATION_PERIODS);

        let mut series = Vec::with_capacity(len as usize);
        series.push(ForecastPoint {
            period: 0,
            abw_grams: seed_weight,
        });

        for period in 1..len {
            let previous = series[(period - 1) as usize].abw_grams;
            let anchor = by_period.get(&(period - 1)).copied().unwrap_or(previous);
            series.push(ForecastPoint {
                period,
                abw_grams: self.step(anchor, target),
            });
        }

        series
    }

    /// Days until `target` is reached from `current`, interpolated inside
    /// the period that crosses the target.
    pub fn days_to_target(&self, current: Option<f64>, target: Option<f64>) -> DaysToTarget {
        let Some(target) = target else {
            return DaysToTarget::NoTarget;
        };
        let Some(current) = current else {
            return DaysToTarget::NoCurrentWeight;
        };
        if target <= current {
            return DaysToTarget::Days(0);
        }

        let cadence = f64::from(self.cadence_days);
        let mut weight = current;
        let mut days: u32 = 0;

        for _ in 0..MAX_SIMULATION_PERIODS {
            let gain = self.rate_per_cadence(weight);
            if !(gain > 0.0) {
                debug!(weight, target, "Growth stage has no positive gain");
                return DaysToTarget::Unreachable;
            }
            if weight + gain >= target {
                let per_day = gain / cadence;
                let inside = ((target - weight) / per_day).ceil() as u32;
                return DaysToTarget::Days(days + inside.min(self.cadence_days));
            }
            weight += gain;
            days += self.cadence_days;
        }

        debug!(current, target, "Target not reached within simulation cap");
        DaysToTarget::Unreachable
    }
}

/// Canonical weekly stage table.
pub fn canonical_stages() -> Vec<GrowthStage> {
    vec![
        GrowthStage::new(1.0, Some(20.0), 4.5),
        GrowthStage::new(20.0, Some(100.0), 14.0),
        GrowthStage::new(100.0, Some(300.0), 24.0),
        GrowthStage::new(300.0, Some(600.0), 30.0),
        GrowthStage::new(600.0, None, 35.0),
    ]
}

/// Pin measurements to period indices; the latest measurement in a period wins.
pub fn actuals_from_measurements(pond: &Pond, measurements: &[GrowthMeasurement]) -> Vec<ActualPoint> {
    let mut sorted: Vec<&GrowthMeasurement> = measurements.iter().collect();
    sorted.sort_by_key(|m| m.recorded_at);

    let mut by_period: BTreeMap<u32, f64> = BTreeMap::new();
    for m in sorted {
        by_period.insert(pond.period_index(m.recorded_at), m.abw_grams);
    }

    by_period
        .into_iter()
        .map(|(period, abw_grams)| ActualPoint { period, abw_grams })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use aqua_types::PondId;
    use chrono::{Duration, TimeZone, Utc};

    fn model() -> GrowthModel {
        GrowthModel::canonical(15)
    }

    #[test]
    fn test_stage_rate_first_match_wins() {
        let m = model();
        assert_eq!(m.stage_rate(5.0), 4.5);
        assert_eq!(m.stage_rate(19.99), 4.5);
        assert_eq!(m.stage_rate(20.0), 14.0);
        assert_eq!(m.stage_rate(10_000.0), 35.0);
        assert_eq!(m.stage_rate(0.2), 4.5);
    }

    #[test]
    fn test_forecast_example_from_seed() {
        let series = model().forward_forecast(&[], 5.0, None, 3);
        assert_eq!(series[0].abw_grams, 5.0);
        let expected = 5.0 + 4.5 * 15.0 / 7.0;
        assert!((series[1].abw_grams - expected).abs() < 1e-9);
        assert!((series[1].abw_grams - 14.64).abs() < 0.01);
        // 14.64 is still below 20 g, so the next step uses the first stage rate
        assert!((series[2].abw_grams - (expected + 4.5 * 15.0 / 7.0)).abs() < 1e-9);
        // 23.9 g crosses into the second stage
        assert!((series[3].abw_grams - (series[2].abw_grams + 14.0 * 15.0 / 7.0)).abs() < 1e-9);
    }

    #[test]
    fn test_forecast_length_covers_actuals_plus_extra() {
        let actuals = [ActualPoint {
            period: 4,
            abw_grams: 30.0,
        }];
        let series = model().forward_forecast(&actuals, 5.0, None, 3);
        assert_eq!(series.len(), 8);
        assert_eq!(series.last().unwrap().period, 7);
    }

    #[test]
    fn test_rebase_keeps_past_and_resimulates_future() {
        let m = model();
        let before = m.forward_forecast(&[], 5.0, None, 8);
        let actuals = [ActualPoint {
            period: 3,
            abw_grams: 18.0,
        }];
        let after = m.forward_forecast(&actuals, 5.0, None, 5);

        for i in 0..=3 {
            assert_eq!(after[i].abw_grams, before[i].abw_grams);
        }
        assert!((after[4].abw_grams - m.step(18.0, None)).abs() < 1e-9);
        assert!((after[5].abw_grams - m.step(after[4].abw_grams, None)).abs() < 1e-9);
    }

    #[test]
    fn test_target_clamps_series() {
        let series = model().forward_forecast(&[], 5.0, Some(20.0), 6);
        assert!(series.iter().all(|p| p.abw_grams <= 20.0));
        assert_eq!(series.last().unwrap().abw_grams, 20.0);
    }

    #[test]
    fn test_forecast_is_capped() {
        let series = model().forward_forecast(&[], 5.0, None, 10_000);
        assert_eq!(series.len(), MAX_SIMULATION_PERIODS as usize);
    }

    #[test]
    fn test_days_to_target_interpolates() {
        // 5 g grows 4.5/7 g per day in the first stage; 9 g takes
        // ceil(4 / (4.5/7)) = 7 days
        assert_eq!(model().days_to_target(Some(5.0), Some(9.0)), DaysToTarget::Days(7));
    }

    #[test]
    fn test_days_to_target_spans_periods() {
        let m = model();
        let after_one = 5.0 + m.rate_per_cadence(5.0);
        let per_day = m.rate_per_cadence(after_one) / 15.0;
        let inside = ((16.0 - after_one) / per_day).ceil() as u32;
        assert_eq!(m.days_to_target(Some(5.0), Some(16.0)), DaysToTarget::Days(15 + inside));
    }

    #[test]
    fn test_days_to_target_signals() {
        let m = model();
        assert_eq!(m.days_to_target(Some(30.0), Some(30.0)), DaysToTarget::Days(0));
        assert_eq!(m.days_to_target(Some(30.0), Some(10.0)), DaysToTarget::Days(0));
        assert_eq!(m.days_to_target(Some(30.0), None), DaysToTarget::NoTarget);
        assert_eq!(m.days_to_target(None, Some(30.0)), DaysToTarget::NoCurrentWeight);
    }

    #[test]
    fn test_pathological_table_terminates() {
        let m = GrowthModel::new(vec![GrowthStage::new(0.0, None, 0.0)], 15).unwrap();
        assert_eq!(m.days_to_target(Some(1.0), Some(2.0)), DaysToTarget::Unreachable);

        let tiny = GrowthModel::new(vec![GrowthStage::new(0.0, None, 1e-6)], 15).unwrap();
        assert_eq!(tiny.days_to_target(Some(1.0), Some(1000.0)), DaysToTarget::Unreachable);
    }

    #[test]
    fn test_invalid_tables_rejected() {
        assert!(GrowthModel::new(vec![], 15).is_err());
        assert!(GrowthModel::new(vec![GrowthStage::new(0.0, Some(10.0), 1.0)], 15).is_err());
        assert!(GrowthModel::new(
            vec![
                GrowthStage::new(10.0, Some(5.0), 1.0),
                GrowthStage::new(5.0, None, 1.0)
            ],
            15
        )
        .is_err());
        assert!(GrowthModel::new(canonical_stages(), 0).is_err());
        assert!(GrowthModel::new(canonical_stages(), 7).is_ok());
    }

    #[test]
    fn test_actuals_latest_in_period_wins() {
        let stocked = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let pond = Pond::new(PondId::new("p"), "p", 1000, stocked);
        let measurements = vec![
            GrowthMeasurement::new(pond.id.clone(), stocked + Duration::days(16), 11.0),
            GrowthMeasurement::new(pond.id.clone(), stocked + Duration::days(14), 10.0),
            GrowthMeasurement::new(pond.id.clone(), stocked + Duration::days(30), 22.0),
        ];
        let actuals = actuals_from_measurements(&pond, &measurements);
        assert_eq!(
            actuals,
            vec![
                ActualPoint {
                    period: 1,
                    abw_grams: 11.0
                },
                ActualPoint {
                    period: 2,
                    abw_grams: 22.0
                },
            ]
        );
    }
}
