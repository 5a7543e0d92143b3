//! Append-only log entries recorded against a pond.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::{EntryId, PondId};

/// Periodic mortality percentage for one cadence period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MortalityEntry {
    pub id: EntryId,
    pub pond_id: PondId,
    /// Date the period being reported ends on
    pub period_date: NaiveDate,
    /// Share of the stocked population lost in the period (0-100)
    pub mortality_rate_percent: f64,
    pub created_at: DateTime<Utc>,
}

impl MortalityEntry {
    pub fn new(
        pond_id: PondId,
        period_date: NaiveDate,
        mortality_rate_percent: f64,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: EntryId::generate(),
            pond_id,
            period_date,
            mortality_rate_percent,
            created_at,
        }
    }

    /// Rate clamped to [0, 100]; NaN counts as zero.
    pub fn clamped_rate(&self) -> f64 {
        if self.mortality_rate_percent.is_nan() {
            return 0.0;
        }
        self.mortality_rate_percent.clamp(0.0, 100.0)
    }
}

/// A sampled average body weight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GrowthMeasurement {
    pub id: EntryId,
    pub pond_id: PondId,
    pub recorded_at: DateTime<Utc>,
    pub abw_grams: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl GrowthMeasurement {
    pub fn new(pond_id: PondId, recorded_at: DateTime<Utc>, abw_grams: f64) -> Self {
        Self {
            id: EntryId::generate(),
            pond_id,
            recorded_at,
            abw_grams,
            note: None,
        }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }
}

/// Per-pond growth settings, refreshed whenever a measurement is recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GrowthSetup {
    pub pond_id: PondId,
    /// Latest known ABW in grams
    pub current_abw: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_weight_grams: Option<f64>,
    pub last_measurement_at: Option<DateTime<Utc>>,
    pub cadence_days: u32,
}

impl GrowthSetup {
    pub fn new(pond_id: PondId, cadence_days: u32) -> Self {
        Self {
            pond_id,
            current_abw: None,
            target_weight_grams: None,
            last_measurement_at: None,
            cadence_days,
        }
    }

    /// Fold a new measurement in. Older measurements never replace a newer anchor.
    pub fn apply_measurement(&mut self, measurement: &GrowthMeasurement) {
        let is_newer = self
            .last_measurement_at
            .map(|last| measurement.recorded_at >= last)
            .unwrap_or(true);
        if is_newer {
            self.current_abw = Some(measurement.abw_grams);
            self.last_measurement_at = Some(measurement.recorded_at);
        }
    }
}

/// One logged feeding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedingEvent {
    pub id: EntryId,
    pub pond_id: PondId,
    pub fed_at: DateTime<Utc>,
    pub amount_kg: f64,
    /// Amount the operator was advised to give, when the feed plan supplied one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggested_kg: Option<f64>,
}

impl FeedingEvent {
    pub fn new(pond_id: PondId, fed_at: DateTime<Utc>, amount_kg: f64) -> Self {
        Self {
            id: EntryId::generate(),
            pond_id,
            fed_at,
            amount_kg,
            suggested_kg: None,
        }
    }

    pub fn with_suggested(mut self, suggested_kg: f64) -> Self {
        self.suggested_kg = Some(suggested_kg);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[test]
    fn test_clamped_rate() {
        let date = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
        let mut entry = MortalityEntry::new(PondId::new("p"), date, 140.0, Utc::now());
        assert_eq!(entry.clamped_rate(), 100.0);
        entry.mortality_rate_percent = -3.0;
        assert_eq!(entry.clamped_rate(), 0.0);
        entry.mortality_rate_percent = f64::NAN;
        assert_eq!(entry.clamped_rate(), 0.0);
    }

    #[test]
    fn test_setup_keeps_newest_anchor() {
        let t0 = Utc.with_ymd_and_hms(2026, 3, 1, 8, 0, 0).unwrap();
        let pond = PondId::new("p");
        let mut setup = GrowthSetup::new(pond.clone(), 15);

        setup.apply_measurement(&GrowthMeasurement::new(pond.clone(), t0, 12.0));
        setup.apply_measurement(&GrowthMeasurement::new(
            pond.clone(),
            t0 - Duration::days(15),
            6.0,
        ));

        assert_eq!(setup.current_abw, Some(12.0));
        assert_eq!(setup.last_measurement_at, Some(t0));
    }
}
