//! Mortality aggregation and admission control.
//!
//! The model is mortality-only: survival starts at 100% and every entry can
//! only take it down. Stored rates are clamped when summed so a bad row can
//! never push survival below zero, but new rows are rejected, not clamped.

use aqua_types::{EntryId, MortalityEntry, ValidationError};
use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

const CUMULATIVE_EPSILON: f64 = 1e-9;

/// Derived survival of a pond. Never stored.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SurvivalState {
    pub survival_percent: f64,
    pub estimated_alive: u64,
}

/// Sum of clamped rates across all entries.
pub fn cumulative_mortality(entries: &[MortalityEntry]) -> f64 {
    entries.iter().map(MortalityEntry::clamped_rate).sum()
}

/// Reduce mortality entries to the current survival state.
pub fn compute_survival(entries: &[MortalityEntry], initial_stocked: u64) -> SurvivalState {
    let survival_percent = (100.0 - cumulative_mortality(entries)).max(0.0);
    let estimated_alive = (survival_percent / 100.0 * initial_stocked as f64)
        .round()
        .max(0.0) as u64;

    SurvivalState {
        survival_percent,
        estimated_alive,
    }
}

/// Reject rates outside [0, 100] (and NaN).
pub fn validate_rate(rate: f64) -> Result<(), ValidationError> {
    if !(0.0..=100.0).contains(&rate) {
        return Err(ValidationError::RateOutOfRange { rate });
    }
    Ok(())
}

/// Admission check for a new entry.
///
/// The entry is allowed only when at least `cadence_days` have passed since
/// the latest existing entry's period date and the new rate keeps cumulative
/// mortality at or below 100%.
pub fn can_record_now(
    entries: &[MortalityEntry],
    period_date: NaiveDate,
    rate: f64,
    cadence_days: u32,
) -> Result<(), ValidationError> {
    validate_rate(rate)?;

    if let Some(latest) = entries.iter().map(|e| e.period_date).max() {
        let days_since_last = (period_date - latest).num_days();
        if days_since_last < i64::from(cadence_days) {
            return Err(ValidationError::CadenceViolation {
                days_since_last,
                cadence_days,
                next_allowed: latest + Duration::days(i64::from(cadence_days)),
            });
        }
    }

    check_cumulative(cumulative_mortality(entries), rate)
}

/// Check a correction of an existing entry.
///
/// The corrected entry's old rate is taken out of the cumulative sum before
/// the new one is added. Returns `None` when the entry does not exist.
pub fn validate_correction(
    entries: &[MortalityEntry],
    entry_id: &EntryId,
    new_rate: f64,
) -> Option<Result<(), ValidationError>> {
    let existing = entries.iter().find(|e| &e.id == entry_id)?;
    if let Err(e) = validate_rate(new_rate) {
        return Some(Err(e));
    }
    let others = cumulative_mortality(entries) - existing.clamped_rate();
    Some(check_cumulative(others, new_rate))
}

fn check_cumulative(cumulative: f64, rate: f64) -> Result<(), ValidationError> {
    let would_be = cumulative + rate;
    if would_be > 100.0 + CUMULATIVE_EPSILON {
        return Err(ValidationError::CumulativeOverflow {
            cumulative,
            would_be,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use aqua_types::PondId;
    use chrono::Utc;

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 1, 1).unwrap() + Duration::days(i64::from(day))
    }

    fn entry(day: u32, rate: f64) -> MortalityEntry {
        MortalityEntry::new(PondId::new("p"), date(day), rate, Utc::now())
    }

    #[test]
    fn test_no_entries_is_full_survival() {
        let state = compute_survival(&[], 1000);
        assert_eq!(state.survival_percent, 100.0);
        assert_eq!(state.estimated_alive, 1000);
    }

    #[test]
    fn test_five_and_three_percent() {
        let state = compute_survival(&[entry(0, 5.0), entry(15, 3.0)], 1000);
        assert!((state.survival_percent - 92.0).abs() < 1e-9);
        assert_eq!(state.estimated_alive, 920);
    }

    #[test]
    fn test_bad_stored_rows_are_clamped() {
        let state = compute_survival(&[entry(0, 80.0), entry(15, 150.0), entry(30, -20.0)], 500);
        assert_eq!(state.survival_percent, 0.0);
        assert_eq!(state.estimated_alive, 0);
    }

    #[test]
    fn test_estimated_alive_rounds() {
        let state = compute_survival(&[entry(0, 33.33)], 10);
        assert_eq!(state.estimated_alive, 7);
    }

    #[test]
    fn test_admission_rejects_out_of_range() {
        assert!(matches!(
            can_record_now(&[], date(0), 101.0, 15),
            Err(ValidationError::RateOutOfRange { .. })
        ));
        assert!(matches!(
            can_record_now(&[], date(0), -0.5, 15),
            Err(ValidationError::RateOutOfRange { .. })
        ));
        assert!(matches!(
            can_record_now(&[], date(0), f64::NAN, 15),
            Err(ValidationError::RateOutOfRange { .. })
        ));
    }

    #[test]
    fn test_admission_enforces_cadence() {
        let entries = vec![entry(0, 2.0)];
        let err = can_record_now(&entries, date(10), 1.0, 15).unwrap_err();
        match err {
            ValidationError::CadenceViolation {
                days_since_last,
                next_allowed,
                ..
            } => {
                assert_eq!(days_since_last, 10);
                assert_eq!(next_allowed, date(15));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(can_record_now(&entries, date(15), 1.0, 15).is_ok());
    }

    #[test]
    fn test_admission_rejects_backdated_entry() {
        let entries = vec![entry(30, 2.0)];
        assert!(matches!(
            can_record_now(&entries, date(0), 1.0, 15),
            Err(ValidationError::CadenceViolation { .. })
        ));
    }

    #[test]
    fn test_admission_enforces_cumulative_cap() {
        let entries = vec![entry(0, 60.0), entry(15, 35.0)];
        assert!(matches!(
            can_record_now(&entries, date(30), 6.0, 15),
            Err(ValidationError::CumulativeOverflow { .. })
        ));
        assert!(can_record_now(&entries, date(30), 5.0, 15).is_ok());
    }

    #[test]
    fn test_correction_excludes_old_rate() {
        let entries = vec![entry(0, 60.0), entry(15, 35.0)];
        let id = entries[1].id;
        assert_eq!(validate_correction(&entries, &id, 40.0), Some(Ok(())));
        assert!(matches!(
            validate_correction(&entries, &id, 41.0),
            Some(Err(ValidationError::CumulativeOverflow { .. }))
        ));
        assert_eq!(validate_correction(&entries, &EntryId::generate(), 1.0), None);
    }
}
