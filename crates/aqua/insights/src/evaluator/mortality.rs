//! Mortality spike evaluator.

use chrono::{DateTime, Duration, Utc};
use tracing::debug;

use aqua_types::{Evidence, FindingDraft, FindingKey, MortalityEntry, Severity};

use super::Evaluation;
use crate::config::MortalityThresholds;

/// Flags a current mortality entry above the warning threshold.
#[derive(Debug, Clone)]
pub struct MortalityEvaluator {
    thresholds: MortalityThresholds,
}

impl MortalityEvaluator {
    pub fn new(thresholds: MortalityThresholds) -> Self {
        Self { thresholds }
    }

    /// `entries` must be chronological (as an entry log returns them).
    ///
    /// Only an entry for the current period raises the spike. A latest entry
    /// below the warning threshold resolves it whatever its age, while a
    /// stale entry above it leaves the finding as it is.
    pub fn evaluate(&self, entries: &[MortalityEntry], now: DateTime<Utc>) -> Evaluation {
        let Some(latest) = entries.last() else {
            return Evaluation::none().resolve(FindingKey::MortalitySpike);
        };
        let rate = latest.clamped_rate();

        let severity = if rate >= self.thresholds.danger_percent {
            Severity::Danger
        } else if rate >= self.thresholds.warning_percent {
            Severity::Warning
        } else {
            debug!(rate, "Mortality below threshold");
            return Evaluation::none().resolve(FindingKey::MortalitySpike);
        };

        let age_days = (now.date_naive() - latest.period_date).num_days();
        if !(0..i64::from(self.thresholds.spike_freshness_days)).contains(&age_days) {
            debug!(rate, age_days, "Latest mortality entry is not current");
            return Evaluation::none();
        }

        let window = self.thresholds.baseline_window_days;
        let baseline = baseline_average(entries, now, window);
        let action = match severity {
            Severity::Danger => {
                "Heavy losses. Inspect fish for disease, check oxygen at dawn and stop feeding for a day."
            }
            _ => "Losses above normal. Check water quality and remove dead fish promptly.",
        };

        Evaluation::none().upsert(FindingDraft::new(
            FindingKey::MortalitySpike,
            severity,
            Evidence::MortalitySpike {
                period_date: latest.period_date,
                rate_percent: rate,
                baseline_avg_percent: baseline,
                window_days: window,
            },
            action,
        ))
    }
}

/// Mean clamped rate of entries dated within `window_days` before `now`.
fn baseline_average(entries: &[MortalityEntry], now: DateTime<Utc>, window_days: u32) -> Option<f64> {
    let today = now.date_naive();
    let since = today - Duration::days(window_days as i64);
    let rates: Vec<f64> = entries
        .iter()
        .filter(|e| e.period_date > since && e.period_date <= today)
        .map(MortalityEntry::clamped_rate)
        .collect();
    if rates.is_empty() {
        None
    } else {
        Some(rates.iter().sum::<f64>() / rates.len() as f64)
    }
}
