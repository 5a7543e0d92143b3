//! Water-chemistry evaluator.

use chrono::{DateTime, Utc};
use tracing::debug;

use aqua_types::{
    Evidence, FindingDraft, FindingKey, Severity, Signal, SignalLevel, SignalState,
};

use super::Evaluation;
use crate::config::{InsightConfig, WaterBand};

/// Classifies one signal against its band and tracks low/ok/high
/// transitions.
#[derive(Debug, Clone)]
pub struct WaterEvaluator {
    config: InsightConfig,
}

impl WaterEvaluator {
    pub fn new(config: InsightConfig) -> Self {
        Self { config }
    }

    /// Evaluate one signal.
    ///
    /// `previous` is the last persisted level for this pond and signal. A
    /// recovered notice is only emitted on a transition from low or high
    /// back to ok; a first-ever reading never produces one.
    pub fn evaluate(
        &self,
        signal: Signal,
        value: Option<f64>,
        previous: Option<SignalLevel>,
        now: DateTime<Utc>,
    ) -> Evaluation {
        let Some(value) = value.filter(|v| v.is_finite()) else {
            return Evaluation::none();
        };

        let band = self.config.water.for_signal(signal);
        let level = band.band.level(value);
        let state = SignalState {
            signal,
            level,
            updated_at: now,
        };
        debug!(signal = %signal, value, level = ?level, previous = ?previous, "Water signal classified");

        match level {
            SignalLevel::Low | SignalLevel::High => {
                let key = if level == SignalLevel::Low {
                    FindingKey::Low(signal)
                } else {
                    FindingKey::High(signal)
                };
                let mut evaluation = Evaluation::none()
                    .resolve(FindingKey::Recovered(signal))
                    .upsert(out_of_band_draft(key, signal, value, band))
                    .with_state(state);
                if let Some(opposite) = key.opposite() {
                    evaluation = evaluation.resolve(opposite);
                }
                evaluation
            }
            SignalLevel::Ok => {
                let mut evaluation = Evaluation::none()
                    .resolve(FindingKey::Low(signal))
                    .resolve(FindingKey::High(signal))
                    .with_state(state);
                if matches!(previous, Some(SignalLevel::Low | SignalLevel::High)) {
                    let draft = FindingDraft::new(
                        FindingKey::Recovered(signal),
                        Severity::Info,
                        Evidence::Recovered { signal, value },
                        format!("{} back in range ({:.1} {})", label(signal), value, signal.unit()),
                    )
                    .auto_resolve_after(self.config.recovered_ttl());
                    evaluation = evaluation.upsert(draft);
                }
                evaluation
            }
        }
    }
}

fn out_of_band_draft(key: FindingKey, signal: Signal, value: f64, band: &WaterBand) -> FindingDraft {
    let severity = if band.band.distance_outside(value) >= band.danger_margin {
        Severity::Danger
    } else {
        Severity::Warning
    };
    FindingDraft::new(
        key,
        severity,
        Evidence::WaterQuality {
            signal,
            value,
            band_min: band.band.min,
            band_max: band.band.max,
        },
        suggested_action(key),
    )
}

fn label(signal: Signal) -> &'static str {
    match signal {
        Signal::Temperature => "Temperature",
        Signal::Ph => "pH",
        Signal::DissolvedOxygen => "Dissolved oxygen",
    }
}

fn suggested_action(key: FindingKey) -> &'static str {
    match key {
        FindingKey::Low(Signal::Temperature) => {
            "Water is too cold. Reduce feeding and check heaters or pond depth."
        }
        FindingKey::High(Signal::Temperature) => {
            "Water is too warm. Increase aeration, add shade or exchange water."
        }
        FindingKey::Low(Signal::Ph) => "pH is low. Apply agricultural lime and recheck.",
        FindingKey::High(Signal::Ph) => {
            "pH is high. Partial water exchange and avoid liming until it settles."
        }
        FindingKey::Low(Signal::DissolvedOxygen) => {
            "Oxygen is low. Run aerators now and stop feeding until it recovers."
        }
        FindingKey::High(Signal::DissolvedOxygen) => {
            "Oxygen is supersaturated. Reduce aeration and watch for algae bloom."
        }
        _ => "Check the pond.",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn evaluator() -> WaterEvaluator {
        WaterEvaluator::new(InsightConfig::default())
    }

    #[test]
    fn test_high_temperature() {
        let now = Utc::now();
        let eval = evaluator().evaluate(Signal::Temperature, Some(32.0), Some(SignalLevel::Ok), now);

        assert_eq!(eval.upserted_keys(), vec![FindingKey::High(Signal::Temperature)]);
        assert_eq!(eval.upserts[0].severity, Severity::Warning);
        assert!(eval.resolves.contains(&FindingKey::Low(Signal::Temperature)));
        assert!(eval.resolves.contains(&FindingKey::Recovered(Signal::Temperature)));
        assert_eq!(eval.signal_state.unwrap().level, SignalLevel::High);
    }

    #[test]
    fn test_danger_beyond_margin() {
        let eval = evaluator().evaluate(Signal::Ph, Some(5.4), None, Utc::now());
        assert_eq!(eval.upserted_keys(), vec![FindingKey::Low(Signal::Ph)]);
        assert_eq!(eval.upserts[0].severity, Severity::Danger);
        assert!(eval.resolves.contains(&FindingKey::High(Signal::Ph)));
    }

    #[test]
    fn test_recovery_emits_transient_notice() {
        let eval = evaluator().evaluate(
            Signal::Temperature,
            Some(30.0),
            Some(SignalLevel::High),
            Utc::now(),
        );

        assert_eq!(eval.upserted_keys(), vec![FindingKey::Recovered(Signal::Temperature)]);
        let draft = &eval.upserts[0];
        assert_eq!(draft.severity, Severity::Info);
        assert_eq!(draft.auto_resolve_after, Some(chrono::Duration::minutes(5)));
        assert!(eval.resolves.contains(&FindingKey::High(Signal::Temperature)));
        assert!(eval.resolves.contains(&FindingKey::Low(Signal::Temperature)));
    }

    #[test]
    fn test_steady_ok_has_no_notice() {
        let eval = evaluator().evaluate(
            Signal::DissolvedOxygen,
            Some(5.0),
            Some(SignalLevel::Ok),
            Utc::now(),
        );
        assert!(eval.upserts.is_empty());
        assert_eq!(eval.resolves.len(), 2);

        let first = evaluator().evaluate(Signal::DissolvedOxygen, Some(5.0), None, Utc::now());
        assert!(first.upserts.is_empty());
    }

    #[test]
    fn test_missing_value_is_a_no_op() {
        let eval = evaluator().evaluate(Signal::Ph, None, Some(SignalLevel::High), Utc::now());
        assert!(eval.is_empty());
        let nan = evaluator().evaluate(Signal::Ph, Some(f64::NAN), None, Utc::now());
        assert!(nan.is_empty());
    }

    #[test]
    fn test_band_edges_are_ok() {
        for value in [29.0, 31.0] {
            let eval = evaluator().evaluate(Signal::Temperature, Some(value), None, Utc::now());
            assert_eq!(eval.signal_state.unwrap().level, SignalLevel::Ok);
        }
    }
}
