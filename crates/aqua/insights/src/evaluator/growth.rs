//! Growth shortfall evaluator.

use tracing::debug;

use aqua_growth::{ActualPoint, GrowthModel};
use aqua_types::{Evidence, FindingDraft, FindingKey, Severity};

use super::Evaluation;
use crate::config::GrowthThresholds;

/// Compares the latest measured ABW with what the rebase-aware forecast
/// predicted for that period.
#[derive(Debug, Clone)]
pub struct GrowthEvaluator {
    thresholds: GrowthThresholds,
}

impl GrowthEvaluator {
    pub fn new(thresholds: GrowthThresholds) -> Self {
        Self { thresholds }
    }

    pub fn evaluate(
        &self,
        model: &GrowthModel,
        actuals: &[ActualPoint],
        seed_weight: f64,
        target: Option<f64>,
    ) -> Evaluation {
        let Some(latest) = actuals.iter().max_by_key(|a| a.period) else {
            return Evaluation::none().resolve(FindingKey::GrowthBehind);
        };

        let series = model.forward_forecast(actuals, seed_weight, target, 0);
        let Some(predicted) = series
            .get(latest.period as usize)
            .map(|p| p.abw_grams)
            .filter(|p| *p > 0.0)
        else {
            return Evaluation::none();
        };

        let gap = (predicted - latest.abw_grams) / predicted * 100.0;
        debug!(period = latest.period, predicted, actual = latest.abw_grams, gap, "Growth gap computed");

        let severity = if gap > self.thresholds.danger_gap_percent {
            Severity::Danger
        } else if gap > self.thresholds.warning_gap_percent {
            Severity::Warning
        } else {
            return Evaluation::none().resolve(FindingKey::GrowthBehind);
        };

        Evaluation::none().upsert(FindingDraft::new(
            FindingKey::GrowthBehind,
            severity,
            Evidence::GrowthShortfall {
                period_index: latest.period,
                predicted_abw_grams: predicted,
                actual_abw_grams: latest.abw_grams,
                gap_percent: gap,
            },
            "Fish are behind the growth curve. Review feed quality, feeding rate and water quality.",
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model() -> GrowthModel {
        GrowthModel::canonical(15)
    }

    fn evaluator() -> GrowthEvaluator {
        GrowthEvaluator::new(GrowthThresholds::default())
    }

    #[test]
    fn test_on_track_resolves() {
        // Predicted at period 1 from seed 5 g is ~14.64 g.
        let actuals = [ActualPoint { period: 1, abw_grams: 14.0 }];
        let eval = evaluator().evaluate(&model(), &actuals, 5.0, None);
        assert!(eval.upserts.is_empty());
        assert_eq!(eval.resolves, vec![FindingKey::GrowthBehind]);
    }

    #[test]
    fn test_shortfall_severity() {
        let warning = evaluator().evaluate(
            &model(),
            &[ActualPoint { period: 1, abw_grams: 12.5 }],
            5.0,
            None,
        );
        assert_eq!(warning.upserts[0].severity, Severity::Warning);

        let danger = evaluator().evaluate(
            &model(),
            &[ActualPoint { period: 1, abw_grams: 9.0 }],
            5.0,
            None,
        );
        assert_eq!(danger.upserts[0].severity, Severity::Danger);
        match danger.upserts[0].evidence {
            Evidence::GrowthShortfall { period_index, gap_percent, .. } => {
                assert_eq!(period_index, 1);
                assert!(gap_percent > 20.0);
            }
            ref other => panic!("unexpected evidence {other:?}"),
        }
    }

    #[test]
    fn test_prediction_uses_previous_actual() {
        // Period 2 is predicted from the period-1 actual, not the seed track.
        let actuals = [
            ActualPoint { period: 1, abw_grams: 10.0 },
            ActualPoint { period: 2, abw_grams: 19.0 },
        ];
        let eval = evaluator().evaluate(&model(), &actuals, 5.0, None);
        assert!(eval.upserts.is_empty());
    }

    #[test]
    fn test_no_actuals() {
        let eval = evaluator().evaluate(&model(), &[], 5.0, None);
        assert_eq!(eval.resolves, vec![FindingKey::GrowthBehind]);
    }
}
