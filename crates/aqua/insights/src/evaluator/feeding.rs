//! Feeding deviation evaluator.

use tracing::debug;

use aqua_types::{Evidence, FeedingEvent, FindingDraft, FindingKey, Severity};

use super::Evaluation;
use crate::config::FeedingConfig;

/// Compares a logged feeding with the suggested amount.
///
/// The findings describe a single event, so they always carry a short
/// auto-resolve deadline.
#[derive(Debug, Clone)]
pub struct FeedingEvaluator {
    config: FeedingConfig,
    ttl: chrono::Duration,
}

impl FeedingEvaluator {
    pub fn new(config: FeedingConfig, ttl: chrono::Duration) -> Self {
        Self { config, ttl }
    }

    /// Suggested kilograms: the event's own suggestion when present,
    /// otherwise derived from the estimated population and ABW.
    pub fn suggested_kg(&self, event: &FeedingEvent, estimated_alive: u64, abw_grams: Option<f64>) -> Option<f64> {
        event
            .suggested_kg
            .or_else(|| abw_grams.map(|abw| self.config.suggested_kg(estimated_alive, abw)))
            .filter(|kg| kg.is_finite() && *kg > 0.0)
    }

    pub fn evaluate(&self, event: &FeedingEvent, estimated_alive: u64, abw_grams: Option<f64>) -> Evaluation {
        let Some(suggested) = self.suggested_kg(event, estimated_alive, abw_grams) else {
            debug!("No feeding suggestion available");
            return Evaluation::none();
        };
        let ratio = event.amount_kg / suggested;

        let (key, action) = if ratio < self.config.under_ratio {
            (
                FindingKey::FeedUnder,
                "Feeding below the suggested amount. Check appetite and feed availability.",
            )
        } else if ratio > self.config.over_ratio {
            (
                FindingKey::FeedOver,
                "Feeding above the suggested amount. Uneaten feed degrades water quality.",
            )
        } else {
            return Evaluation::none();
        };

        let draft = FindingDraft::new(
            key,
            Severity::Warning,
            Evidence::FeedingDeviation {
                given_kg: event.amount_kg,
                suggested_kg: suggested,
                ratio,
            },
            action,
        )
        .auto_resolve_after(self.ttl);

        let mut evaluation = Evaluation::none().upsert(draft);
        if let Some(opposite) = key.opposite() {
            evaluation = evaluation.resolve(opposite);
        }
        evaluation
    }
}
