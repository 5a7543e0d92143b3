//! Property tests for survival accounting, forecast rebasing and finding
//! exclusivity.

use std::sync::Arc;

use aqua_growth::{
    can_record_now, compute_survival, cumulative_mortality, ActualPoint, DaysToTarget, GrowthModel,
};
use aqua_insights::{Clock, InsightConfig, InsightStore, ManualClock, WaterEvaluator};
use aqua_store::InMemoryDocumentStore;
use aqua_types::{FindingKey, MortalityEntry, PondId, Signal};
use chrono::{Duration, NaiveDate, TimeZone, Utc};
use proptest::prelude::*;

// ---------------------------------------------------------------------------
// Strategies
// ---------------------------------------------------------------------------

fn arb_rates(max_len: usize) -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(0.0f64..60.0, 0..max_len)
}

/// Strictly increasing periods with a weight for each.
fn arb_actuals() -> impl Strategy<Value = Vec<ActualPoint>> {
    prop::collection::vec((1u32..4, 1.0f64..400.0), 0..6).prop_map(|steps| {
        let mut period = 0;
        steps
            .into_iter()
            .map(|(gap, abw_grams)| {
                period += gap;
                ActualPoint { period, abw_grams }
            })
            .collect()
    })
}

fn arb_temperatures() -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(
        prop_oneof![20.0f64..28.9, 29.0f64..31.0, 31.1f64..40.0, Just(f64::NAN)],
        1..25,
    )
}

fn start_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
}

/// Push each rate through the admission check, keeping only accepted ones.
fn admit(rates: &[f64]) -> Vec<MortalityEntry> {
    let pond = PondId::new("p1");
    let created = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    let mut entries: Vec<MortalityEntry> = Vec::new();
    for (i, rate) in rates.iter().enumerate() {
        let date = start_date() + Duration::days(15 * i as i64);
        if can_record_now(&entries, date, *rate, 15).is_ok() {
            entries.push(MortalityEntry::new(pond.clone(), date, *rate, created));
        }
    }
    entries
}

// ---------------------------------------------------------------------------
// Survival
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn survival_never_increases(rates in arb_rates(12), stocked in 1u64..100_000) {
        let entries = admit(&rates);
        let mut previous = compute_survival(&[], stocked).survival_percent;
        for n in 1..=entries.len() {
            let current = compute_survival(&entries[..n], stocked).survival_percent;
            prop_assert!(current <= previous + 1e-9);
            previous = current;
        }
    }

    #[test]
    fn cumulative_mortality_capped(rates in arb_rates(12)) {
        let entries = admit(&rates);
        prop_assert!(cumulative_mortality(&entries) <= 100.0 + 1e-6);

        let cumulative = cumulative_mortality(&entries);
        let date = start_date() + Duration::days(15 * rates.len() as i64);
        let overflow = 100.0 - cumulative + 1.0;
        if overflow <= 100.0 {
            prop_assert!(can_record_now(&entries, date, overflow, 15).is_err());
        }
    }
}

// ---------------------------------------------------------------------------
// Growth model
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn new_actual_keeps_earlier_forecast(
        actuals in arb_actuals(),
        gap in 1u32..4,
        abw in 1.0f64..400.0,
        seed in 1.0f64..50.0,
    ) {
        let model = GrowthModel::canonical(15);
        let before = model.forward_forecast(&actuals, seed, None, 10);

        let k = actuals.last().map(|a| a.period).unwrap_or(0) + gap;
        let mut extended = actuals.clone();
        extended.push(ActualPoint { period: k, abw_grams: abw });
        let after = model.forward_forecast(&extended, seed, None, 10);

        for i in 0..=(k as usize).min(before.len() - 1) {
            prop_assert_eq!(before[i], after[i]);
        }
        prop_assert!((after[k as usize + 1].abw_grams - model.step(abw, None)).abs() < 1e-9);
    }

    #[test]
    fn target_at_or_below_current_is_zero_days(current in 0.1f64..2000.0, below in 0.0f64..1.0) {
        let model = GrowthModel::canonical(15);
        let target = current * below;
        prop_assert_eq!(model.days_to_target(Some(current), Some(target)), DaysToTarget::Days(0));
        prop_assert_eq!(model.days_to_target(Some(current), Some(current)), DaysToTarget::Days(0));
    }
}

// ---------------------------------------------------------------------------
// Finding exclusivity
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn opposite_temperature_findings_never_both_active(temps in arb_temperatures()) {
        let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
        runtime.block_on(async {
            let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
            let clock = Arc::new(ManualClock::new(now));
            let insights = InsightStore::new(Arc::new(InMemoryDocumentStore::new()), clock.clone());
            let evaluator = WaterEvaluator::new(InsightConfig::default());
            let pond = PondId::new("p1");

            for temp in temps {
                clock.advance(Duration::seconds(1));
                let previous = insights.signal_level(&pond, Signal::Temperature).await.unwrap();
                let evaluation = evaluator.evaluate(Signal::Temperature, Some(temp), previous, clock.now());
                insights.apply(&pond, evaluation).await.unwrap();

                let active: Vec<FindingKey> = insights
                    .active(&pond)
                    .await
                    .unwrap()
                    .into_iter()
                    .map(|f| f.key)
                    .collect();
                let low = active.contains(&FindingKey::Low(Signal::Temperature));
                let high = active.contains(&FindingKey::High(Signal::Temperature));
                assert!(!(low && high), "both directions active after {temp}");
            }
        });
    }
}
