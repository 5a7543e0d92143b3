//! Daily per-signal aggregate buckets.
//!
//! Every accepted reading is folded into the bucket for its pond, signal and
//! UTC date with a single read-modify-write transaction, so concurrent
//! ingests for the same bucket never lose a sample.

use chrono::NaiveDate;
use tracing::debug;

use aqua_types::{DailyAggregate, PondId, Signal};

use crate::document::{list_typed, DocumentStore};
use crate::error::Result;

/// Collection holding a pond's buckets for one signal.
pub fn daily_collection(pond_id: &PondId, signal: Signal) -> String {
    format!("daily/{}/{}", pond_id.as_str(), signal.key_prefix())
}

/// Fold `value` into the bucket for `date`. Non-finite values are ignored.
pub async fn record_daily(
    store: &dyn DocumentStore,
    pond_id: &PondId,
    date: NaiveDate,
    signal: Signal,
    value: f64,
) -> Result<Option<DailyAggregate>> {
    if !value.is_finite() {
        return Ok(None);
    }

    let collection = daily_collection(pond_id, signal);
    let key = date.to_string();
    let pond = pond_id.clone();
    let updated = store
        .transact(
            &collection,
            &key,
            Box::new(move |current: Option<serde_json::Value>| -> Result<serde_json::Value> {
                let mut bucket = match current {
                    Some(v) => serde_json::from_value(v)?,
                    None => DailyAggregate::empty(pond, date, signal),
                };
                bucket.record(value);
                Ok(serde_json::to_value(bucket)?)
            }),
        )
        .await?;

    let bucket: DailyAggregate = serde_json::from_value(updated)?;
    debug!(
        pond_id = %pond_id,
        signal = %signal,
        date = %date,
        count = bucket.count,
        "Daily aggregate updated"
    );
    Ok(Some(bucket))
}

/// All buckets for a pond and signal, oldest date first.
pub async fn list_daily(
    store: &dyn DocumentStore,
    pond_id: &PondId,
    signal: Signal,
) -> Result<Vec<DailyAggregate>> {
    let mut buckets: Vec<DailyAggregate> =
        list_typed(store, &daily_collection(pond_id, signal)).await?;
    buckets.sort_by_key(|b| b.date);
    Ok(buckets)
}
