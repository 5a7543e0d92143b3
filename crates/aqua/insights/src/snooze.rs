//! Per-user snooze overlay.
//!
//! Snoozes live in `snoozes/{pond}` with one document per user holding a
//! `{finding_key: until_epoch_ms}` map. Writes merge a single key so other
//! snoozes of the same user survive. The overlay is applied at read time
//! and never touches the findings themselves; `until > now` is checked on
//! every read, so pruning is optional housekeeping.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::{debug, info, instrument, warn};

use aqua_store::{set_merge_typed, DocumentStore, UpdateFn};
use aqua_types::{Finding, FindingKey, PondId, SnoozeEntry, UserId};

use crate::clock::Clock;
use crate::error::Result;
use crate::lifecycle::InsightStore;

/// Collection holding a pond's snoozes, one document per user.
pub fn snooze_collection(pond_id: &PondId) -> String {
    format!("snoozes/{}", pond_id.as_str())
}

/// Read-time snooze filter over the insight store.
pub struct SnoozeOverlay {
    store: Arc<dyn DocumentStore>,
    clock: Arc<dyn Clock>,
}

impl SnoozeOverlay {
    pub fn new(store: Arc<dyn DocumentStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Merge one snooze into the user's map.
    #[instrument(skip(self, pond_id, entry), fields(pond_id = %pond_id, user = %entry.user_id, key = %entry.finding_key))]
    pub async fn set_snooze(&self, pond_id: &PondId, entry: &SnoozeEntry) -> Result<()> {
        let patch = BTreeMap::from([(entry.finding_key.as_str(), entry.until)]);
        set_merge_typed(
            self.store.as_ref(),
            &snooze_collection(pond_id),
            entry.user_id.as_str(),
            &patch,
        )
        .await?;
        info!(until = entry.until, "Finding snoozed");
        Ok(())
    }

    /// Every stored snooze of the user, expired ones included.
    pub async fn snoozes(&self, pond_id: &PondId, user_id: &UserId) -> Result<Vec<SnoozeEntry>> {
        let collection = snooze_collection(pond_id);
        let Some(doc) = self.store.get(&collection, user_id.as_str()).await? else {
            return Ok(Vec::new());
        };
        Ok(parse_snoozes(user_id, &doc.value))
    }

    /// Keys the user currently has snoozed.
    pub async fn snoozed_keys(&self, pond_id: &PondId, user_id: &UserId) -> Result<HashSet<FindingKey>> {
        let now = self.clock.now();
        Ok(self
            .snoozes(pond_id, user_id)
            .await?
            .into_iter()
            .filter(|s| s.is_active_at(now))
            .map(|s| s.finding_key)
            .collect())
    }

    /// Active findings minus the ones the user has snoozed, oldest first.
    pub async fn visible(&self, insights: &InsightStore, pond_id: &PondId, user_id: &UserId) -> Result<Vec<Finding>> {
        let active = insights.active(pond_id).await?;
        let snoozes = self.snoozes(pond_id, user_id).await?;
        Ok(filter_visible(active, &snoozes, self.clock.now()))
    }

    /// Drop expired entries from the user's map. Returns how many went.
    pub async fn prune_expired(&self, pond_id: &PondId, user_id: &UserId) -> Result<usize> {
        let collection = snooze_collection(pond_id);
        if self.store.get(&collection, user_id.as_str()).await?.is_none() {
            return Ok(0);
        }

        let now_ms = self.clock.now().timestamp_millis();
        let before = self.snoozes(pond_id, user_id).await?.len();
        let prune: UpdateFn = Box::new(move |current: Option<Value>| -> aqua_store::Result<Value> {
            let kept: Map<String, Value> = match current {
                Some(Value::Object(map)) => map
                    .into_iter()
                    .filter(|(_, until)| until.as_i64().map(|u| u > now_ms).unwrap_or(false))
                    .collect(),
                _ => Map::new(),
            };
            Ok(Value::Object(kept))
        });
        let remaining = self.store.transact(&collection, user_id.as_str(), prune).await?;
        let after = parse_snoozes(user_id, &remaining).len();
        let pruned = before.saturating_sub(after);
        debug!(pond_id = %pond_id, user = %user_id, pruned, "Expired snoozes pruned");
        Ok(pruned)
    }
}

/// `findings` minus those with a snooze whose `until` is still ahead.
pub fn filter_visible(findings: Vec<Finding>, snoozes: &[SnoozeEntry], now: chrono::DateTime<chrono::Utc>) -> Vec<Finding> {
    let snoozed: HashSet<FindingKey> = snoozes
        .iter()
        .filter(|s| s.is_active_at(now))
        .map(|s| s.finding_key)
        .collect();
    findings
        .into_iter()
        .filter(|f| f.is_active() && !snoozed.contains(&f.key))
        .collect()
}

fn parse_snoozes(user_id: &UserId, value: &Value) -> Vec<SnoozeEntry> {
    let Some(map) = value.as_object() else {
        warn!(user = %user_id, "Snooze document is not a map");
        return Vec::new();
    };
    map.iter()
        .filter_map(|(key, until)| {
            let finding_key = key.parse::<FindingKey>().ok()?;
            let until = until.as_i64()?;
            Some(SnoozeEntry {
                user_id: user_id.clone(),
                finding_key,
                until,
            })
        })
        .collect()
}
