//! Append-only per-pond entry logs.
//!
//! Mortality, growth and feeding entries are never mutated in place except
//! through an explicit correction (`replace_checked`). Admission checks run
//! under the same lock as the write, so two concurrent appends cannot both
//! pass a check that only one of them should.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveTime, Utc};
use dashmap::DashMap;
use tracing::debug;

use aqua_types::{EntryId, FeedingEvent, GrowthMeasurement, MortalityEntry, PondId, ValidationError};

use crate::error::Result;

/// Admission check run against the pond's current entries.
pub type CheckFn<T> = Box<dyn FnOnce(&[T]) -> std::result::Result<(), ValidationError> + Send>;

/// An entry that can live in an [`EntryLog`].
pub trait LogEntry: Clone + Send + Sync + 'static {
    fn entry_id(&self) -> EntryId;
    fn pond(&self) -> &PondId;
    /// Chronological position within the pond's log.
    fn sort_key(&self) -> DateTime<Utc>;
}

impl LogEntry for MortalityEntry {
    fn entry_id(&self) -> EntryId {
        self.id
    }

    fn pond(&self) -> &PondId {
        &self.pond_id
    }

    fn sort_key(&self) -> DateTime<Utc> {
        self.period_date.and_time(NaiveTime::MIN).and_utc()
    }
}

impl LogEntry for GrowthMeasurement {
    fn entry_id(&self) -> EntryId {
        self.id
    }

    fn pond(&self) -> &PondId {
        &self.pond_id
    }

    fn sort_key(&self) -> DateTime<Utc> {
        self.recorded_at
    }
}

impl LogEntry for FeedingEvent {
    fn entry_id(&self) -> EntryId {
        self.id
    }

    fn pond(&self) -> &PondId {
        &self.pond_id
    }

    fn sort_key(&self) -> DateTime<Utc> {
        self.fed_at
    }
}

/// Per-pond append-only log.
#[async_trait]
pub trait EntryLog<T: LogEntry>: Send + Sync {
    /// Append unconditionally.
    async fn append(&self, entry: T) -> Result<()>;

    /// Append only if `check` accepts the pond's current entries.
    async fn append_checked(&self, entry: T, check: CheckFn<T>) -> Result<()>;

    /// Replace the entry with the same id if `check` accepts the current
    /// entries. Returns `false` when no such entry exists.
    async fn replace_checked(&self, entry: T, check: CheckFn<T>) -> Result<bool>;

    /// The pond's entries in chronological order.
    async fn list(&self, pond_id: &PondId) -> Result<Vec<T>>;

    /// Drop every entry for the pond. Returns how many were removed.
    async fn clear(&self, pond_id: &PondId) -> Result<usize>;
}

/// In-memory entry log.
pub struct InMemoryEntryLog<T> {
    entries: Arc<DashMap<PondId, Vec<T>>>,
}

impl<T: LogEntry> InMemoryEntryLog<T> {
    pub fn new() -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
        }
    }

    fn insert_sorted(list: &mut Vec<T>, entry: T) {
        let key = entry.sort_key();
        let at = list.partition_point(|e| e.sort_key() <= key);
        list.insert(at, entry);
    }
}

impl<T: LogEntry> Default for InMemoryEntryLog<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<T: LogEntry> EntryLog<T> for InMemoryEntryLog<T> {
    async fn append(&self, entry: T) -> Result<()> {
        let mut list = self.entries.entry(entry.pond().clone()).or_default();
        Self::insert_sorted(&mut list, entry);
        Ok(())
    }

    async fn append_checked(&self, entry: T, check: CheckFn<T>) -> Result<()> {
        let mut list = self.entries.entry(entry.pond().clone()).or_default();
        check(list.as_slice())?;
        debug!(pond_id = %entry.pond(), entry_id = %entry.entry_id(), "Entry admitted");
        Self::insert_sorted(&mut list, entry);
        Ok(())
    }

    async fn replace_checked(&self, entry: T, check: CheckFn<T>) -> Result<bool> {
        let Some(mut list) = self.entries.get_mut(entry.pond()) else {
            return Ok(false);
        };
        let Some(at) = list.iter().position(|e| e.entry_id() == entry.entry_id()) else {
            return Ok(false);
        };
        check(list.as_slice())?;
        list.remove(at);
        Self::insert_sorted(&mut list, entry);
        Ok(true)
    }

    async fn list(&self, pond_id: &PondId) -> Result<Vec<T>> {
        Ok(self
            .entries
            .get(pond_id)
            .map(|list| list.clone())
            .unwrap_or_default())
    }

    async fn clear(&self, pond_id: &PondId) -> Result<usize> {
        Ok(self
            .entries
            .remove(pond_id)
            .map(|(_, list)| list.len())
            .unwrap_or(0))
    }
}
