//! In-memory document store for development and testing.
//!
//! Per-document atomicity comes from the DashMap shard lock: `transact` runs
//! its body while holding the entry, so concurrent transactions on the same
//! document serialize.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::debug;

use crate::document::{deep_merge, ChangeKind, Document, DocumentChange, DocumentStore, UpdateFn};
use crate::error::{Result, StoreError};

const CHANGE_CHANNEL_CAPACITY: usize = 1024;

#[derive(Debug, Clone)]
struct Stored {
    value: Value,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    seq: u64,
}

/// In-memory document store.
pub struct InMemoryDocumentStore {
    docs: Arc<DashMap<(String, String), Stored>>,
    seq: AtomicU64,
    available: AtomicBool,
    changes: broadcast::Sender<DocumentChange>,
}

impl InMemoryDocumentStore {
    /// Create an empty store.
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            docs: Arc::new(DashMap::new()),
            seq: AtomicU64::new(0),
            available: AtomicBool::new(true),
            changes,
        }
    }

    /// Simulate an outage. While unavailable every operation fails with
    /// [`StoreError::Unavailable`].
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Total documents across all collections.
    pub fn total_count(&self) -> usize {
        self.docs.len()
    }

    fn check_available(&self) -> Result<()> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError::Unavailable("in-memory store offline".into()))
        }
    }

    fn next_seq(&self) -> u64 {
        self.seq.fetch_add(1, Ordering::SeqCst)
    }

    fn notify(&self, collection: &str, key: &str, kind: ChangeKind) {
        // No receivers is fine.
        let _ = self.changes.send(DocumentChange {
            collection: collection.to_string(),
            key: key.to_string(),
            kind,
        });
    }

    fn write(
        &self,
        collection: &str,
        key: &str,
        apply: impl FnOnce(Option<&Value>) -> Result<Value>,
    ) -> Result<Value> {
        self.check_available()?;
        let now = Utc::now();
        let id = (collection.to_string(), key.to_string());
        let (value, kind) = match self.docs.entry(id) {
            Entry::Occupied(mut occupied) => {
                let value = apply(Some(&occupied.get().value))?;
                let stored = occupied.get_mut();
                stored.value = value.clone();
                stored.updated_at = now;
                (value, ChangeKind::Updated)
            }
            Entry::Vacant(vacant) => {
                let value = apply(None)?;
                vacant.insert(Stored {
                    value: value.clone(),
                    created_at: now,
                    updated_at: now,
                    seq: self.next_seq(),
                });
                (value, ChangeKind::Created)
            }
        };
        self.notify(collection, key, kind);
        Ok(value)
    }
}

impl Default for InMemoryDocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn get(&self, collection: &str, key: &str) -> Result<Option<Document>> {
        self.check_available()?;
        let id = (collection.to_string(), key.to_string());
        Ok(self.docs.get(&id).map(|stored| Document {
            collection: collection.to_string(),
            key: key.to_string(),
            value: stored.value.clone(),
            created_at: stored.created_at,
            updated_at: stored.updated_at,
        }))
    }

    async fn set(&self, collection: &str, key: &str, value: Value) -> Result<()> {
        self.write(collection, key, |_| Ok(value))?;
        Ok(())
    }

    async fn set_merge(&self, collection: &str, key: &str, patch: Value) -> Result<()> {
        self.write(collection, key, |existing| {
            let mut merged = existing.cloned().unwrap_or(Value::Object(Default::default()));
            deep_merge(&mut merged, patch);
            Ok(merged)
        })?;
        Ok(())
    }

    async fn delete(&self, collection: &str, key: &str) -> Result<bool> {
        self.check_available()?;
        let id = (collection.to_string(), key.to_string());
        let existed = self.docs.remove(&id).is_some();
        if existed {
            self.notify(collection, key, ChangeKind::Deleted);
        }
        Ok(existed)
    }

    async fn list(&self, collection: &str) -> Result<Vec<Document>> {
        self.check_available()?;
        let mut found: Vec<(u64, Document)> = self
            .docs
            .iter()
            .filter(|entry| entry.key().0 == collection)
            .map(|entry| {
                let stored = entry.value();
                (
                    stored.seq,
                    Document {
                        collection: collection.to_string(),
                        key: entry.key().1.clone(),
                        value: stored.value.clone(),
                        created_at: stored.created_at,
                        updated_at: stored.updated_at,
                    },
                )
            })
            .collect();
        found.sort_by_key(|(seq, _)| *seq);
        Ok(found.into_iter().map(|(_, doc)| doc).collect())
    }

    async fn transact(&self, collection: &str, key: &str, update: UpdateFn) -> Result<Value> {
        debug!(collection = %collection, key = %key, "Running document transaction");
        self.write(collection, key, |existing| update(existing.cloned()))
    }

    fn subscribe(&self) -> broadcast::Receiver<DocumentChange> {
        self.changes.subscribe()
    }

    fn name(&self) -> &str {
        "in-memory"
    }
}
