//! Generic persisted-document abstraction.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::broadcast;

use crate::error::Result;

/// A stored document and its bookkeeping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub collection: String,
    pub key: String,
    pub value: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// What happened to a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChangeKind {
    Created,
    Updated,
    Deleted,
}

/// Change-feed notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentChange {
    pub collection: String,
    pub key: String,
    pub kind: ChangeKind,
}

/// Read-modify-write body run atomically against one document.
pub type UpdateFn = Box<dyn FnOnce(Option<Value>) -> Result<Value> + Send>;

/// Keyed document storage shared by every viewer of a pond.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Get a document, or `None` if it does not exist.
    async fn get(&self, collection: &str, key: &str) -> Result<Option<Document>>;

    /// Create or fully overwrite a document.
    async fn set(&self, collection: &str, key: &str, value: Value) -> Result<()>;

    /// Deep-merge `patch` into a document, creating it if missing.
    /// Keys absent from the patch are left untouched.
    async fn set_merge(&self, collection: &str, key: &str, patch: Value) -> Result<()>;

    /// Delete a document. Returns whether it existed.
    async fn delete(&self, collection: &str, key: &str) -> Result<bool>;

    /// All documents of a collection, oldest first.
    async fn list(&self, collection: &str) -> Result<Vec<Document>>;

    /// Run `update` against the current value as one atomic transaction.
    async fn transact(&self, collection: &str, key: &str, update: UpdateFn) -> Result<Value>;

    /// Change feed across all collections.
    fn subscribe(&self) -> broadcast::Receiver<DocumentChange>;

    /// Store name for logging
    fn name(&self) -> &str;
}

/// Get and deserialize a document.
pub async fn get_typed<T: DeserializeOwned>(
    store: &dyn DocumentStore,
    collection: &str,
    key: &str,
) -> Result<Option<T>> {
    match store.get(collection, key).await? {
        Some(doc) => Ok(Some(serde_json::from_value(doc.value)?)),
        None => Ok(None),
    }
}

/// Serialize and overwrite a document.
pub async fn set_typed<T: Serialize + Sync>(
    store: &dyn DocumentStore,
    collection: &str,
    key: &str,
    value: &T,
) -> Result<()> {
    store.set(collection, key, serde_json::to_value(value)?).await
}

/// Serialize and deep-merge into a document.
pub async fn set_merge_typed<T: Serialize + Sync>(
    store: &dyn DocumentStore,
    collection: &str,
    key: &str,
    patch: &T,
) -> Result<()> {
    store
        .set_merge(collection, key, serde_json::to_value(patch)?)
        .await
}

/// Deserialize every document of a collection, oldest first.
pub async fn list_typed<T: DeserializeOwned>(
    store: &dyn DocumentStore,
    collection: &str,
) -> Result<Vec<T>> {
    store
        .list(collection)
        .await?
        .into_iter()
        .map(|doc| serde_json::from_value(doc.value).map_err(Into::into))
        .collect()
}

/// Merge `patch` into `target` recursively. Objects merge key by key; any
/// other value replaces what was there.
pub(crate) fn deep_merge(target: &mut Value, patch: Value) {
    match (target, patch) {
        (Value::Object(target), Value::Object(patch)) => {
            for (key, value) in patch {
                match target.get_mut(&key) {
                    Some(existing) => deep_merge(existing, value),
                    None => {
                        target.insert(key, value);
                    }
                }
            }
        }
        (target, patch) => *target = patch,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_deep_merge_keeps_siblings() {
        let mut doc = json!({"temp_high": 100, "nested": {"a": 1, "b": 2}});
        deep_merge(&mut doc, json!({"ph_low": 200, "nested": {"b": 3}}));
        assert_eq!(
            doc,
            json!({"temp_high": 100, "ph_low": 200, "nested": {"a": 1, "b": 3}})
        );
    }

    #[test]
    fn test_deep_merge_replaces_scalars() {
        let mut doc = json!({"a": {"x": 1}});
        deep_merge(&mut doc, json!({"a": 5}));
        assert_eq!(doc, json!({"a": 5}));

        let mut scalar = json!(1);
        deep_merge(&mut scalar, json!({"a": 1}));
        assert_eq!(scalar, json!({"a": 1}));
    }
}
