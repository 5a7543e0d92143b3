//! Per-user timed suppression of a finding.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{FindingKey, UserId};

/// A single snooze. Purely an overlay: it never changes the finding itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnoozeEntry {
    pub user_id: UserId,
    pub finding_key: FindingKey,
    /// Epoch milliseconds the snooze lasts until
    pub until: i64,
}

impl SnoozeEntry {
    pub fn new(user_id: UserId, finding_key: FindingKey, until: DateTime<Utc>) -> Self {
        Self {
            user_id,
            finding_key,
            until: until.timestamp_millis(),
        }
    }

    /// Authoritative check, independent of whether expired entries were pruned.
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.until > now.timestamp_millis()
    }
}
