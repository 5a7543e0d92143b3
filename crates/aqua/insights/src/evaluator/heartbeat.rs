//! Device heartbeat evaluator.

use chrono::{DateTime, Utc};

use aqua_types::{Evidence, FindingDraft, FindingKey, Severity};

use super::Evaluation;

/// Raises `device_offline` once the last heartbeat is older than the grace
/// window and clears it on any fresh heartbeat.
#[derive(Debug, Clone)]
pub struct HeartbeatEvaluator {
    grace: chrono::Duration,
}

impl HeartbeatEvaluator {
    pub fn new(grace: chrono::Duration) -> Self {
        Self { grace }
    }

    /// A pond that has never reported is not considered offline.
    pub fn evaluate(&self, last_heartbeat: Option<DateTime<Utc>>, now: DateTime<Utc>) -> Evaluation {
        let Some(last) = last_heartbeat else {
            return Evaluation::none();
        };
        if now - last <= self.grace {
            return Evaluation::none().resolve(FindingKey::DeviceOffline);
        }

        Evaluation::none().upsert(FindingDraft::new(
            FindingKey::DeviceOffline,
            Severity::Error,
            Evidence::DeviceOffline {
                last_heartbeat_at: Some(last),
                grace_minutes: self.grace.num_minutes().max(0) as u32,
            },
            "Sensor has stopped reporting. Check power and connectivity.",
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_offline_after_grace() {
        let evaluator = HeartbeatEvaluator::new(Duration::minutes(20));
        let now = Utc::now();

        let fresh = evaluator.evaluate(Some(now - Duration::minutes(20)), now);
        assert_eq!(fresh.resolves, vec![FindingKey::DeviceOffline]);

        let stale = evaluator.evaluate(Some(now - Duration::minutes(21)), now);
        assert_eq!(stale.upserted_keys(), vec![FindingKey::DeviceOffline]);
        assert_eq!(stale.upserts[0].severity, Severity::Error);
    }

    #[test]
    fn test_never_seen() {
        let evaluator = HeartbeatEvaluator::new(Duration::minutes(20));
        assert!(evaluator.evaluate(None, Utc::now()).is_empty());
    }
}
