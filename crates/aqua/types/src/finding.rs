//! Findings: detected pond conditions worth surfacing to a user.
//!
//! A finding's identity is its [`FindingKey`] scoped to a pond. The pair is
//! the unit of idempotent upsert in the insight store.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{PondId, Signal};

/// Stable identity of a signal and direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum FindingKey {
    /// Signal below its optimal band (`temp_low`)
    Low(Signal),
    /// Signal above its optimal band (`temp_high`)
    High(Signal),
    /// Short-lived notice that a signal returned to band (`temp_ok`)
    Recovered(Signal),
    MortalitySpike,
    GrowthBehind,
    FeedUnder,
    FeedOver,
    DeviceOffline,
}

impl FindingKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            FindingKey::Low(Signal::Temperature) => "temp_low",
            FindingKey::Low(Signal::Ph) => "ph_low",
            FindingKey::Low(Signal::DissolvedOxygen) => "do_low",
            FindingKey::High(Signal::Temperature) => "temp_high",
            FindingKey::High(Signal::Ph) => "ph_high",
            FindingKey::High(Signal::DissolvedOxygen) => "do_high",
            FindingKey::Recovered(Signal::Temperature) => "temp_ok",
            FindingKey::Recovered(Signal::Ph) => "ph_ok",
            FindingKey::Recovered(Signal::DissolvedOxygen) => "do_ok",
            FindingKey::MortalitySpike => "mortality_spike",
            FindingKey::GrowthBehind => "growth_behind",
            FindingKey::FeedUnder => "feed_under",
            FindingKey::FeedOver => "feed_over",
            FindingKey::DeviceOffline => "device_offline",
        }
    }

    /// Every key the engine can produce.
    pub fn all() -> Vec<FindingKey> {
        let mut keys = Vec::with_capacity(14);
        for signal in Signal::ALL {
            keys.push(FindingKey::Low(signal));
            keys.push(FindingKey::High(signal));
            keys.push(FindingKey::Recovered(signal));
        }
        keys.extend([
            FindingKey::MortalitySpike,
            FindingKey::GrowthBehind,
            FindingKey::FeedUnder,
            FindingKey::FeedOver,
            FindingKey::DeviceOffline,
        ]);
        keys
    }

    /// The key that must be cleared when this one activates.
    pub fn opposite(&self) -> Option<FindingKey> {
        match self {
            FindingKey::Low(signal) => Some(FindingKey::High(*signal)),
            FindingKey::High(signal) => Some(FindingKey::Low(*signal)),
            FindingKey::FeedUnder => Some(FindingKey::FeedOver),
            FindingKey::FeedOver => Some(FindingKey::FeedUnder),
            _ => None,
        }
    }

    /// Water-chemistry signal this key belongs to, if any.
    pub fn signal(&self) -> Option<Signal> {
        match self {
            FindingKey::Low(s) | FindingKey::High(s) | FindingKey::Recovered(s) => Some(*s),
            _ => None,
        }
    }

    /// Whether the key is derived from the live reading feed.
    pub fn is_live_reading(&self) -> bool {
        self.signal().is_some()
    }
}

impl fmt::Display for FindingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a string is not a known finding key.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown finding key: {0}")]
pub struct ParseFindingKeyError(pub String);

impl FromStr for FindingKey {
    type Err = ParseFindingKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FindingKey::all()
            .into_iter()
            .find(|key| key.as_str() == s)
            .ok_or_else(|| ParseFindingKeyError(s.to_string()))
    }
}

impl From<FindingKey> for String {
    fn from(key: FindingKey) -> Self {
        key.as_str().to_string()
    }
}

impl TryFrom<String> for FindingKey {
    type Error = ParseFindingKeyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Finding severity, ordered from least to most urgent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Danger,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Info => write!(f, "info"),
            Severity::Warning => write!(f, "warning"),
            Severity::Danger => write!(f, "danger"),
            Severity::Error => write!(f, "error"),
        }
    }
}

/// Stored lifecycle state of a finding.
///
/// The engine itself only writes `Active` and `Resolved`; per-user snoozes
/// live in a separate overlay. `Snoozed` is accepted from other writers of
/// the shared store and is treated as not visible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FindingStatus {
    Active,
    Snoozed,
    Resolved,
}

impl fmt::Display for FindingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FindingStatus::Active => write!(f, "active"),
            FindingStatus::Snoozed => write!(f, "snoozed"),
            FindingStatus::Resolved => write!(f, "resolved"),
        }
    }
}

/// Strongly-typed evidence, one shape per family of keys.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Evidence {
    WaterQuality {
        signal: Signal,
        value: f64,
        band_min: f64,
        band_max: f64,
    },
    Recovered {
        signal: Signal,
        value: f64,
    },
    MortalitySpike {
        period_date: NaiveDate,
        rate_percent: f64,
        /// Mean rate over the trailing window, when any entries fall in it
        baseline_avg_percent: Option<f64>,
        window_days: u32,
    },
    GrowthShortfall {
        period_index: u32,
        predicted_abw_grams: f64,
        actual_abw_grams: f64,
        gap_percent: f64,
    },
    FeedingDeviation {
        given_kg: f64,
        suggested_kg: f64,
        ratio: f64,
    },
    DeviceOffline {
        last_heartbeat_at: Option<DateTime<Utc>>,
        grace_minutes: u32,
    },
}

/// What an evaluator proposes before the store materializes it.
#[derive(Debug, Clone, PartialEq)]
pub struct FindingDraft {
    pub key: FindingKey,
    pub severity: Severity,
    pub evidence: Evidence,
    pub suggested_action: String,
    /// Ephemeral findings resolve themselves this long after creation
    pub auto_resolve_after: Option<Duration>,
}

impl FindingDraft {
    pub fn new(
        key: FindingKey,
        severity: Severity,
        evidence: Evidence,
        suggested_action: impl Into<String>,
    ) -> Self {
        Self {
            key,
            severity,
            evidence,
            suggested_action: suggested_action.into(),
            auto_resolve_after: None,
        }
    }

    pub fn auto_resolve_after(mut self, after: Duration) -> Self {
        self.auto_resolve_after = Some(after);
        self
    }
}

/// A materialized finding document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    pub pond_id: PondId,
    pub key: FindingKey,
    pub severity: Severity,
    pub status: FindingStatus,
    pub evidence: Evidence,
    pub suggested_action: String,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_resolve_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<DateTime<Utc>>,
}

impl Finding {
    /// Materialize a draft as a freshly active finding.
    pub fn activate(pond_id: PondId, draft: FindingDraft, now: DateTime<Utc>) -> Self {
        Self {
            pond_id,
            key: draft.key,
            severity: draft.severity,
            status: FindingStatus::Active,
            evidence: draft.evidence,
            suggested_action: draft.suggested_action,
            created_at: now,
            auto_resolve_at: draft.auto_resolve_after.map(|after| now + after),
            resolved_at: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == FindingStatus::Active
    }

    /// Whether the auto-resolve deadline has passed.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.auto_resolve_at.map(|at| at <= now).unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_string_roundtrip_for_all_keys() {
        for key in FindingKey::all() {
            let parsed: FindingKey = key.as_str().parse().unwrap();
            assert_eq!(parsed, key);
        }
        assert!("temp_sideways".parse::<FindingKey>().is_err());
    }

    #[test]
    fn test_key_serializes_as_string() {
        let json = serde_json::to_string(&FindingKey::High(Signal::Temperature)).unwrap();
        assert_eq!(json, "\"temp_high\"");
    }

    #[test]
    fn test_opposites() {
        assert_eq!(
            FindingKey::Low(Signal::Ph).opposite(),
            Some(FindingKey::High(Signal::Ph))
        );
        assert_eq!(FindingKey::FeedOver.opposite(), Some(FindingKey::FeedUnder));
        assert_eq!(FindingKey::MortalitySpike.opposite(), None);
    }

    #[test]
    fn test_activate_sets_deadline() {
        let now = Utc::now();
        let draft = FindingDraft::new(
            FindingKey::Recovered(Signal::Temperature),
            Severity::Info,
            Evidence::Recovered {
                signal: Signal::Temperature,
                value: 30.0,
            },
            "No action needed",
        )
        .auto_resolve_after(Duration::minutes(5));

        let finding = Finding::activate(PondId::new("p"), draft, now);
        assert!(finding.is_active());
        assert_eq!(finding.auto_resolve_at, Some(now + Duration::minutes(5)));
        assert!(!finding.is_expired(now));
        assert!(finding.is_expired(now + Duration::minutes(5)));
    }

    #[test]
    fn test_evidence_is_tagged() {
        let evidence = Evidence::FeedingDeviation {
            given_kg: 8.0,
            suggested_kg: 10.0,
            ratio: 0.8,
        };
        let value = serde_json::to_value(&evidence).unwrap();
        assert_eq!(value["kind"], "feeding_deviation");
    }

    #[test]
    fn test_severity_order() {
        assert!(Severity::Info < Severity::Warning);
        assert!(Severity::Warning < Severity::Danger);
        assert!(Severity::Danger < Severity::Error);
    }
}
