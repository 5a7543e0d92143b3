//! Finding lifecycle engine.
//!
//! Findings live in the document store, one document per pond and key.
//! The engine owns the only transitions the core performs:
//!
//! - `upsert`: activate a key unless it is already active. Re-detecting the
//!   same condition every tick is therefore a no-op and never rewrites
//!   `created_at`.
//! - `resolve`: mark a key resolved. Unknown keys are not an error.
//! - `sweep_expired`: resolve active findings whose `auto_resolve_at` passed.
//!
//! It also persists the last observed level per pond and signal, which the
//! water evaluator needs to detect recoveries.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use aqua_store::{get_typed, set_typed, DocumentStore};
use aqua_types::{Finding, FindingDraft, FindingKey, FindingStatus, PondId, Signal, SignalLevel, SignalState};

use crate::clock::Clock;
use crate::error::Result;
use crate::evaluator::Evaluation;

/// Collection holding a pond's findings, keyed by finding key.
pub fn findings_collection(pond_id: &PondId) -> String {
    format!("findings/{}", pond_id.as_str())
}

/// Collection holding a pond's last observed level per signal.
pub fn signal_state_collection(pond_id: &PondId) -> String {
    format!("signal_state/{}", pond_id.as_str())
}

/// Result of an upsert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UpsertOutcome {
    /// First time this key was seen for the pond.
    Created,
    /// The key existed as resolved and is active again.
    Reactivated,
    /// Already active; nothing written.
    AlreadyActive,
}

/// Result of a resolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResolveOutcome {
    Resolved,
    AlreadyResolved,
    NotPresent,
}

/// What applying an [`Evaluation`] changed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ApplyReport {
    pub activated: Vec<FindingKey>,
    pub resolved: Vec<FindingKey>,
}

impl ApplyReport {
    pub fn changed(&self) -> bool {
        !self.activated.is_empty() || !self.resolved.is_empty()
    }
}

/// Persisted finding lifecycle.
pub struct InsightStore {
    store: Arc<dyn DocumentStore>,
    clock: Arc<dyn Clock>,
}

impl InsightStore {
    pub fn new(store: Arc<dyn DocumentStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    pub async fn get(&self, pond_id: &PondId, key: FindingKey) -> Result<Option<Finding>> {
        Ok(get_typed(self.store.as_ref(), &findings_collection(pond_id), key.as_str()).await?)
    }

    /// Every stored finding for the pond, oldest `created_at` first.
    /// Documents that no longer decode are skipped with a warning.
    pub async fn list(&self, pond_id: &PondId) -> Result<Vec<Finding>> {
        let collection = findings_collection(pond_id);
        let mut findings = Vec::new();
        for doc in self.store.list(&collection).await? {
            match serde_json::from_value::<Finding>(doc.value) {
                Ok(finding) => findings.push(finding),
                Err(e) => warn!(collection = %collection, key = %doc.key, error = %e, "Skipping malformed finding"),
            }
        }
        findings.sort_by_key(|f| f.created_at);
        Ok(findings)
    }

    /// Active findings, oldest first.
    pub async fn active(&self, pond_id: &PondId) -> Result<Vec<Finding>> {
        Ok(self
            .list(pond_id)
            .await?
            .into_iter()
            .filter(Finding::is_active)
            .collect())
    }

    /// Activate `draft` unless its key is already active.
    #[instrument(skip(self, pond_id, draft), fields(pond_id = %pond_id, key = %draft.key))]
    pub async fn upsert(&self, pond_id: &PondId, draft: FindingDraft) -> Result<UpsertOutcome> {
        let existing = self.get(pond_id, draft.key).await?;
        let outcome = match &existing {
            Some(finding) if finding.is_active() => {
                debug!("Finding already active");
                return Ok(UpsertOutcome::AlreadyActive);
            }
            Some(_) => UpsertOutcome::Reactivated,
            None => UpsertOutcome::Created,
        };

        let key = draft.key;
        let finding = Finding::activate(pond_id.clone(), draft, self.clock.now());
        set_typed(self.store.as_ref(), &findings_collection(pond_id), key.as_str(), &finding).await?;
        info!(severity = %finding.severity, outcome = ?outcome, "Finding activated");
        Ok(outcome)
    }

    /// Mark `key` resolved.
    #[instrument(skip(self, pond_id, key), fields(pond_id = %pond_id, key = %key))]
    pub async fn resolve(&self, pond_id: &PondId, key: FindingKey) -> Result<ResolveOutcome> {
        let Some(mut finding) = self.get(pond_id, key).await? else {
            return Ok(ResolveOutcome::NotPresent);
        };
        if finding.status == FindingStatus::Resolved {
            return Ok(ResolveOutcome::AlreadyResolved);
        }

        finding.status = FindingStatus::Resolved;
        finding.resolved_at = Some(self.clock.now());
        set_typed(self.store.as_ref(), &findings_collection(pond_id), key.as_str(), &finding).await?;
        info!("Finding resolved");
        Ok(ResolveOutcome::Resolved)
    }

    /// Resolve every active finding matching `predicate`.
    pub async fn resolve_where(
        &self,
        pond_id: &PondId,
        predicate: impl Fn(&Finding) -> bool,
    ) -> Result<Vec<FindingKey>> {
        let mut resolved = Vec::new();
        for finding in self.active(pond_id).await? {
            if predicate(&finding) && self.resolve(pond_id, finding.key).await? == ResolveOutcome::Resolved {
                resolved.push(finding.key);
            }
        }
        Ok(resolved)
    }

    /// Resolve active findings whose auto-resolve deadline has passed.
    pub async fn sweep_expired(&self, pond_id: &PondId) -> Result<Vec<FindingKey>> {
        let now = self.clock.now();
        let swept = self.resolve_where(pond_id, |f| f.is_expired(now)).await?;
        if !swept.is_empty() {
            debug!(pond_id = %pond_id, count = swept.len(), "Expired findings swept");
        }
        Ok(swept)
    }

    /// Apply an evaluation: resolves first, then upserts, then the signal
    /// state. Resolving first keeps opposite keys from being active together.
    pub async fn apply(&self, pond_id: &PondId, evaluation: Evaluation) -> Result<ApplyReport> {
        let mut report = ApplyReport::default();

        for key in evaluation.resolves {
            if self.resolve(pond_id, key).await? == ResolveOutcome::Resolved {
                report.resolved.push(key);
            }
        }
        for draft in evaluation.upserts {
            let key = draft.key;
            if self.upsert(pond_id, draft).await? != UpsertOutcome::AlreadyActive {
                report.activated.push(key);
            }
        }
        if let Some(state) = evaluation.signal_state {
            self.set_signal_state(pond_id, &state).await?;
        }

        Ok(report)
    }

    pub async fn signal_level(&self, pond_id: &PondId, signal: Signal) -> Result<Option<SignalLevel>> {
        let state: Option<SignalState> = get_typed(
            self.store.as_ref(),
            &signal_state_collection(pond_id),
            signal.key_prefix(),
        )
        .await?;
        Ok(state.map(|s| s.level))
    }

    pub async fn set_signal_state(&self, pond_id: &PondId, state: &SignalState) -> Result<()> {
        set_typed(
            self.store.as_ref(),
            &signal_state_collection(pond_id),
            state.signal.key_prefix(),
            state,
        )
        .await?;
        Ok(())
    }

    /// Forget last observed levels so the next reading starts fresh.
    pub async fn clear_signal_states(&self, pond_id: &PondId) -> Result<()> {
        let collection = signal_state_collection(pond_id);
        for signal in Signal::ALL {
            self.store.delete(&collection, signal.key_prefix()).await?;
        }
        Ok(())
    }
}
