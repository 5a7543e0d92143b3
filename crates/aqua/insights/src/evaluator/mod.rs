//! Rule evaluators.
//!
//! Each evaluator is a pure function of its inputs. It never touches the
//! store; it returns an [`Evaluation`] describing which findings to upsert
//! and which keys to resolve, which the lifecycle engine then applies.

mod feeding;
mod growth;
mod heartbeat;
mod mortality;
mod water;

pub use feeding::FeedingEvaluator;
pub use growth::GrowthEvaluator;
pub use heartbeat::HeartbeatEvaluator;
pub use mortality::MortalityEvaluator;
pub use water::WaterEvaluator;

use aqua_types::{FindingDraft, FindingKey, SignalState};

/// Outcome of one evaluator call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Evaluation {
    /// Findings to activate (no-op for keys already active).
    pub upserts: Vec<FindingDraft>,

    /// Keys to resolve. Applied before the upserts.
    pub resolves: Vec<FindingKey>,

    /// Last observed level to persist for transition detection.
    pub signal_state: Option<SignalState>,
}

impl Evaluation {
    /// Nothing to do.
    pub fn none() -> Self {
        Self::default()
    }

    pub fn upsert(mut self, draft: FindingDraft) -> Self {
        self.upserts.push(draft);
        self
    }

    pub fn resolve(mut self, key: FindingKey) -> Self {
        self.resolves.push(key);
        self
    }

    pub fn with_state(mut self, state: SignalState) -> Self {
        self.signal_state = Some(state);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.upserts.is_empty() && self.resolves.is_empty() && self.signal_state.is_none()
    }

    /// Keys this evaluation activates.
    pub fn upserted_keys(&self) -> Vec<FindingKey> {
        self.upserts.iter().map(|d| d.key).collect()
    }
}
