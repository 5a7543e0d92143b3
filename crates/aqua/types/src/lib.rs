//! Aqua Types - Core types for pond monitoring
//!
//! The aqua crates monitor aquaculture ponds: periodic sensor readings and
//! manually logged events (feeding, mortality, growth measurements) become a
//! biomass/harvest forecast and a live set of findings with a managed
//! lifecycle.
//!
//! ## Architectural Boundaries
//!
//! - **aqua-growth** owns: survival aggregation, growth simulation, live forecast modulation
//! - **aqua-insights** owns: rule evaluation, finding lifecycle, snooze overlay
//! - **aqua-store** owns: persisted documents and append-only logs
//! - **aqua-monitor** owns: the facade collaborators call into, scheduling
//!
//! Every entity is keyed by the pond's canonical shared id ([`PondId`]),
//! never by a per-viewer alias.

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]

pub mod band;
pub mod finding;
pub mod ids;
pub mod logs;
pub mod pond;
pub mod reading;
pub mod snooze;
pub mod validation;

pub use band::Band;
pub use finding::{
    Evidence, Finding, FindingDraft, FindingKey, FindingStatus, ParseFindingKeyError, Severity,
};
pub use ids::{EntryId, PondId, UserId};
pub use logs::{FeedingEvent, GrowthMeasurement, GrowthSetup, MortalityEntry};
pub use pond::{Pond, DEFAULT_CADENCE_DAYS};
pub use reading::{DailyAggregate, LiveReading, Signal, SignalLevel, SignalState};
pub use snooze::SnoozeEntry;
pub use validation::ValidationError;
