//! # Aqua Store - Storage Abstractions for Pond Monitoring
//!
//! The core never talks to a concrete database. It goes through:
//!
//! - [`DocumentStore`]: generic keyed documents with get, set, deep merge,
//!   per-document atomic transactions and a change feed. Findings, snoozes,
//!   per-signal state, growth setups and daily aggregate buckets all live
//!   here. Writes are last-write-wins per document; nothing spans documents.
//! - [`EntryLog`]: append-only per-pond logs for mortality, growth and
//!   feeding entries, with an atomic checked append for admission control.
//! - [`PondDirectory`] / [`PondResolver`]: the pond aggregate root and the
//!   mapping from viewer aliases to canonical ids.
//!
//! In-memory implementations back tests and the daemon; any document store
//! with upsert semantics satisfies the same contract.

pub mod aggregate;
pub mod document;
pub mod error;
pub mod log;
pub mod memory;
pub mod pond;

pub use aggregate::{daily_collection, list_daily, record_daily};
pub use document::{
    get_typed, list_typed, set_merge_typed, set_typed, ChangeKind, Document, DocumentChange,
    DocumentStore, UpdateFn,
};
pub use error::{Result, StoreError};
pub use log::{CheckFn, EntryLog, InMemoryEntryLog, LogEntry};
pub use memory::InMemoryDocumentStore;
pub use pond::{InMemoryPondDirectory, PassthroughResolver, PondDirectory, PondResolver};
