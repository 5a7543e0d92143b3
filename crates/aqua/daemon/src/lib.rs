//! Aqua daemon library
//!
//! Components behind the `aquad` binary:
//! - Layered configuration
//! - Replay of a recorded event feed on a manual clock
//! - Per-pond report rendering

pub mod config;
pub mod replay;
pub mod report;

pub use config::DaemonConfig;
pub use replay::{ReplayEvent, ReplaySummary, Replayer};
pub use report::{collect_all, PondReport};
