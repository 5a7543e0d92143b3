//! # Aqua Monitor - Pond Monitoring Core
//!
//! Facade that collaborators (UI, exports, notification senders) use to
//! read forecasts and findings and to log manual events.
//!
//! ## Key Components
//!
//! - [`PondMonitor`]: survival, forecast and days-to-target reads; validated
//!   mortality, growth and feeding writes that trigger their evaluators;
//!   live reading ingestion with daily aggregates and offline grace
//!   clearing; snoozes and explicit resolution
//! - [`Scheduler`]: cancellable interval loops for coarse re-evaluation and
//!   auto-resolve sweeps
//! - [`VisibleFindings`]: per-user stream of active, unsnoozed findings
//!
//! ## Example
//!
//! ```rust,ignore
//! let monitor = Arc::new(PondMonitor::in_memory(MonitorConfig::default(), Arc::new(SystemClock)));
//! monitor.register_pond(pond).await?;
//! monitor.ingest_reading(&pond_id, LiveReading::new(Utc::now()).with_temp(32.0)).await?;
//! let mut visible = monitor.subscribe_visible(&pond_id, &user_id).await?;
//! ```

#![deny(unsafe_code)]

pub mod config;
pub mod error;
pub mod events;
pub mod monitor;
pub mod scheduler;
pub mod subscription;

pub use config::{MonitorConfig, SchedulerConfig};
pub use error::{MonitorError, Result};
pub use events::MonitorEvent;
pub use monitor::{Forecast, MonitorBackends, PondMonitor, GROWTH_SETUP_COLLECTION, LATEST_READING_COLLECTION};
pub use scheduler::{spawn_interval, Scheduler};
pub use subscription::VisibleFindings;

pub use aqua_insights::{Clock, ManualClock, SystemClock};
