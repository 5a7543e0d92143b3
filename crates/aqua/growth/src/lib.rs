//! # Aqua Growth - Survival, Growth and Forecast Models
//!
//! Pure numeric models that feed both the forecast collaborators read and
//! the rule evaluators in `aqua-insights`.
//!
//! ## Key Components
//!
//! - [`survival`]: reduces mortality entries to a survival percentage and an
//!   estimated-alive count, and gates new entries (`can_record_now`)
//! - [`GrowthModel`]: piecewise weight-to-rate table with rebase-aware
//!   forward simulation and day-granular days-to-target
//! - [`ModulatorBands`]: environment-derived multipliers that turn the
//!   baseline forecast into a responsive live forecast
//!
//! ## Rebase Contract
//!
//! A forecast value at period `i` depends only on actual measurements at
//! periods before `i`. Recording a new measurement therefore never rewrites
//! what was predicted for its own period or earlier ones, and always
//! re-simulates everything after it.
//!
//! ## Example
//!
//! ```rust
//! use aqua_growth::{GrowthModel, DaysToTarget};
//!
//! let model = GrowthModel::canonical(15);
//! let series = model.forward_forecast(&[], 5.0, None, 2);
//! assert_eq!(series[0].abw_grams, 5.0);
//! assert!(matches!(model.days_to_target(Some(20.0), Some(10.0)), DaysToTarget::Days(0)));
//! ```

pub mod config;
pub mod error;
pub mod model;
pub mod modulator;
pub mod survival;

pub use config::GrowthConfig;
pub use error::{GrowthError, Result};
pub use model::{
    actuals_from_measurements, ActualPoint, DaysToTarget, ForecastPoint, GrowthModel,
    GrowthStage, MAX_SIMULATION_PERIODS,
};
pub use modulator::{
    live_forecast, survival_forecast, FactorBand, ModulatorBands, NEUTRAL_FACTOR,
};
pub use survival::{
    can_record_now, compute_survival, cumulative_mortality, validate_correction,
    validate_rate, SurvivalState,
};
