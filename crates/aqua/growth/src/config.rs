//! Growth model configuration.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::model::{canonical_stages, GrowthModel, GrowthStage};
use crate::modulator::ModulatorBands;

/// Configuration for growth simulation and forecast modulation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GrowthConfig {
    /// Weekly weight-to-rate table.
    #[serde(default = "canonical_stages")]
    pub stages: Vec<GrowthStage>,

    /// Periods simulated past the latest actual when none are requested.
    #[serde(default = "default_horizon_periods")]
    pub default_horizon_periods: u32,

    /// Bands for the live forecast multiplier.
    #[serde(default)]
    pub modulator: ModulatorBands,
}

impl Default for GrowthConfig {
    fn default() -> Self {
        Self {
            stages: canonical_stages(),
            default_horizon_periods: default_horizon_periods(),
            modulator: ModulatorBands::default(),
        }
    }
}

impl GrowthConfig {
    /// Build a validated model at the given cadence.
    pub fn model(&self, cadence_days: u32) -> Result<GrowthModel> {
        GrowthModel::new(self.stages.clone(), cadence_days)
    }
}

fn default_horizon_periods() -> u32 {
    8
}
