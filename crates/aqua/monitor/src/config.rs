//! Monitor configuration.

use serde::{Deserialize, Serialize};

use aqua_growth::GrowthConfig;
use aqua_insights::InsightConfig;

/// Top-level configuration of the monitoring core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Growth model and forecast modulation.
    pub growth: GrowthConfig,

    /// Evaluator bands and thresholds.
    pub insights: InsightConfig,

    /// Background task intervals.
    pub scheduler: SchedulerConfig,

    /// Delay between a device going offline and its live-reading findings
    /// being cleared. Coming back online within it cancels the clear.
    pub offline_clear_grace_secs: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            growth: GrowthConfig::default(),
            insights: InsightConfig::default(),
            scheduler: SchedulerConfig::default(),
            offline_clear_grace_secs: 5,
        }
    }
}

impl MonitorConfig {
    pub fn offline_clear_grace(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.offline_clear_grace_secs)
    }
}

/// Background task intervals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Mortality, growth and heartbeat re-evaluation.
    pub coarse_interval_secs: u64,

    /// Auto-resolve sweep and snooze pruning.
    pub sweep_interval_secs: u64,

    /// How often a visible-findings stream re-checks snooze expiry.
    pub visible_recheck_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            coarse_interval_secs: 300,
            sweep_interval_secs: 30,
            visible_recheck_secs: 30,
        }
    }
}
