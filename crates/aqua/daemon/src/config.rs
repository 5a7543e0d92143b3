//! Configuration for aquad

use serde::{Deserialize, Serialize};

use aqua_monitor::MonitorConfig;

/// Main daemon configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Monitoring core configuration
    #[serde(default)]
    pub monitor: MonitorConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Report configuration
    #[serde(default)]
    pub report: ReportConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    pub level: String,

    /// Enable JSON format
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

/// What the end-of-replay report contains
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// User whose snoozes filter the reported findings
    pub user: String,

    /// Periods past the latest measurement to forecast
    pub horizon_periods: u32,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            user: "operator".to_string(),
            horizon_periods: 6,
        }
    }
}

impl DaemonConfig {
    /// Load configuration from defaults, an optional file, then `AQUA__`
    /// environment variables (`AQUA__MONITOR__OFFLINE_CLEAR_GRACE_SECS=10`).
    pub fn load(path: Option<&str>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();

        builder = builder.add_source(config::Config::try_from(&DaemonConfig::default())?);

        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("AQUA")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        builder.build()?.try_deserialize()
    }
}
