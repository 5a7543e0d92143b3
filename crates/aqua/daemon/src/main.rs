//! Aqua Daemon - pond monitoring replay
//!
//! Loads ponds from a fixture, replays a recorded feed of sensor readings
//! and manual log events through the monitoring core, and prints each
//! pond's survival, forecast and visible findings as JSON.

use std::fs::File;
use std::io::{self, BufReader};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use aqua_daemon::{collect_all, DaemonConfig, Replayer};
use aqua_monitor::{ManualClock, PondMonitor};
use aqua_types::{Pond, UserId};

/// Aqua Daemon CLI
#[derive(Parser)]
#[command(name = "aquad")]
#[command(about = "Aqua Daemon - replay a pond feed through the monitoring core", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "AQUA_CONFIG")]
    config: Option<String>,

    /// JSON array of ponds to register
    #[arg(short, long, env = "AQUA_PONDS")]
    ponds: PathBuf,

    /// JSON-lines event feed; `-` reads standard input
    #[arg(short, long, env = "AQUA_FEED")]
    feed: Option<PathBuf>,

    /// User whose snoozes filter the report
    #[arg(short, long, env = "AQUA_USER")]
    user: Option<String>,

    /// Log level
    #[arg(long, env = "AQUA_LOG_LEVEL")]
    log_level: Option<String>,

    /// Enable JSON logging
    #[arg(long, env = "AQUA_LOG_JSON")]
    json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let mut config = DaemonConfig::load(cli.config.as_deref()).context("loading configuration")?;

    // Override with CLI args
    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }
    if cli.json {
        config.logging.json = true;
    }
    if let Some(user) = cli.user {
        config.report.user = user;
    }

    // Initialize tracing; logs go to stderr so stdout carries only the report
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| config.logging.level.clone().into());

    if config.logging.json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
            .init();
    }

    let ponds: Vec<Pond> = serde_json::from_reader(BufReader::new(
        File::open(&cli.ponds).with_context(|| format!("opening {}", cli.ponds.display()))?,
    ))
    .with_context(|| format!("parsing {}", cli.ponds.display()))?;

    let start = ponds
        .iter()
        .map(|p| p.stocked_at)
        .min()
        .unwrap_or_else(chrono::Utc::now);
    let clock = Arc::new(ManualClock::new(start));
    let monitor = Arc::new(PondMonitor::in_memory(config.monitor.clone(), clock.clone()));

    for pond in ponds {
        monitor.register_pond(pond).await?;
    }

    let mut replayer = Replayer::new(monitor.clone(), clock, &config.monitor.scheduler);
    match cli.feed.as_deref() {
        Some(path) if path.as_os_str() == "-" => replayer.run(io::stdin().lock()).await?,
        Some(path) => {
            let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
            replayer.run(BufReader::new(file)).await?;
        }
        None => warn!("No feed given; reporting registered ponds only"),
    }

    // Let any offline clear still inside its grace delay run to completion
    let ponds = monitor.ponds().await?;
    if ponds.iter().any(|p| monitor.has_pending_clear(&p.id)) {
        tokio::time::sleep(config.monitor.offline_clear_grace()).await;
    }

    let summary = replayer.finish().await;
    info!(
        events = summary.events,
        rejected = summary.rejected,
        malformed = summary.malformed,
        coarse_ticks = summary.coarse_ticks,
        sweep_ticks = summary.sweep_ticks,
        "Replay finished"
    );

    let user = UserId::new(config.report.user.clone());
    let reports = collect_all(&monitor, &user, config.report.horizon_periods).await?;
    println!("{}", serde_json::to_string_pretty(&reports)?);
    Ok(())
}
