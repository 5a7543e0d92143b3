//! Background evaluation loops.
//!
//! Interval tasks run the coarse evaluators and the auto-resolve sweep.
//! Everything hangs off one cancellation token: cancelling it stops new
//! ticks from being issued, while a tick already running finishes its
//! writes.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use aqua_types::{LiveReading, PondId};

use crate::config::SchedulerConfig;
use crate::monitor::PondMonitor;

/// Drives the monitor's periodic work.
pub struct Scheduler {
    monitor: Arc<PondMonitor>,
    config: SchedulerConfig,
    cancel: CancellationToken,
}

impl Scheduler {
    pub fn new(monitor: Arc<PondMonitor>, config: SchedulerConfig) -> Self {
        Self::with_token(monitor, config, CancellationToken::new())
    }

    pub fn with_token(monitor: Arc<PondMonitor>, config: SchedulerConfig, cancel: CancellationToken) -> Self {
        Self {
            monitor,
            config,
            cancel,
        }
    }

    pub fn token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Spawn the coarse evaluation and sweep loops.
    pub fn start(&self) -> Vec<JoinHandle<()>> {
        info!(
            coarse_secs = self.config.coarse_interval_secs,
            sweep_secs = self.config.sweep_interval_secs,
            "Scheduler started"
        );

        let coarse = self.monitor.clone();
        let sweep = self.monitor.clone();
        vec![
            spawn_interval(
                "coarse-evaluation",
                Duration::from_secs(self.config.coarse_interval_secs.max(1)),
                self.cancel.child_token(),
                move || {
                    let monitor = coarse.clone();
                    async move { monitor.coarse_tick().await }
                },
            ),
            spawn_interval(
                "auto-resolve-sweep",
                Duration::from_secs(self.config.sweep_interval_secs.max(1)),
                self.cancel.child_token(),
                move || {
                    let monitor = sweep.clone();
                    async move { monitor.sweep_tick().await }
                },
            ),
        ]
    }

    /// Feed readings pushed on `readings` into the monitor until the channel
    /// closes or the scheduler stops.
    pub fn spawn_reading_pump(&self, mut readings: mpsc::Receiver<(PondId, LiveReading)>) -> JoinHandle<()> {
        let monitor = self.monitor.clone();
        let cancel = self.cancel.child_token();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    next = readings.recv() => {
                        let Some((pond_id, reading)) = next else {
                            break;
                        };
                        if let Err(e) = monitor.ingest_reading(&pond_id, reading).await {
                            warn!(pond_id = %pond_id, error = %e, "Reading rejected");
                        }
                    }
                }
            }
            info!("Reading pump stopped");
        })
    }

    /// Stop issuing ticks.
    pub fn stop(&self) {
        self.cancel.cancel();
        info!("Scheduler stopped");
    }
}

/// Run `task` every `period` until `cancel` fires. The first run happens
/// immediately.
pub fn spawn_interval<F, Fut>(name: &'static str, period: Duration, cancel: CancellationToken, mut task: F) -> JoinHandle<()>
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => task().await,
            }
        }
        info!(task = name, "Scheduled task stopped");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test(start_paused = true)]
    async fn test_interval_runs_until_cancelled() {
        let count = Arc::new(AtomicUsize::new(0));
        let cancel = CancellationToken::new();
        let counter = count.clone();
        let handle = spawn_interval("test", Duration::from_secs(10), cancel.clone(), move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });

        tokio::time::sleep(Duration::from_secs(25)).await;
        assert_eq!(count.load(Ordering::SeqCst), 3);

        cancel.cancel();
        handle.await.unwrap();
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(count.load(Ordering::SeqCst), 3);
    }
}
