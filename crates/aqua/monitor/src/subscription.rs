//! Live stream of a user's visible findings.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, watch};
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, warn};

use aqua_insights::{findings_collection, snooze_collection};
use aqua_types::{Finding, PondId, UserId};

use crate::error::Result;
use crate::monitor::PondMonitor;

/// Visible findings (active, not snoozed by this user) for one pond.
///
/// The value is recomputed whenever the pond's findings or snoozes change
/// and periodically so snoozes lapse on time. A failed refresh keeps the
/// last known state. Dropping the stream stops its background task.
pub struct VisibleFindings {
    rx: watch::Receiver<Vec<Finding>>,
    _guard: DropGuard,
}

impl VisibleFindings {
    /// Current value.
    pub fn current(&self) -> Vec<Finding> {
        self.rx.borrow().clone()
    }

    /// Wait for the next change. Returns `false` once the stream has ended.
    pub async fn changed(&mut self) -> bool {
        self.rx.changed().await.is_ok()
    }

    /// Underlying watch receiver.
    pub fn receiver(&self) -> watch::Receiver<Vec<Finding>> {
        self.rx.clone()
    }
}

impl PondMonitor {
    /// Subscribe to the visible findings of `pond_id` as seen by `user_id`.
    pub async fn subscribe_visible(self: &Arc<Self>, pond_id: &PondId, user_id: &UserId) -> Result<VisibleFindings> {
        let initial = self.visible_findings(pond_id, user_id).await?;
        let (tx, rx) = watch::channel(initial);
        let mut changes = self.document_store().subscribe();
        let cancel = CancellationToken::new();
        let recheck = Duration::from_secs(self.config().scheduler.visible_recheck_secs.max(1));

        let monitor = Arc::clone(self);
        let pond = pond_id.clone();
        let user = user_id.clone();
        let stop = cancel.clone();
        tokio::spawn(async move {
            let findings = findings_collection(&pond);
            let snoozes = snooze_collection(&pond);
            let mut ticker = tokio::time::interval(recheck);
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = stop.cancelled() => break,
                    _ = tx.closed() => break,
                    change = changes.recv() => match change {
                        Ok(change) if change.collection == findings || change.collection == snoozes => {}
                        Ok(_) => continue,
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            debug!(skipped, "Change feed lagged; refreshing");
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    },
                    _ = ticker.tick() => {}
                }

                match monitor.visible_findings(&pond, &user).await {
                    Ok(visible) => {
                        tx.send_if_modified(|current| {
                            if *current == visible {
                                false
                            } else {
                                *current = visible;
                                true
                            }
                        });
                    }
                    Err(e) => {
                        warn!(pond_id = %pond, user = %user, error = %e, "Visible findings refresh failed; keeping last known state");
                    }
                }
            }
            debug!(pond_id = %pond, user = %user, "Visible findings stream stopped");
        });

        Ok(VisibleFindings {
            rx,
            _guard: cancel.drop_guard(),
        })
    }
}
