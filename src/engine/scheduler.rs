//! Fixed-interval tick driver with deterministic shutdown.

use std::future::Future;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Handle to a running scheduler loop.
#[derive(Debug)]
pub struct SchedulerHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Signal shutdown and wait for the in-progress tick, if any, to finish.
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.task.await {
            warn!(error = %e, "Scheduler task ended abnormally");
        }
    }

    /// Whether the loop has exited.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

/// Shortest accepted tick period.
pub const MIN_PERIOD: Duration = Duration::from_millis(1);

/// Run `tick` every `period` until stopped. Ticks never overlap: a slow tick
/// delays the next one and missed periods are skipped, not replayed.
pub fn spawn<F, Fut>(period: Duration, mut tick: F) -> SchedulerHandle
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let period = period.max(MIN_PERIOD);
    let (shutdown, mut shutdown_rx) = watch::channel(false);

    let task = tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // First tick completes immediately; the first scan waits one period.
        interval.tick().await;
        info!(period_ms = period.as_millis() as u64, "Scheduler started");

        loop {
            tokio::select! {
                biased;
                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        break;
                    }
                }
                _ = interval.tick() => {
                    tick().await;
                }
            }
        }

        debug!("Scheduler stopped");
    });

    SchedulerHandle { shutdown, task }
}
