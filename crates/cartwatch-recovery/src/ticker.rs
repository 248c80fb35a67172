//! Fixed-interval background task with graceful stop.

use std::future::Future;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Runs a closure on a fixed interval until [`stop`](Self::stop) is called.
///
/// Each run completes before the next tick is observed, and a slow run
/// delays the following tick rather than causing a burst. The first run
/// happens immediately.
pub struct PeriodicTask {
    name: &'static str,
    shutdown_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl PeriodicTask {
    /// Spawns the task on the current tokio runtime.
    #[must_use]
    pub fn start<F, Fut>(name: &'static str, period: Duration, mut tick: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    biased;
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            break;
                        }
                    }
                    _ = interval.tick() => tick().await,
                }
            }
            tracing::debug!(task = name, "periodic task exited");
        });

        tracing::info!(task = name, period_secs = period.as_secs(), "periodic task started");
        Self {
            name,
            shutdown_tx,
            handle,
        }
    }

    /// Signals the task and waits for it to exit. A run that is in flight
    /// finishes first.
    pub async fn stop(self) {
        let _ = self.shutdown_tx.send(true);
        if let Err(e) = self.handle.await {
            tracing::error!(task = self.name, error = %e, "periodic task panicked");
        } else {
            tracing::info!(task = self.name, "periodic task stopped");
        }
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn runs_immediately_then_on_each_period() {
        let runs = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&runs);
        let task = PeriodicTask::start("test", Duration::from_secs(60), move || {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 3);

        task.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn stop_waits_for_in_flight_run() {
        let finished = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&finished);
        let task = PeriodicTask::start("slow", Duration::from_secs(60), move || {
            let counter = Arc::clone(&counter);
            async move {
                tokio::time::sleep(Duration::from_secs(10)).await;
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });

        // Let the first run begin, then stop mid-run.
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(task.is_running());
        task.stop().await;

        assert_eq!(finished.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn no_runs_after_stop() {
        let runs = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&runs);
        let task = PeriodicTask::start("test", Duration::from_secs(5), move || {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });

        tokio::time::sleep(Duration::from_secs(1)).await;
        task.stop().await;
        let after_stop = runs.load(Ordering::SeqCst);

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(runs.load(Ordering::SeqCst), after_stop);
    }
}
