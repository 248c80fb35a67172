//! Cron-driven background jobs.
//!
//! Initialises a [`JobScheduler`] at startup and registers the lifecycle
//! sweep. The scan loop runs separately on a fixed interval.

use std::sync::Arc;

use cartwatch_recovery::Sweeper;
use tokio_cron_scheduler::{Job, JobScheduler, JobSchedulerError};

/// Builds and starts the scheduler with the sweep job registered.
///
/// The returned handle must be kept alive for the lifetime of the process;
/// dropping it shuts down all jobs.
///
/// # Errors
///
/// Returns [`JobSchedulerError`] if the scheduler cannot be initialised,
/// `sweep_cron` does not parse, or the scheduler fails to start.
pub async fn build_scheduler(
    sweeper: Sweeper,
    sweep_cron: &str,
) -> Result<JobScheduler, JobSchedulerError> {
    let scheduler = JobScheduler::new().await?;

    register_sweep_job(&scheduler, sweeper, sweep_cron).await?;

    scheduler.start().await?;
    Ok(scheduler)
}

/// Registers the abandoned-cart sweep on `cron` (default daily at 03:00 UTC).
async fn register_sweep_job(
    scheduler: &JobScheduler,
    sweeper: Sweeper,
    cron: &str,
) -> Result<(), JobSchedulerError> {
    let sweeper = Arc::new(sweeper);

    let job = Job::new_async(cron, move |_uuid, _lock| {
        let sweeper = Arc::clone(&sweeper);

        Box::pin(async move {
            tracing::info!("scheduler: starting abandoned-cart sweep");
            match sweeper.run(chrono::Utc::now()).await {
                Ok(report) => tracing::info!(
                    expired = report.expired,
                    deleted = report.deleted,
                    "scheduler: abandoned-cart sweep complete"
                ),
                Err(e) => tracing::error!(error = %e, "scheduler: abandoned-cart sweep failed"),
            }
        })
    })?;

    scheduler.add(job).await?;
    tracing::info!(cron, "scheduler: sweep job registered");
    Ok(())
}
