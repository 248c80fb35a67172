//! One scan cycle: find stale carts, drop the ones already recorded, and hand
//! the rest to the [`Recorder`].

use std::sync::Arc;

use cartwatch_core::{CartLineAggregate, ReflagPolicy};
use chrono::{DateTime, Duration, Utc};

use crate::recorder::{RecordOutcome, Recorder};
use crate::store::CartStore;
use crate::{cutoff, RecoveryError};

/// Per-cycle counters, logged at the end of every scan.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ScanReport {
    pub found: usize,
    pub recorded: usize,
    pub promotions_issued: usize,
    pub already_recorded: usize,
    pub skipped_invalid: usize,
    pub failed: usize,
}

#[derive(Clone)]
pub struct CartScanner {
    store: Arc<dyn CartStore>,
    recorder: Recorder,
    abandon_threshold: Duration,
    reflag_policy: ReflagPolicy,
}

impl CartScanner {
    #[must_use]
    pub fn new(
        store: Arc<dyn CartStore>,
        recorder: Recorder,
        abandon_threshold: Duration,
        reflag_policy: ReflagPolicy,
    ) -> Self {
        Self {
            store,
            recorder,
            abandon_threshold,
            reflag_policy,
        }
    }

    /// Runs a single scan at `now`.
    ///
    /// Per-aggregate failures are logged and counted; the cycle carries on.
    ///
    /// # Errors
    ///
    /// Returns [`RecoveryError::Store`] when the stale-cart query itself
    /// fails, or [`RecoveryError::WindowOutOfRange`] if the threshold reaches
    /// past the earliest representable time. Nothing was recorded in either
    /// case.
    pub async fn run_cycle(&self, now: DateTime<Utc>) -> Result<ScanReport, RecoveryError> {
        let stale_before = cutoff(now, self.abandon_threshold, "abandon threshold")?;
        let aggregates = self.store.find_stale_cart_aggregates(stale_before).await?;

        let mut report = ScanReport {
            found: aggregates.len(),
            ..ScanReport::default()
        };

        for entry in aggregates {
            let aggregate = match entry.map_err(RecoveryError::from).and_then(|a| {
                a.validate()?;
                Ok(a)
            }) {
                Ok(aggregate) => aggregate,
                Err(e) => {
                    report.skipped_invalid += 1;
                    tracing::warn!(error = %e, "scanner: skipping undecodable cart aggregate");
                    continue;
                }
            };

            match self.is_already_recorded(&aggregate).await {
                Ok(true) => {
                    report.already_recorded += 1;
                    continue;
                }
                Ok(false) => {}
                Err(e) => {
                    report.failed += 1;
                    tracing::warn!(identity = %aggregate.identity, error = %e, "scanner: dedup lookup failed");
                    continue;
                }
            }

            match self.recorder.record(&aggregate, now).await {
                Ok(RecordOutcome::Recorded {
                    promotion_code_id, ..
                }) => {
                    report.recorded += 1;
                    if promotion_code_id.is_some() {
                        report.promotions_issued += 1;
                    }
                }
                Ok(RecordOutcome::AlreadyRecorded) => report.already_recorded += 1,
                Err(e) => {
                    report.failed += 1;
                    tracing::error!(
                        identity = %aggregate.identity,
                        error = %e,
                        "scanner: failed to record abandoned cart"
                    );
                }
            }
        }

        Ok(report)
    }

    /// Like [`run_cycle`](Self::run_cycle) but never fails: errors end in a
    /// log line. Used by the periodic task.
    pub async fn run_cycle_logged(&self) {
        let started = Utc::now();
        match self.run_cycle(started).await {
            Ok(report) => tracing::info!(
                found = report.found,
                recorded = report.recorded,
                promotions_issued = report.promotions_issued,
                already_recorded = report.already_recorded,
                skipped_invalid = report.skipped_invalid,
                failed = report.failed,
                elapsed_ms = (Utc::now() - started).num_milliseconds(),
                "scanner: cycle complete"
            ),
            Err(e) => tracing::error!(error = %e, "scanner: cycle aborted, retrying next tick"),
        }
    }

    async fn is_already_recorded(
        &self,
        aggregate: &CartLineAggregate,
    ) -> Result<bool, RecoveryError> {
        let identity = &aggregate.identity;
        match self.reflag_policy {
            ReflagPolicy::Never => Ok(self
                .store
                .find_abandoned_cart_by_identity(identity, false)
                .await?
                .is_some()),
            ReflagPolicy::AfterExpiry => {
                if self
                    .store
                    .find_abandoned_cart_by_identity(identity, true)
                    .await?
                    .is_some()
                {
                    return Ok(true);
                }
                // Only expired history: re-flag once the cart moved on.
                Ok(self
                    .store
                    .find_abandoned_cart_by_identity(identity, false)
                    .await?
                    .is_some_and(|latest| aggregate.last_modified <= latest.abandoned_at))
            }
        }
    }
}

#[cfg(test)]
#[path = "scanner_test.rs"]
mod tests;
