//! Abandoned-cart detection and recovery.
//!
//! - [`CartScanner`] finds carts that went quiet and records each new one
//!   through the [`Recorder`].
//! - [`Recorder`] persists the record, issues a first-purchase promotion code
//!   when eligible, and snapshots the cart lines.
//! - [`Sweeper`] expires and later deletes old records.
//! - [`PeriodicTask`] drives the scanner on a fixed interval.

pub mod discount;
pub mod recorder;
pub mod scanner;
pub mod store;
pub mod sweeper;
pub mod ticker;

#[cfg(test)]
mod testing;

use std::sync::Arc;

use cartwatch_core::{AppConfig, CoreError};
use chrono::{DateTime, Duration, Utc};
use thiserror::Error;

pub use discount::{
    discount_provider_from_config, DisabledDiscountProvider, DiscountError, DiscountProvider,
    MockDiscountProvider, StripeDiscountProvider,
};
pub use recorder::{RecordOutcome, Recorder};
pub use scanner::{CartScanner, ScanReport};
pub use store::{CartStore, PgCartStore, StoreError};
pub use sweeper::{SweepReport, Sweeper};
pub use ticker::PeriodicTask;

#[derive(Debug, Error)]
pub enum RecoveryError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("discount provider error: {0}")]
    Discount(#[from] DiscountError),

    #[error("invalid cart aggregate: {0}")]
    Invalid(#[from] CoreError),

    #[error("{window} window is out of range")]
    WindowOutOfRange { window: &'static str },
}

/// Subtracts a configured window from `now`, failing instead of overflowing.
pub(crate) fn cutoff(
    now: DateTime<Utc>,
    window: Duration,
    name: &'static str,
) -> Result<DateTime<Utc>, RecoveryError> {
    now.checked_sub_signed(window)
        .ok_or(RecoveryError::WindowOutOfRange { window: name })
}

/// Builds the scanner and sweeper from configuration over a shared store and
/// discount provider.
///
/// # Errors
///
/// Returns [`RecoveryError::WindowOutOfRange`] if a configured window cannot
/// be represented as a duration.
pub fn build_jobs(
    config: &AppConfig,
    store: Arc<dyn CartStore>,
    discounts: Arc<dyn DiscountProvider>,
) -> Result<(CartScanner, Sweeper), RecoveryError> {
    let abandon_threshold = Duration::try_minutes(config.abandon_threshold_mins).ok_or(
        RecoveryError::WindowOutOfRange {
            window: "abandon threshold",
        },
    )?;
    let expire_after = Duration::try_days(config.expire_after_days)
        .ok_or(RecoveryError::WindowOutOfRange { window: "expiry" })?;
    let delete_after = Duration::try_days(config.delete_after_days)
        .ok_or(RecoveryError::WindowOutOfRange { window: "deletion" })?;

    let recorder = Recorder::new(Arc::clone(&store), discounts);
    let scanner = CartScanner::new(
        Arc::clone(&store),
        recorder,
        abandon_threshold,
        config.reflag_policy,
    );
    let sweeper = Sweeper::new(store, expire_after, delete_after);
    Ok((scanner, sweeper))
}
