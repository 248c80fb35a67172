use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use crate::store::CartStore;
use crate::{cutoff, RecoveryError};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    pub expired: u64,
    pub deleted: u64,
}

/// Ages abandoned-cart records: active records past `expire_after` become
/// expired, any record past `delete_after` is removed with its snapshots.
#[derive(Clone)]
pub struct Sweeper {
    store: Arc<dyn CartStore>,
    expire_after: Duration,
    delete_after: Duration,
}

impl Sweeper {
    #[must_use]
    pub fn new(store: Arc<dyn CartStore>, expire_after: Duration, delete_after: Duration) -> Self {
        Self {
            store,
            expire_after,
            delete_after,
        }
    }

    /// Runs both passes relative to `now`. Safe to repeat.
    ///
    /// # Errors
    ///
    /// Returns [`RecoveryError::Store`] if either bulk statement fails, or
    /// [`RecoveryError::WindowOutOfRange`] if a window reaches past the
    /// earliest representable time. Nothing is touched in that case.
    pub async fn run(&self, now: DateTime<Utc>) -> Result<SweepReport, RecoveryError> {
        let expire_before = cutoff(now, self.expire_after, "expiry")?;
        let delete_before = cutoff(now, self.delete_after, "deletion")?;

        let expired = self.store.mark_expired_carts(expire_before).await?;
        let deleted = self.store.delete_old_carts(delete_before).await?;

        tracing::info!(expired, deleted, "sweeper: pass complete");
        Ok(SweepReport { expired, deleted })
    }
}
