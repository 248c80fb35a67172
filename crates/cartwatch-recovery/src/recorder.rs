//! Turns a newly detected abandoned aggregate into a persisted record, an
//! optional first-purchase promotion code, and a snapshot of its lines.

use std::sync::Arc;

use cartwatch_core::{
    generate_promo_code, CartLineAggregate, IdentityKey, CAMPAIGN_DISCOUNT_PERCENT,
    CAMPAIGN_DISCOUNT_TYPE, CAMPAIGN_NAME, PROMO_CODE_EXPIRY_DAYS, PROMO_CODE_MAX_USES,
};
use cartwatch_db::{
    NewAbandonedCart, NewCartSnapshot, NewPromotionCampaign, NewPromotionCode,
    PromotionCampaignRow,
};
use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::discount::{DiscountError, DiscountProvider};
use crate::store::CartStore;
use crate::RecoveryError;

const MAX_CODE_ATTEMPTS: u32 = 3;

/// Result of recording one aggregate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordOutcome {
    Recorded {
        cart_id: Uuid,
        promotion_code_id: Option<Uuid>,
        snapshots_written: usize,
        snapshots_failed: usize,
    },
    /// Another writer already holds an active record for this identity.
    AlreadyRecorded,
}

#[derive(Debug, Default)]
struct Customer {
    email: Option<String>,
    name: Option<String>,
}

#[derive(Clone)]
pub struct Recorder {
    store: Arc<dyn CartStore>,
    discounts: Arc<dyn DiscountProvider>,
}

impl Recorder {
    #[must_use]
    pub fn new(store: Arc<dyn CartStore>, discounts: Arc<dyn DiscountProvider>) -> Self {
        Self { store, discounts }
    }

    /// Records `aggregate` as abandoned.
    ///
    /// Promotion and snapshot failures are logged and do not fail the call.
    ///
    /// # Errors
    ///
    /// Returns [`RecoveryError::Store`] if the abandoned-cart insert fails.
    #[tracing::instrument(skip_all, fields(identity = %aggregate.identity, kind = aggregate.identity.kind()))]
    pub async fn record(
        &self,
        aggregate: &CartLineAggregate,
        now: DateTime<Utc>,
    ) -> Result<RecordOutcome, RecoveryError> {
        let customer = self.resolve_customer(&aggregate.identity).await;

        let new_cart = NewAbandonedCart {
            identity: aggregate.identity.clone(),
            customer_email: customer.email.clone(),
            customer_name: customer.name.clone(),
            cart_value_cents: aggregate.total_cents,
            item_count: aggregate.item_count,
            abandoned_at: aggregate.last_modified,
        };

        let Some(cart_id) = self.store.create_abandoned_cart(&new_cart).await? else {
            tracing::debug!("recorder: identity already has an active record, skipping");
            return Ok(RecordOutcome::AlreadyRecorded);
        };

        tracing::info!(
            %cart_id,
            item_count = aggregate.item_count,
            cart_value_cents = aggregate.total_cents,
            "recorder: abandoned cart recorded"
        );

        let promotion_code_id = match customer.email.as_deref() {
            Some(email) => match self
                .issue_promotion(cart_id, &aggregate.identity, email, now)
                .await
            {
                Ok(code_id) => code_id,
                Err(e) => {
                    tracing::warn!(%cart_id, error = %e, "recorder: promotion issuance failed");
                    None
                }
            },
            None => None,
        };

        let (snapshots_written, snapshots_failed) =
            self.snapshot_lines(cart_id, &aggregate.identity).await;

        Ok(RecordOutcome::Recorded {
            cart_id,
            promotion_code_id,
            snapshots_written,
            snapshots_failed,
        })
    }

    /// Best effort: lookup failures leave the customer anonymous.
    async fn resolve_customer(&self, identity: &IdentityKey) -> Customer {
        let Some(user_id) = identity.user_id() else {
            return Customer::default();
        };

        match self.store.get_user(user_id).await {
            Ok(Some(user)) => Customer {
                email: user.usable_email().map(str::to_owned),
                name: user.full_name(),
            },
            Ok(None) => {
                tracing::debug!(user_id, "recorder: user not found, recording without email");
                Customer::default()
            }
            Err(e) => {
                tracing::warn!(user_id, error = %e, "recorder: user lookup failed");
                Customer::default()
            }
        }
    }

    /// Issues a code when the customer has never completed a purchase.
    /// Returns the stored code id, or `None` when the customer is ineligible
    /// or the provider is disabled.
    async fn issue_promotion(
        &self,
        cart_id: Uuid,
        identity: &IdentityKey,
        email: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Uuid>, RecoveryError> {
        if !self.discounts.is_enabled() {
            tracing::debug!(%cart_id, "recorder: discount provider disabled");
            return Ok(None);
        }

        if self
            .store
            .has_ever_purchased(identity.user_id(), Some(email))
            .await?
        {
            tracing::debug!(%cart_id, "recorder: returning customer, no promotion");
            return Ok(None);
        }

        let Some(campaign) = self.ensure_campaign().await? else {
            tracing::info!(%cart_id, "recorder: recovery campaign is inactive, no promotion");
            return Ok(None);
        };

        let expires_at = now + Duration::days(PROMO_CODE_EXPIRY_DAYS);
        let mut attempt = 0;
        let (code, provider_id) = loop {
            attempt += 1;
            let code = generate_promo_code();
            match self
                .discounts
                .create_restricted_code(&campaign.stripe_coupon_id, &code, email, expires_at)
                .await
            {
                Ok(provider_id) => break (code, provider_id),
                Err(DiscountError::DuplicateCode(_)) if attempt < MAX_CODE_ATTEMPTS => {
                    tracing::warn!(%cart_id, attempt, code = %code, "recorder: code collision, regenerating");
                }
                Err(e) => return Err(e.into()),
            }
        };

        let new_code = NewPromotionCode {
            campaign_id: campaign.id,
            code,
            stripe_promotion_code_id: provider_id,
            customer_email: email.to_owned(),
            max_uses: PROMO_CODE_MAX_USES,
            expires_at,
        };
        let code_id = self.store.create_promotion_code(&new_code, cart_id).await?;

        tracing::info!(%cart_id, %code_id, code = %new_code.code, "recorder: promotion code issued");
        Ok(Some(code_id))
    }

    /// Returns the recovery campaign, creating it at the provider and in the
    /// store on first use. `None` if the stored campaign has been deactivated.
    async fn ensure_campaign(&self) -> Result<Option<PromotionCampaignRow>, RecoveryError> {
        let existing = self
            .store
            .list_active_promotion_campaigns()
            .await?
            .into_iter()
            .find(|c| c.name == CAMPAIGN_NAME);
        if let Some(campaign) = existing {
            return Ok(Some(campaign));
        }

        let coupon_id = self
            .discounts
            .create_campaign(CAMPAIGN_NAME, CAMPAIGN_DISCOUNT_TYPE, CAMPAIGN_DISCOUNT_PERCENT)
            .await?;

        let (campaign, created) = self
            .store
            .create_promotion_campaign(&NewPromotionCampaign {
                name: CAMPAIGN_NAME.to_owned(),
                discount_type: CAMPAIGN_DISCOUNT_TYPE.to_owned(),
                discount_value: CAMPAIGN_DISCOUNT_PERCENT,
                stripe_coupon_id: coupon_id.clone(),
            })
            .await?;

        if created {
            tracing::info!(campaign_id = %campaign.id, coupon_id = %coupon_id, "recorder: recovery campaign created");
        } else {
            tracing::warn!(
                campaign_id = %campaign.id,
                orphaned_coupon_id = %coupon_id,
                "recorder: campaign created concurrently, provider coupon left unused"
            );
        }

        Ok(campaign.is_active.then_some(campaign))
    }

    /// Writes one snapshot per current line. Returns (written, failed).
    async fn snapshot_lines(&self, cart_id: Uuid, identity: &IdentityKey) -> (usize, usize) {
        let lines = match self.store.list_cart_lines(identity).await {
            Ok(lines) => lines,
            Err(e) => {
                tracing::warn!(%cart_id, error = %e, "recorder: could not load cart lines for snapshot");
                return (0, 0);
            }
        };

        let mut written = 0;
        let mut failed = 0;
        for line in &lines {
            match self
                .store
                .create_snapshot(cart_id, &NewCartSnapshot::from(line))
                .await
            {
                Ok(_) => written += 1,
                Err(e) => {
                    failed += 1;
                    tracing::warn!(
                        %cart_id,
                        product_id = %line.product_id,
                        error = %e,
                        "recorder: snapshot line failed"
                    );
                }
            }
        }

        (written, failed)
    }
}

#[cfg(test)]
#[path = "recorder_test.rs"]
mod tests;
