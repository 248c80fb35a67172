//! Storage seam for the recovery job.
//!
//! [`CartStore`] names every query the scanner, recorder, and sweeper need.
//! [`PgCartStore`] implements it on top of the free functions in
//! `cartwatch-db`.

use async_trait::async_trait;
use cartwatch_core::{CartLine, CartLineAggregate, CoreError, IdentityKey};
use cartwatch_db::{
    AbandonedCartRow, DbError, NewAbandonedCart, NewCartSnapshot, NewPromotionCampaign,
    NewPromotionCode, PromotionCampaignRow, UserRow,
};
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("invalid stored data: {0}")]
    Invalid(#[from] CoreError),

    #[error(transparent)]
    Db(DbError),
}

impl From<DbError> for StoreError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::InvalidRow(core) => Self::Invalid(core),
            other => Self::Db(other),
        }
    }
}

#[async_trait]
pub trait CartStore: Send + Sync {
    /// One aggregate per identity whose newest line predates `stale_before`.
    /// An inner `Err` marks a single row that could not be decoded.
    async fn find_stale_cart_aggregates(
        &self,
        stale_before: DateTime<Utc>,
    ) -> Result<Vec<Result<CartLineAggregate, StoreError>>, StoreError>;

    async fn find_abandoned_cart_by_identity(
        &self,
        identity: &IdentityKey,
        active_only: bool,
    ) -> Result<Option<AbandonedCartRow>, StoreError>;

    /// `Ok(None)` when an active record for the identity already exists.
    async fn create_abandoned_cart(
        &self,
        cart: &NewAbandonedCart,
    ) -> Result<Option<Uuid>, StoreError>;

    async fn link_promotion_code(
        &self,
        cart_id: Uuid,
        promotion_code_id: Uuid,
    ) -> Result<(), StoreError>;

    async fn create_snapshot(
        &self,
        cart_id: Uuid,
        snapshot: &NewCartSnapshot,
    ) -> Result<Uuid, StoreError>;

    async fn list_cart_lines(&self, identity: &IdentityKey) -> Result<Vec<CartLine>, StoreError>;

    async fn get_user(&self, user_id: &str) -> Result<Option<UserRow>, StoreError>;

    async fn has_ever_purchased(
        &self,
        user_id: Option<&str>,
        email: Option<&str>,
    ) -> Result<bool, StoreError>;

    async fn list_active_promotion_campaigns(
        &self,
    ) -> Result<Vec<PromotionCampaignRow>, StoreError>;

    /// Insert-if-absent by name. The flag is `true` when this call created it.
    async fn create_promotion_campaign(
        &self,
        campaign: &NewPromotionCampaign,
    ) -> Result<(PromotionCampaignRow, bool), StoreError>;

    /// Inserts the code and links it to `cart_id` atomically.
    async fn create_promotion_code(
        &self,
        code: &NewPromotionCode,
        cart_id: Uuid,
    ) -> Result<Uuid, StoreError>;

    async fn mark_expired_carts(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError>;

    async fn delete_old_carts(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError>;
}

/// [`CartStore`] backed by Postgres.
#[derive(Debug, Clone)]
pub struct PgCartStore {
    pool: PgPool,
}

impl PgCartStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl CartStore for PgCartStore {
    async fn find_stale_cart_aggregates(
        &self,
        stale_before: DateTime<Utc>,
    ) -> Result<Vec<Result<CartLineAggregate, StoreError>>, StoreError> {
        let rows = cartwatch_db::list_stale_cart_aggregates(&self.pool, stale_before).await?;
        Ok(rows
            .into_iter()
            .map(|row| row.map_err(StoreError::from))
            .collect())
    }

    async fn find_abandoned_cart_by_identity(
        &self,
        identity: &IdentityKey,
        active_only: bool,
    ) -> Result<Option<AbandonedCartRow>, StoreError> {
        Ok(cartwatch_db::find_abandoned_cart_by_identity(&self.pool, identity, active_only).await?)
    }

    async fn create_abandoned_cart(
        &self,
        cart: &NewAbandonedCart,
    ) -> Result<Option<Uuid>, StoreError> {
        Ok(cartwatch_db::create_abandoned_cart(&self.pool, cart).await?)
    }

    async fn link_promotion_code(
        &self,
        cart_id: Uuid,
        promotion_code_id: Uuid,
    ) -> Result<(), StoreError> {
        Ok(cartwatch_db::link_promotion_code(&self.pool, cart_id, promotion_code_id).await?)
    }

    async fn create_snapshot(
        &self,
        cart_id: Uuid,
        snapshot: &NewCartSnapshot,
    ) -> Result<Uuid, StoreError> {
        Ok(cartwatch_db::create_cart_snapshot(&self.pool, cart_id, snapshot).await?)
    }

    async fn list_cart_lines(&self, identity: &IdentityKey) -> Result<Vec<CartLine>, StoreError> {
        let rows = cartwatch_db::list_cart_lines(&self.pool, identity).await?;
        Ok(rows.into_iter().map(CartLine::from).collect())
    }

    async fn get_user(&self, user_id: &str) -> Result<Option<UserRow>, StoreError> {
        Ok(cartwatch_db::get_user(&self.pool, user_id).await?)
    }

    async fn has_ever_purchased(
        &self,
        user_id: Option<&str>,
        email: Option<&str>,
    ) -> Result<bool, StoreError> {
        Ok(cartwatch_db::has_ever_purchased(&self.pool, user_id, email).await?)
    }

    async fn list_active_promotion_campaigns(
        &self,
    ) -> Result<Vec<PromotionCampaignRow>, StoreError> {
        Ok(cartwatch_db::list_active_promotion_campaigns(&self.pool).await?)
    }

    async fn create_promotion_campaign(
        &self,
        campaign: &NewPromotionCampaign,
    ) -> Result<(PromotionCampaignRow, bool), StoreError> {
        Ok(cartwatch_db::create_promotion_campaign(&self.pool, campaign).await?)
    }

    async fn create_promotion_code(
        &self,
        code: &NewPromotionCode,
        cart_id: Uuid,
    ) -> Result<Uuid, StoreError> {
        Ok(cartwatch_db::create_promotion_code(&self.pool, code, cart_id).await?)
    }

    async fn mark_expired_carts(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError> {
        Ok(cartwatch_db::mark_expired_carts(&self.pool, cutoff).await?)
    }

    async fn delete_old_carts(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError> {
        Ok(cartwatch_db::delete_old_carts(&self.pool, cutoff).await?)
    }
}
