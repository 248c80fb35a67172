//! Database operations for `promotion_campaigns` and `promotion_codes`.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::{abandoned_carts::link_promotion_code, DbError};

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// A row from the `promotion_campaigns` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PromotionCampaignRow {
    pub id: Uuid,
    pub name: String,
    pub discount_type: String,
    pub discount_value: i32,
    pub stripe_coupon_id: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewPromotionCampaign {
    pub name: String,
    pub discount_type: String,
    pub discount_value: i32,
    pub stripe_coupon_id: String,
}

/// A row from the `promotion_codes` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PromotionCodeRow {
    pub id: Uuid,
    pub campaign_id: Uuid,
    pub code: String,
    pub stripe_promotion_code_id: String,
    pub customer_email: String,
    pub max_uses: i32,
    pub times_used: i32,
    pub expires_at: DateTime<Utc>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewPromotionCode {
    pub campaign_id: Uuid,
    pub code: String,
    pub stripe_promotion_code_id: String,
    pub customer_email: String,
    pub max_uses: i32,
    pub expires_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// promotion_campaigns operations
// ---------------------------------------------------------------------------

/// Returns all active campaigns, oldest first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_active_promotion_campaigns(
    pool: &PgPool,
) -> Result<Vec<PromotionCampaignRow>, DbError> {
    let rows = sqlx::query_as::<_, PromotionCampaignRow>(
        "SELECT id, name, discount_type, discount_value, stripe_coupon_id, is_active, created_at \
         FROM promotion_campaigns \
         WHERE is_active = true \
         ORDER BY created_at ASC, id ASC",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Inserts a campaign unless one with the same name already exists.
///
/// Returns the stored row and whether this call created it. On a name
/// conflict the existing row wins and `campaign.stripe_coupon_id` is not
/// persisted.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert or fetch fails.
pub async fn create_promotion_campaign(
    pool: &PgPool,
    campaign: &NewPromotionCampaign,
) -> Result<(PromotionCampaignRow, bool), DbError> {
    let inserted = sqlx::query(
        "INSERT INTO promotion_campaigns \
             (id, name, discount_type, discount_value, stripe_coupon_id) \
         VALUES ($1, $2, $3, $4, $5) \
         ON CONFLICT (name) DO NOTHING",
    )
    .bind(Uuid::now_v7())
    .bind(&campaign.name)
    .bind(&campaign.discount_type)
    .bind(campaign.discount_value)
    .bind(&campaign.stripe_coupon_id)
    .execute(pool)
    .await?
    .rows_affected()
        > 0;

    let row = sqlx::query_as::<_, PromotionCampaignRow>(
        "SELECT id, name, discount_type, discount_value, stripe_coupon_id, is_active, created_at \
         FROM promotion_campaigns \
         WHERE name = $1",
    )
    .bind(&campaign.name)
    .fetch_one(pool)
    .await?;

    Ok((row, inserted))
}

// ---------------------------------------------------------------------------
// promotion_codes operations
// ---------------------------------------------------------------------------

/// Inserts a promotion code and links it to `cart_id` in one transaction.
///
/// If the cart already carries a code the whole operation rolls back.
///
/// # Errors
///
/// Returns [`DbError::PromotionAlreadyLinked`] if the link fails, or
/// [`DbError::Sqlx`] if the insert fails (including a duplicate `code`).
pub async fn create_promotion_code(
    pool: &PgPool,
    code: &NewPromotionCode,
    cart_id: Uuid,
) -> Result<Uuid, DbError> {
    let mut tx = pool.begin().await?;

    let id = sqlx::query_scalar::<_, Uuid>(
        "INSERT INTO promotion_codes \
             (id, campaign_id, code, stripe_promotion_code_id, customer_email, \
              max_uses, expires_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7) \
         RETURNING id",
    )
    .bind(Uuid::now_v7())
    .bind(code.campaign_id)
    .bind(&code.code)
    .bind(&code.stripe_promotion_code_id)
    .bind(&code.customer_email)
    .bind(code.max_uses)
    .bind(code.expires_at)
    .fetch_one(&mut *tx)
    .await?;

    link_promotion_code(&mut *tx, cart_id, id).await?;

    tx.commit().await?;
    Ok(id)
}

/// Fetches a single promotion code by id.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no row exists, or [`DbError::Sqlx`] if
/// the query fails.
pub async fn get_promotion_code(pool: &PgPool, id: Uuid) -> Result<PromotionCodeRow, DbError> {
    sqlx::query_as::<_, PromotionCodeRow>(
        "SELECT id, campaign_id, code, stripe_promotion_code_id, customer_email, \
                max_uses, times_used, expires_at, is_active, created_at \
         FROM promotion_codes \
         WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)
}
