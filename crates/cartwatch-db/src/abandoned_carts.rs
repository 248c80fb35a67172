//! Database operations for `abandoned_carts`.

use cartwatch_core::{AbandonedCartStatus, CoreError, IdentityKey};
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::DbError;

const ABANDONED_CART_COLUMNS: &str = "id, session_id, user_id, customer_email, customer_name, \
     cart_value_cents, item_count, abandoned_at, status, promotion_code_id, \
     created_at, updated_at";

/// A row from the `abandoned_carts` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AbandonedCartRow {
    pub id: Uuid,
    pub session_id: Option<String>,
    pub user_id: Option<String>,
    pub customer_email: Option<String>,
    pub customer_name: Option<String>,
    pub cart_value_cents: i64,
    pub item_count: i32,
    pub abandoned_at: DateTime<Utc>,
    /// `'active'` or `'expired'`, enforced by a CHECK constraint.
    pub status: String,
    pub promotion_code_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AbandonedCartRow {
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidIdentity`] if the row violates the
    /// one-identity invariant.
    pub fn identity(&self) -> Result<IdentityKey, CoreError> {
        IdentityKey::from_columns(self.session_id.clone(), self.user_id.clone())
    }

    /// # Errors
    ///
    /// Returns [`CoreError::UnknownStatus`] for a status the schema should
    /// never allow.
    pub fn status(&self) -> Result<AbandonedCartStatus, CoreError> {
        self.status.parse()
    }
}

/// Fields for a new abandoned-cart record. Status always starts `active`.
#[derive(Debug, Clone)]
pub struct NewAbandonedCart {
    pub identity: IdentityKey,
    pub customer_email: Option<String>,
    pub customer_name: Option<String>,
    pub cart_value_cents: i64,
    pub item_count: i32,
    pub abandoned_at: DateTime<Utc>,
}

/// Returns the most recent record for `identity`.
///
/// When `active_only` is set, expired records are ignored.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn find_abandoned_cart_by_identity(
    pool: &PgPool,
    identity: &IdentityKey,
    active_only: bool,
) -> Result<Option<AbandonedCartRow>, DbError> {
    let column = match identity {
        IdentityKey::Session(_) => "session_id",
        IdentityKey::User(_) => "user_id",
    };
    let key = identity.session_id().or(identity.user_id());

    let sql = format!(
        "SELECT {ABANDONED_CART_COLUMNS} \
         FROM abandoned_carts \
         WHERE {column} = $1 AND ($2 = false OR status = 'active') \
         ORDER BY abandoned_at DESC, created_at DESC \
         LIMIT 1"
    );

    let row = sqlx::query_as::<_, AbandonedCartRow>(&sql)
        .bind(key)
        .bind(active_only)
        .fetch_optional(pool)
        .await?;

    Ok(row)
}

/// Inserts a new `active` record.
///
/// Returns `None` when the insert collided with an existing active record
/// for the same identity (unique index), meaning another scanner got there
/// first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails for any other reason.
pub async fn create_abandoned_cart(
    pool: &PgPool,
    cart: &NewAbandonedCart,
) -> Result<Option<Uuid>, DbError> {
    let id = sqlx::query_scalar::<_, Uuid>(
        "INSERT INTO abandoned_carts \
             (id, session_id, user_id, customer_email, customer_name, \
              cart_value_cents, item_count, abandoned_at, status) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, 'active') \
         ON CONFLICT DO NOTHING \
         RETURNING id",
    )
    .bind(Uuid::now_v7())
    .bind(cart.identity.session_id())
    .bind(cart.identity.user_id())
    .bind(cart.customer_email.as_deref())
    .bind(cart.customer_name.as_deref())
    .bind(cart.cart_value_cents)
    .bind(cart.item_count)
    .bind(cart.abandoned_at)
    .fetch_optional(pool)
    .await?;

    Ok(id)
}

/// Links a promotion code to a cart. The link is set once; a cart that
/// already carries a code is left untouched.
///
/// Accepts any executor so it can run inside the promotion-code transaction.
///
/// # Errors
///
/// Returns [`DbError::PromotionAlreadyLinked`] if the cart is missing or
/// already linked, or [`DbError::Sqlx`] if the update fails.
pub async fn link_promotion_code<'e, E>(
    executor: E,
    cart_id: Uuid,
    promotion_code_id: Uuid,
) -> Result<(), DbError>
where
    E: sqlx::PgExecutor<'e>,
{
    let result = sqlx::query(
        "UPDATE abandoned_carts \
         SET promotion_code_id = $2, updated_at = NOW() \
         WHERE id = $1 AND promotion_code_id IS NULL",
    )
    .bind(cart_id)
    .bind(promotion_code_id)
    .execute(executor)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::PromotionAlreadyLinked { cart_id });
    }

    Ok(())
}

/// Fetches a single record by id.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no row exists, or [`DbError::Sqlx`] if
/// the query fails.
pub async fn get_abandoned_cart(pool: &PgPool, id: Uuid) -> Result<AbandonedCartRow, DbError> {
    let sql = format!("SELECT {ABANDONED_CART_COLUMNS} FROM abandoned_carts WHERE id = $1");

    sqlx::query_as::<_, AbandonedCartRow>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(DbError::NotFound)
}

/// Returns the most recent `limit` records, optionally filtered by status.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_abandoned_carts(
    pool: &PgPool,
    status: Option<AbandonedCartStatus>,
    limit: i64,
) -> Result<Vec<AbandonedCartRow>, DbError> {
    let sql = format!(
        "SELECT {ABANDONED_CART_COLUMNS} \
         FROM abandoned_carts \
         WHERE ($1::TEXT IS NULL OR status = $1) \
         ORDER BY abandoned_at DESC, id DESC \
         LIMIT $2"
    );

    let rows = sqlx::query_as::<_, AbandonedCartRow>(&sql)
        .bind(status.map(AbandonedCartStatus::as_str))
        .bind(limit)
        .fetch_all(pool)
        .await?;

    Ok(rows)
}

/// Marks every `active` record abandoned before `cutoff` as `expired`.
///
/// Returns the number of records transitioned. Idempotent.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the update fails.
pub async fn mark_expired_carts(pool: &PgPool, cutoff: DateTime<Utc>) -> Result<u64, DbError> {
    let result = sqlx::query(
        "UPDATE abandoned_carts \
         SET status = 'expired', updated_at = NOW() \
         WHERE status = 'active' AND abandoned_at < $1",
    )
    .bind(cutoff)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}

/// Deletes every record abandoned before `cutoff`, whatever its status.
///
/// Snapshots cascade with the record; promotion codes are left in place.
/// Returns the number of records deleted. Idempotent.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the delete fails.
pub async fn delete_old_carts(pool: &PgPool, cutoff: DateTime<Utc>) -> Result<u64, DbError> {
    let result = sqlx::query("DELETE FROM abandoned_carts WHERE abandoned_at < $1")
        .bind(cutoff)
        .execute(pool)
        .await?;

    Ok(result.rows_affected())
}
