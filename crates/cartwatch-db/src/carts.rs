//! Read-only queries over the storefront's live `cart_items`.

use cartwatch_core::{CartLine, CartLineAggregate, CoreError, IdentityKey};
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::DbError;

/// One aggregate row per cart identity, as produced by the stale-cart query.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct StaleCartRow {
    pub session_id: Option<String>,
    pub user_id: Option<String>,
    pub last_modified: DateTime<Utc>,
    /// `COUNT(*)` comes back as `BIGINT`.
    pub item_count: i64,
    pub total_cents: i64,
}

impl TryFrom<StaleCartRow> for CartLineAggregate {
    type Error = CoreError;

    fn try_from(row: StaleCartRow) -> Result<Self, Self::Error> {
        let identity = IdentityKey::from_columns(row.session_id, row.user_id)?;
        let item_count =
            i32::try_from(row.item_count).map_err(|e| CoreError::InvalidAggregate {
                identity: identity.to_string(),
                reason: format!("item_count {} out of range: {e}", row.item_count),
            })?;

        Ok(CartLineAggregate {
            identity,
            last_modified: row.last_modified,
            item_count,
            total_cents: row.total_cents,
        })
    }
}

/// A cart line joined with its product and optional variant.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CartLineRow {
    pub product_id: Uuid,
    pub product_name: String,
    pub variant_name: Option<String>,
    pub sku: Option<String>,
    pub image_url: Option<String>,
    pub quantity: i32,
    pub unit_price_cents: i64,
    pub updated_at: DateTime<Utc>,
}

impl From<CartLineRow> for CartLine {
    fn from(row: CartLineRow) -> Self {
        Self {
            product_id: row.product_id,
            product_name: row.product_name,
            variant_name: row.variant_name,
            sku: row.sku,
            image_url: row.image_url,
            quantity: row.quantity,
            unit_price_cents: row.unit_price_cents,
            updated_at: row.updated_at,
        }
    }
}

/// Returns one aggregate per identity whose newest cart line was last touched
/// before `stale_before`.
///
/// Rows are ordered by `last_modified` ascending, then identity. Each row is
/// decoded independently: the outer `Result` fails only when the query itself
/// fails, while a row that cannot be decoded or violates the identity
/// invariant comes back as an inner `Err` so the caller can skip it.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_stale_cart_aggregates(
    pool: &PgPool,
    stale_before: DateTime<Utc>,
) -> Result<Vec<Result<CartLineAggregate, DbError>>, DbError> {
    let rows = sqlx::query(
        "SELECT ci.session_id, ci.user_id, \
                MAX(ci.updated_at) AS last_modified, \
                COUNT(*) AS item_count, \
                COALESCE(SUM(COALESCE(pv.price_cents, p.price_cents) * ci.quantity), 0)::BIGINT \
                    AS total_cents \
         FROM cart_items ci \
         JOIN products p ON p.id = ci.product_id \
         LEFT JOIN product_variants pv ON pv.id = ci.variant_id \
         GROUP BY ci.session_id, ci.user_id \
         HAVING MAX(ci.updated_at) < $1 \
         ORDER BY last_modified ASC, ci.session_id NULLS LAST, ci.user_id NULLS LAST",
    )
    .bind(stale_before)
    .fetch_all(pool)
    .await?;

    let aggregates = rows
        .iter()
        .map(|row| {
            let decoded = StaleCartRow::from_row(row)?;
            CartLineAggregate::try_from(decoded).map_err(DbError::from)
        })
        .collect();

    Ok(aggregates)
}

/// Returns the current lines of the cart owned by `identity`, oldest first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_cart_lines(
    pool: &PgPool,
    identity: &IdentityKey,
) -> Result<Vec<CartLineRow>, DbError> {
    let (column, key) = match identity {
        IdentityKey::Session(id) => ("session_id", id),
        IdentityKey::User(id) => ("user_id", id),
    };

    let sql = format!(
        "SELECT ci.product_id, p.name AS product_name, pv.name AS variant_name, \
                COALESCE(pv.sku, p.sku) AS sku, \
                COALESCE(pv.image_url, p.image_url) AS image_url, \
                ci.quantity, \
                COALESCE(pv.price_cents, p.price_cents) AS unit_price_cents, \
                ci.updated_at \
         FROM cart_items ci \
         JOIN products p ON p.id = ci.product_id \
         LEFT JOIN product_variants pv ON pv.id = ci.variant_id \
         WHERE ci.{column} = $1 \
         ORDER BY ci.created_at ASC, ci.id ASC"
    );

    let rows = sqlx::query_as::<_, CartLineRow>(&sql)
        .bind(key)
        .fetch_all(pool)
        .await?;

    Ok(rows)
}
