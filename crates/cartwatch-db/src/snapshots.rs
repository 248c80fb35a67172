//! Write-once copies of cart lines taken at abandonment time.

use cartwatch_core::CartLine;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::DbError;

/// A row from the `cart_snapshots` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CartSnapshotRow {
    pub id: Uuid,
    pub abandoned_cart_id: Uuid,
    pub product_id: Uuid,
    pub product_name: String,
    pub sku: Option<String>,
    pub image_url: Option<String>,
    pub quantity: i32,
    pub unit_price_cents: i64,
    pub line_total_cents: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCartSnapshot {
    pub product_id: Uuid,
    /// Includes the variant suffix when the line has one.
    pub product_name: String,
    pub sku: Option<String>,
    pub image_url: Option<String>,
    pub quantity: i32,
    pub unit_price_cents: i64,
    pub line_total_cents: i64,
}

impl From<&CartLine> for NewCartSnapshot {
    fn from(line: &CartLine) -> Self {
        Self {
            product_id: line.product_id,
            product_name: line.display_name(),
            sku: line.sku.clone(),
            image_url: line.image_url.clone(),
            quantity: line.quantity,
            unit_price_cents: line.unit_price_cents,
            line_total_cents: line.line_total_cents(),
        }
    }
}

/// Inserts one snapshot line for an abandoned cart.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn create_cart_snapshot(
    pool: &PgPool,
    abandoned_cart_id: Uuid,
    snapshot: &NewCartSnapshot,
) -> Result<Uuid, DbError> {
    let id = sqlx::query_scalar::<_, Uuid>(
        "INSERT INTO cart_snapshots \
             (id, abandoned_cart_id, product_id, product_name, sku, image_url, \
              quantity, unit_price_cents, line_total_cents) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
         RETURNING id",
    )
    .bind(Uuid::now_v7())
    .bind(abandoned_cart_id)
    .bind(snapshot.product_id)
    .bind(&snapshot.product_name)
    .bind(snapshot.sku.as_deref())
    .bind(snapshot.image_url.as_deref())
    .bind(snapshot.quantity)
    .bind(snapshot.unit_price_cents)
    .bind(snapshot.line_total_cents)
    .fetch_one(pool)
    .await?;

    Ok(id)
}

/// Returns the snapshot lines of one abandoned cart in insertion order.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_cart_snapshots(
    pool: &PgPool,
    abandoned_cart_id: Uuid,
) -> Result<Vec<CartSnapshotRow>, DbError> {
    let rows = sqlx::query_as::<_, CartSnapshotRow>(
        "SELECT id, abandoned_cart_id, product_id, product_name, sku, image_url, \
                quantity, unit_price_cents, line_total_cents, created_at \
         FROM cart_snapshots \
         WHERE abandoned_cart_id = $1 \
         ORDER BY id ASC",
    )
    .bind(abandoned_cart_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_from_line_carries_variant_name_and_total() {
        let line = CartLine {
            product_id: Uuid::new_v4(),
            product_name: "Hoodie".to_string(),
            variant_name: Some("XL".to_string()),
            sku: Some("HOOD-XL".to_string()),
            image_url: Some("https://cdn.example.com/hoodie.png".to_string()),
            quantity: 3,
            unit_price_cents: 4500,
            updated_at: Utc::now(),
        };

        let snap = NewCartSnapshot::from(&line);
        assert_eq!(snap.product_name, "Hoodie - XL");
        assert_eq!(snap.quantity, 3);
        assert_eq!(snap.unit_price_cents, 4500);
        assert_eq!(snap.line_total_cents, 13_500);
        assert_eq!(snap.sku.as_deref(), Some("HOOD-XL"));
    }
}
