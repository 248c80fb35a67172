//! Customer lookups against the storefront's `users` and `orders` tables.

use sqlx::PgPool;

use crate::DbError;

/// Order statuses that count as a completed purchase.
const COMPLETED_ORDER_STATUSES: &[&str] = &["paid", "fulfilled", "shipped", "delivered"];

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UserRow {
    pub id: String,
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

impl UserRow {
    /// First and last name joined with a space, or `None` when both are blank.
    #[must_use]
    pub fn full_name(&self) -> Option<String> {
        let parts: Vec<&str> = [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .collect();

        if parts.is_empty() {
            None
        } else {
            Some(parts.join(" "))
        }
    }

    /// The email, if present and non-blank.
    #[must_use]
    pub fn usable_email(&self) -> Option<&str> {
        self.email
            .as_deref()
            .map(str::trim)
            .filter(|e| !e.is_empty())
    }
}

/// Fetches a user by id, or `None` if the storefront has no such user.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_user(pool: &PgPool, user_id: &str) -> Result<Option<UserRow>, DbError> {
    let row = sqlx::query_as::<_, UserRow>(
        "SELECT id, email, first_name, last_name FROM users WHERE id = $1",
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// Returns `true` if any completed order matches the user id or, case
/// insensitively, the email.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn has_ever_purchased(
    pool: &PgPool,
    user_id: Option<&str>,
    email: Option<&str>,
) -> Result<bool, DbError> {
    if user_id.is_none() && email.is_none() {
        return Ok(false);
    }

    let purchased = sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS ( \
             SELECT 1 FROM orders \
             WHERE status = ANY($3) \
               AND (user_id = $1 OR LOWER(customer_email) = LOWER($2)) \
         )",
    )
    .bind(user_id)
    .bind(email)
    .bind(COMPLETED_ORDER_STATUSES)
    .fetch_one(pool)
    .await?;

    Ok(purchased)
}
