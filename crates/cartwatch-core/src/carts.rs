//! Cart identities, live cart lines, and the per-identity aggregate the
//! scanner works from.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::CoreError;

/// The key a cart is owned by: an anonymous session or a signed-in user.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum IdentityKey {
    Session(String),
    User(String),
}

impl IdentityKey {
    /// Builds an identity from the nullable `session_id` / `user_id` column
    /// pair used throughout the schema.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidIdentity`] when both or neither column is
    /// populated, or when the populated value is blank.
    pub fn from_columns(
        session_id: Option<String>,
        user_id: Option<String>,
    ) -> Result<Self, CoreError> {
        match (session_id, user_id) {
            (Some(session), None) if !session.trim().is_empty() => Ok(Self::Session(session)),
            (None, Some(user)) if !user.trim().is_empty() => Ok(Self::User(user)),
            _ => Err(CoreError::InvalidIdentity),
        }
    }

    #[must_use]
    pub fn session_id(&self) -> Option<&str> {
        match self {
            Self::Session(id) => Some(id),
            Self::User(_) => None,
        }
    }

    #[must_use]
    pub fn user_id(&self) -> Option<&str> {
        match self {
            Self::User(id) => Some(id),
            Self::Session(_) => None,
        }
    }

    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Session(_) => "session",
            Self::User(_) => "user",
        }
    }
}

impl fmt::Display for IdentityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Session(id) => write!(f, "session:{id}"),
            Self::User(id) => write!(f, "user:{id}"),
        }
    }
}

/// One live cart line joined with its product (and variant, when set).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub product_id: Uuid,
    pub product_name: String,
    pub variant_name: Option<String>,
    pub sku: Option<String>,
    pub image_url: Option<String>,
    pub quantity: i32,
    pub unit_price_cents: i64,
    pub updated_at: DateTime<Utc>,
}

impl CartLine {
    /// Product name with the variant appended, e.g. `"Tee - Large"`.
    #[must_use]
    pub fn display_name(&self) -> String {
        match self.variant_name.as_deref().map(str::trim) {
            Some(variant) if !variant.is_empty() => format!("{} - {variant}", self.product_name),
            _ => self.product_name.clone(),
        }
    }

    #[must_use]
    pub fn line_total_cents(&self) -> i64 {
        self.unit_price_cents
            .saturating_mul(i64::from(self.quantity))
    }
}

/// Per-identity summary of a cart's lines, recomputed on every scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartLineAggregate {
    pub identity: IdentityKey,
    pub last_modified: DateTime<Utc>,
    pub item_count: i32,
    pub total_cents: i64,
}

impl CartLineAggregate {
    /// Folds a set of lines belonging to `identity` into an aggregate.
    ///
    /// Returns `None` for an empty cart.
    #[must_use]
    pub fn from_lines(identity: IdentityKey, lines: &[CartLine]) -> Option<Self> {
        let last_modified = lines.iter().map(|l| l.updated_at).max()?;
        let item_count = i32::try_from(lines.len()).unwrap_or(i32::MAX);
        let total_cents = lines
            .iter()
            .map(CartLine::line_total_cents)
            .fold(0_i64, i64::saturating_add);

        Some(Self {
            identity,
            last_modified,
            item_count,
            total_cents,
        })
    }

    /// Checks the invariants a stored aggregate row must satisfy before the
    /// scanner acts on it.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidAggregate`] for empty carts or negative
    /// totals.
    pub fn validate(&self) -> Result<(), CoreError> {
        let reason = if self.item_count <= 0 {
            Some(format!("item_count must be positive, got {}", self.item_count))
        } else if self.total_cents < 0 {
            Some(format!(
                "total_cents must not be negative, got {}",
                self.total_cents
            ))
        } else {
            None
        };

        match reason {
            Some(reason) => Err(CoreError::InvalidAggregate {
                identity: self.identity.to_string(),
                reason,
            }),
            None => Ok(()),
        }
    }
}

/// Lifecycle status of an abandoned-cart record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AbandonedCartStatus {
    Active,
    Expired,
}

impl AbandonedCartStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Expired => "expired",
        }
    }
}

impl fmt::Display for AbandonedCartStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AbandonedCartStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "expired" => Ok(Self::Expired),
            other => Err(CoreError::UnknownStatus(other.to_string())),
        }
    }
}
