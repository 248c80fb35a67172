//! Constants and code format for the abandoned-cart recovery discount.

use uuid::Uuid;

pub const CAMPAIGN_NAME: &str = "Abandoned Cart Recovery \u{2014} 5% Off";
pub const CAMPAIGN_DISCOUNT_TYPE: &str = "percentage";
pub const CAMPAIGN_DISCOUNT_PERCENT: i32 = 5;

pub const PROMO_CODE_PREFIX: &str = "COMEBACK-";
pub const PROMO_CODE_MAX_USES: i32 = 1;
pub const PROMO_CODE_EXPIRY_DAYS: i64 = 10;

const SUFFIX_LEN: usize = 8;

/// Generates a human-readable single-use code such as `COMEBACK-9F3A1C7E`.
///
/// The suffix is the random tail of a UUIDv7. Uniqueness is probabilistic and
/// is not checked against existing codes.
#[must_use]
pub fn generate_promo_code() -> String {
    promo_code_from(Uuid::now_v7())
}

fn promo_code_from(id: Uuid) -> String {
    let hex = id.simple().to_string();
    let suffix = &hex[hex.len() - SUFFIX_LEN..];
    format!("{PROMO_CODE_PREFIX}{}", suffix.to_ascii_uppercase())
}
