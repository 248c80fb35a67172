use chrono::{DateTime, Utc};
use serde::Deserialize;

/// The subset of a Stripe `coupon` object this crate reads.
#[derive(Debug, Clone, Deserialize)]
pub struct Coupon {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub percent_off: Option<f64>,
}

/// The subset of a Stripe `promotion_code` object this crate reads.
#[derive(Debug, Clone, Deserialize)]
pub struct PromotionCode {
    pub id: String,
    pub code: String,
    #[serde(default)]
    pub active: bool,
    #[serde(default)]
    pub max_redemptions: Option<i64>,
    /// Unix seconds.
    #[serde(default)]
    pub expires_at: Option<i64>,
}

/// Parameters for a restricted, single-customer promotion code.
#[derive(Debug, Clone)]
pub struct PromotionCodeRequest {
    pub coupon_id: String,
    pub code: String,
    pub customer_email: String,
    pub max_redemptions: u32,
    pub expires_at: DateTime<Utc>,
    pub first_time_transaction: bool,
}

impl PromotionCodeRequest {
    /// Form fields in Stripe's bracketed encoding.
    pub(crate) fn form_fields(&self) -> Vec<(String, String)> {
        vec![
            ("coupon".to_string(), self.coupon_id.clone()),
            ("code".to_string(), self.code.clone()),
            (
                "max_redemptions".to_string(),
                self.max_redemptions.to_string(),
            ),
            (
                "expires_at".to_string(),
                self.expires_at.timestamp().to_string(),
            ),
            (
                "restrictions[first_time_transaction]".to_string(),
                self.first_time_transaction.to_string(),
            ),
            (
                "metadata[customer_email]".to_string(),
                self.customer_email.clone(),
            ),
            ("metadata[source]".to_string(), "abandoned_cart".to_string()),
        ]
    }
}

/// Stripe's error envelope: `{"error": {"type": ..., "code": ..., "message": ...}}`.
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorEnvelope {
    pub error: ErrorBody,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ErrorBody {
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}
