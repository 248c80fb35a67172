//! Discount-provider seam: the two provider capabilities the recorder uses.

use std::sync::Arc;

use async_trait::async_trait;
use cartwatch_core::AppConfig;
use cartwatch_stripe::{
    PromotionCodeRequest, StripeClient, StripeError, DEFAULT_BACKOFF_BASE_MS, DEFAULT_BASE_URL,
};
use chrono::{DateTime, Utc};
use mockall::automock;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DiscountError {
    /// The provider already has a code with this value; pick another.
    #[error("promotion code {0} already exists at the provider")]
    DuplicateCode(String),

    #[error("discount provider is disabled")]
    Disabled,

    #[error("unsupported discount type: {0}")]
    UnsupportedKind(String),

    #[error(transparent)]
    Stripe(StripeError),
}

impl From<StripeError> for DiscountError {
    fn from(err: StripeError) -> Self {
        match err {
            StripeError::DuplicateCode(code) => Self::DuplicateCode(code),
            other => Self::Stripe(other),
        }
    }
}

#[automock]
#[async_trait]
pub trait DiscountProvider: Send + Sync {
    /// `false` when no credentials are configured; callers skip promotion
    /// issuance entirely.
    fn is_enabled(&self) -> bool;

    /// Creates the provider-side coupon and returns its id.
    async fn create_campaign(
        &self,
        name: &str,
        kind: &str,
        value: i32,
    ) -> Result<String, DiscountError>;

    /// Creates a single-use, first-order-only code restricted to `email` and
    /// returns the provider's id for it.
    async fn create_restricted_code(
        &self,
        coupon_id: &str,
        code: &str,
        email: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<String, DiscountError>;
}

/// [`DiscountProvider`] backed by Stripe coupons and promotion codes.
#[derive(Debug)]
pub struct StripeDiscountProvider {
    client: StripeClient,
}

impl StripeDiscountProvider {
    #[must_use]
    pub fn new(client: StripeClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl DiscountProvider for StripeDiscountProvider {
    fn is_enabled(&self) -> bool {
        true
    }

    async fn create_campaign(
        &self,
        name: &str,
        kind: &str,
        value: i32,
    ) -> Result<String, DiscountError> {
        if kind != cartwatch_core::CAMPAIGN_DISCOUNT_TYPE {
            return Err(DiscountError::UnsupportedKind(kind.to_owned()));
        }
        let coupon = self.client.create_coupon(name, value).await?;
        Ok(coupon.id)
    }

    async fn create_restricted_code(
        &self,
        coupon_id: &str,
        code: &str,
        email: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<String, DiscountError> {
        let request = PromotionCodeRequest {
            coupon_id: coupon_id.to_owned(),
            code: code.to_owned(),
            customer_email: email.to_owned(),
            max_redemptions: cartwatch_core::PROMO_CODE_MAX_USES.unsigned_abs(),
            expires_at,
            first_time_transaction: true,
        };
        let promo = self.client.create_promotion_code(&request).await?;
        Ok(promo.id)
    }
}

/// Provider used when no Stripe key is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledDiscountProvider;

#[async_trait]
impl DiscountProvider for DisabledDiscountProvider {
    fn is_enabled(&self) -> bool {
        false
    }

    async fn create_campaign(
        &self,
        _name: &str,
        _kind: &str,
        _value: i32,
    ) -> Result<String, DiscountError> {
        Err(DiscountError::Disabled)
    }

    async fn create_restricted_code(
        &self,
        _coupon_id: &str,
        _code: &str,
        _email: &str,
        _expires_at: DateTime<Utc>,
    ) -> Result<String, DiscountError> {
        Err(DiscountError::Disabled)
    }
}

/// Builds the provider the configuration asks for: Stripe when a secret key
/// is set, otherwise [`DisabledDiscountProvider`].
///
/// # Errors
///
/// Returns [`StripeError`] if the Stripe client cannot be constructed.
pub fn discount_provider_from_config(
    config: &AppConfig,
) -> Result<Arc<dyn DiscountProvider>, StripeError> {
    match config.stripe_secret_key.as_deref() {
        Some(key) => {
            let client = stripe_client(config, key)?;
            Ok(Arc::new(StripeDiscountProvider::new(client)))
        }
        None => Ok(Arc::new(DisabledDiscountProvider)),
    }
}

fn stripe_client(config: &AppConfig, key: &str) -> Result<StripeClient, StripeError> {
    let base_url = config.stripe_base_url.trim_end_matches('/');
    if base_url == DEFAULT_BASE_URL.trim_end_matches('/') {
        StripeClient::new(key, config.stripe_timeout_secs, config.stripe_max_retries)
    } else {
        StripeClient::with_base_url(
            key,
            config.stripe_timeout_secs,
            config.stripe_max_retries,
            base_url,
            DEFAULT_BACKOFF_BASE_MS,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stripe_duplicate_code_maps_to_retryable_variant() {
        let err = DiscountError::from(StripeError::DuplicateCode("COMEBACK-AAAA0000".into()));
        assert!(matches!(err, DiscountError::DuplicateCode(_)));
    }

    #[test]
    fn other_stripe_errors_are_wrapped() {
        let err = DiscountError::from(StripeError::RateLimited("slow down".into()));
        assert!(matches!(
            err,
            DiscountError::Stripe(StripeError::RateLimited(_))
        ));
    }

    #[tokio::test]
    async fn disabled_provider_is_a_no_op() {
        let provider = DisabledDiscountProvider;
        assert!(!provider.is_enabled());
        let err = provider
            .create_campaign("Recovery", "percentage", 5)
            .await
            .unwrap_err();
        assert!(matches!(err, DiscountError::Disabled));
    }

    fn config() -> AppConfig {
        AppConfig {
            database_url: "postgres://example".to_string(),
            env: cartwatch_core::Environment::Test,
            log_level: "info".to_string(),
            db_max_connections: 10,
            db_min_connections: 1,
            db_acquire_timeout_secs: 10,
            scan_interval_secs: 300,
            abandon_threshold_mins: 30,
            expire_after_days: 30,
            delete_after_days: 90,
            sweep_cron: "0 0 3 * * *".to_string(),
            reflag_policy: cartwatch_core::ReflagPolicy::Never,
            stripe_secret_key: None,
            stripe_base_url: "https://api.stripe.com/".to_string(),
            stripe_timeout_secs: 30,
            stripe_max_retries: 2,
        }
    }

    #[test]
    fn provider_from_config_without_key_is_disabled() {
        let config = config();
        let provider = discount_provider_from_config(&config).unwrap();
        assert!(!provider.is_enabled());

        let with_key = AppConfig {
            stripe_secret_key: Some("sk_test_1".to_string()),
            ..config
        };
        let provider = discount_provider_from_config(&with_key).unwrap();
        assert!(provider.is_enabled());
    }

    #[test]
    fn default_base_url_uses_the_public_api_client() {
        let config = AppConfig {
            stripe_base_url: "https://api.stripe.com".to_string(),
            ..config()
        };
        let client = stripe_client(&config, "sk_test_1").unwrap();
        assert!(format!("{client:?}").contains("\"https://api.stripe.com/\""));
    }

    #[test]
    fn custom_base_url_is_honoured() {
        let config = AppConfig {
            stripe_base_url: "http://localhost:12111/".to_string(),
            ..config()
        };
        let client = stripe_client(&config, "sk_test_1").unwrap();
        assert!(format!("{client:?}").contains("localhost:12111"));
    }
}
