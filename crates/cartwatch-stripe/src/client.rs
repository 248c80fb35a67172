//! HTTP client for the Stripe coupon and promotion-code endpoints.
//!
//! Wraps `reqwest` with Stripe's bearer authentication, form-encoded request
//! bodies, and error-envelope mapping. Every write carries an
//! `Idempotency-Key` that stays fixed across retries of the same call.

use std::time::Duration;

use reqwest::{Client, StatusCode, Url};
use serde::de::DeserializeOwned;

use crate::error::StripeError;
use crate::retry::retry_with_backoff;
use crate::types::{Coupon, ErrorEnvelope, PromotionCode, PromotionCodeRequest};

pub const DEFAULT_BASE_URL: &str = "https://api.stripe.com/";
pub const DEFAULT_BACKOFF_BASE_MS: u64 = 500;

/// Client for the Stripe REST API.
///
/// Use [`StripeClient::new`] for production or [`StripeClient::with_base_url`]
/// to point at a mock server in tests.
pub struct StripeClient {
    client: Client,
    secret_key: String,
    base_url: Url,
    max_retries: u32,
    backoff_base_ms: u64,
}

impl std::fmt::Debug for StripeClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StripeClient")
            .field("base_url", &self.base_url.as_str())
            .field("max_retries", &self.max_retries)
            .finish_non_exhaustive()
    }
}

impl StripeClient {
    /// Creates a new client pointed at [`DEFAULT_BASE_URL`].
    ///
    /// # Errors
    ///
    /// Returns [`StripeError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed.
    pub fn new(secret_key: &str, timeout_secs: u64, max_retries: u32) -> Result<Self, StripeError> {
        Self::with_base_url(
            secret_key,
            timeout_secs,
            max_retries,
            DEFAULT_BASE_URL,
            DEFAULT_BACKOFF_BASE_MS,
        )
    }

    /// Creates a new client with a custom base URL and back-off base, such as
    /// a Stripe mock or a regional proxy.
    ///
    /// # Errors
    ///
    /// Returns [`StripeError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed, or [`StripeError::InvalidBaseUrl`] if
    /// `base_url` does not parse.
    pub fn with_base_url(
        secret_key: &str,
        timeout_secs: u64,
        max_retries: u32,
        base_url: &str,
        backoff_base_ms: u64,
    ) -> Result<Self, StripeError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent("cartwatch/0.1 (cart-recovery)")
            .build()?;

        // Exactly one trailing slash so `join("v1/...")` appends instead of
        // replacing the last path segment.
        let normalised = format!("{}/", base_url.trim_end_matches('/'));
        let base_url = Url::parse(&normalised).map_err(|e| StripeError::InvalidBaseUrl {
            url: base_url.to_owned(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            client,
            secret_key: secret_key.to_owned(),
            base_url,
            max_retries,
            backoff_base_ms,
        })
    }

    /// Creates a one-time percentage-off coupon.
    ///
    /// # Errors
    ///
    /// Any [`StripeError`] after retries on transient failures are exhausted.
    pub async fn create_coupon(
        &self,
        name: &str,
        percent_off: i32,
    ) -> Result<Coupon, StripeError> {
        let form = vec![
            ("name".to_string(), name.to_owned()),
            ("percent_off".to_string(), percent_off.to_string()),
            ("duration".to_string(), "once".to_string()),
        ];
        self.post_form("v1/coupons", &form, &format!("create_coupon(name={name})"))
            .await
    }

    /// Creates a customer-facing promotion code on an existing coupon.
    ///
    /// # Errors
    ///
    /// - [`StripeError::DuplicateCode`] if `request.code` is already taken.
    /// - Any other [`StripeError`] after retries are exhausted.
    pub async fn create_promotion_code(
        &self,
        request: &PromotionCodeRequest,
    ) -> Result<PromotionCode, StripeError> {
        let form = request.form_fields();
        self.post_form(
            "v1/promotion_codes",
            &form,
            &format!("create_promotion_code(code={})", request.code),
        )
        .await
    }

    fn endpoint(&self, path: &str) -> Result<Url, StripeError> {
        self.base_url
            .join(path)
            .map_err(|e| StripeError::InvalidBaseUrl {
                url: self.base_url.to_string(),
                reason: e.to_string(),
            })
    }

    async fn post_form<T: DeserializeOwned>(
        &self,
        path: &str,
        form: &[(String, String)],
        context: &str,
    ) -> Result<T, StripeError> {
        let url = self.endpoint(path)?;
        let idempotency_key = uuid::Uuid::new_v4().to_string();

        retry_with_backoff(self.max_retries, self.backoff_base_ms, || {
            let url = url.clone();
            let idempotency_key = idempotency_key.clone();
            async move {
                let response = self
                    .client
                    .post(url)
                    .bearer_auth(&self.secret_key)
                    .header("Idempotency-Key", idempotency_key)
                    .form(form)
                    .send()
                    .await?;
                let status = response.status();
                let body = response.text().await?;

                if !status.is_success() {
                    return Err(Self::map_error(status, &body));
                }

                serde_json::from_str(&body).map_err(|e| StripeError::Deserialize {
                    context: context.to_owned(),
                    source: e,
                })
            }
        })
        .await
    }

    /// Maps a non-2xx response onto a [`StripeError`] variant.
    fn map_error(status: StatusCode, body: &str) -> StripeError {
        let parsed = serde_json::from_str::<ErrorEnvelope>(body).ok();
        let code = parsed
            .as_ref()
            .and_then(|e| e.error.code.clone())
            .unwrap_or_default();
        let message = parsed
            .as_ref()
            .and_then(|e| e.error.message.clone().or_else(|| e.error.kind.clone()))
            .unwrap_or_else(|| format!("HTTP {}", status.as_u16()));

        if status == StatusCode::TOO_MANY_REQUESTS {
            StripeError::RateLimited(message)
        } else if status.is_server_error() {
            StripeError::Server {
                status: status.as_u16(),
                message,
            }
        } else if status == StatusCode::UNAUTHORIZED {
            StripeError::Unauthorized(message)
        } else if code == "resource_already_exists" {
            StripeError::DuplicateCode(message)
        } else {
            StripeError::Api {
                status: status.as_u16(),
                code,
                message,
            }
        }
    }
}

#[cfg(test)]
#[path = "client_test.rs"]
mod tests;
