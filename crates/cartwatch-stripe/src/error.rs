use thiserror::Error;

/// Errors returned by the Stripe client.
#[derive(Debug, Error)]
pub enum StripeError {
    /// Network or TLS failure from the underlying HTTP client.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// HTTP 401: the secret key was rejected.
    #[error("Stripe rejected the API key: {0}")]
    Unauthorized(String),

    /// HTTP 429.
    #[error("rate limited by Stripe: {0}")]
    RateLimited(String),

    /// A promotion code with the same `code` already exists.
    #[error("promotion code already exists: {0}")]
    DuplicateCode(String),

    /// HTTP 5xx.
    #[error("Stripe server error {status}: {message}")]
    Server { status: u16, message: String },

    /// Any other non-2xx response.
    #[error("Stripe API error {status} ({code}): {message}")]
    Api {
        status: u16,
        code: String,
        message: String,
    },

    /// The response body could not be deserialized into the expected type.
    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid Stripe base URL '{url}': {reason}")]
    InvalidBaseUrl { url: String, reason: String },
}
