//! Minimal Stripe client for the coupon and promotion-code endpoints used by
//! abandoned-cart recovery.

mod client;
mod error;
mod retry;
mod types;

pub use client::{StripeClient, DEFAULT_BACKOFF_BASE_MS, DEFAULT_BASE_URL};
pub use error::StripeError;
pub use types::{Coupon, PromotionCode, PromotionCodeRequest};
