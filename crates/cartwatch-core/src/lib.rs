//! Domain types and configuration shared by every cartwatch crate.

pub mod app_config;
pub mod carts;
pub mod config;
pub mod promotions;

use thiserror::Error;

pub use app_config::{AppConfig, Environment, ReflagPolicy};
pub use carts::{AbandonedCartStatus, CartLine, CartLineAggregate, IdentityKey};
pub use config::{load_app_config, load_app_config_from_env};
pub use promotions::{
    generate_promo_code, CAMPAIGN_DISCOUNT_PERCENT, CAMPAIGN_DISCOUNT_TYPE, CAMPAIGN_NAME,
    PROMO_CODE_EXPIRY_DAYS, PROMO_CODE_MAX_USES, PROMO_CODE_PREFIX,
};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CoreError {
    #[error("cart identity must have exactly one of session_id or user_id")]
    InvalidIdentity,

    #[error("invalid cart aggregate for {identity}: {reason}")]
    InvalidAggregate { identity: String, reason: String },

    #[error("unknown abandoned cart status: {0}")]
    UnknownStatus(String),
}
