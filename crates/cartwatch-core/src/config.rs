use crate::app_config::{AppConfig, Environment, ReflagPolicy};
use crate::ConfigError;

/// Upper bound for the expiry and deletion windows.
pub const MAX_WINDOW_DAYS: i64 = 3650;

/// Upper bound for the abandonment threshold, matching [`MAX_WINDOW_DAYS`].
pub const MAX_ABANDON_THRESHOLD_MINS: i64 = MAX_WINDOW_DAYS * 24 * 60;

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// Decoupled from the real environment so tests can drive it from a `HashMap`.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    let require = |var: &str| -> Result<String, ConfigError> {
        lookup(var).map_err(|_| ConfigError::MissingEnvVar(var.to_string()))
    };

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let invalid = |var: &str, reason: String| ConfigError::InvalidEnvVar {
        var: var.to_string(),
        reason,
    };

    let parse_u32 = |var: &str, default: &str| -> Result<u32, ConfigError> {
        or_default(var, default)
            .parse::<u32>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        or_default(var, default)
            .parse::<u64>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_window = |var: &str, default: &str, max: i64| -> Result<i64, ConfigError> {
        let value = or_default(var, default)
            .parse::<i64>()
            .map_err(|e| invalid(var, e.to_string()))?;
        if !(1..=max).contains(&value) {
            return Err(invalid(var, format!("must be between 1 and {max}, got {value}")));
        }
        Ok(value)
    };

    let database_url = require("DATABASE_URL")?;

    let env = parse_environment(&or_default("CARTWATCH_ENV", "development"))?;
    let log_level = or_default("CARTWATCH_LOG_LEVEL", "info");

    let db_max_connections = parse_u32("CARTWATCH_DB_MAX_CONNECTIONS", "10")?;
    let db_min_connections = parse_u32("CARTWATCH_DB_MIN_CONNECTIONS", "1")?;
    let db_acquire_timeout_secs = parse_u64("CARTWATCH_DB_ACQUIRE_TIMEOUT_SECS", "10")?;
    if db_min_connections > db_max_connections {
        return Err(invalid(
            "CARTWATCH_DB_MIN_CONNECTIONS",
            format!("{db_min_connections} exceeds max connections {db_max_connections}"),
        ));
    }

    let scan_interval_secs = parse_u64("CARTWATCH_SCAN_INTERVAL_SECS", "300")?;
    if scan_interval_secs == 0 {
        return Err(invalid(
            "CARTWATCH_SCAN_INTERVAL_SECS",
            "must be at least 1".to_string(),
        ));
    }
    let abandon_threshold_mins = parse_window(
        "CARTWATCH_ABANDON_THRESHOLD_MINS",
        "30",
        MAX_ABANDON_THRESHOLD_MINS,
    )?;
    let expire_after_days = parse_window("CARTWATCH_EXPIRE_AFTER_DAYS", "30", MAX_WINDOW_DAYS)?;
    let delete_after_days = parse_window("CARTWATCH_DELETE_AFTER_DAYS", "90", MAX_WINDOW_DAYS)?;
    if delete_after_days <= expire_after_days {
        return Err(invalid(
            "CARTWATCH_DELETE_AFTER_DAYS",
            format!("{delete_after_days} must exceed the expiry window of {expire_after_days} days"),
        ));
    }
    let sweep_cron = or_default("CARTWATCH_SWEEP_CRON", "0 0 3 * * *");
    let reflag_policy = or_default("CARTWATCH_REFLAG_POLICY", "never")
        .parse::<ReflagPolicy>()
        .map_err(|reason| invalid("CARTWATCH_REFLAG_POLICY", reason))?;

    let stripe_secret_key = lookup("STRIPE_SECRET_KEY")
        .ok()
        .filter(|key| !key.trim().is_empty());
    let stripe_base_url = or_default("CARTWATCH_STRIPE_BASE_URL", "https://api.stripe.com/");
    let stripe_timeout_secs = parse_u64("CARTWATCH_STRIPE_TIMEOUT_SECS", "30")?;
    let stripe_max_retries = parse_u32("CARTWATCH_STRIPE_MAX_RETRIES", "2")?;

    Ok(AppConfig {
        database_url,
        env,
        log_level,
        db_max_connections,
        db_min_connections,
        db_acquire_timeout_secs,
        scan_interval_secs,
        abandon_threshold_mins,
        expire_after_days,
        delete_after_days,
        sweep_cron,
        reflag_policy,
        stripe_secret_key,
        stripe_base_url,
        stripe_timeout_secs,
        stripe_max_retries,
    })
}

/// Parse a string into an `Environment` variant.
fn parse_environment(s: &str) -> Result<Environment, ConfigError> {
    match s {
        "development" => Ok(Environment::Development),
        "test" => Ok(Environment::Test),
        "production" => Ok(Environment::Production),
        other => Err(ConfigError::InvalidEnvVar {
            var: "CARTWATCH_ENV".to_string(),
            reason: format!("unknown environment \"{other}\""),
        }),
    }
}
