use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

/// Whether an identity that already has an abandoned-cart record may be
/// flagged again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReflagPolicy {
    /// Any existing record, active or expired, suppresses detection.
    #[default]
    Never,
    /// Only active records suppress detection. An identity whose records are
    /// all expired is flagged again once its cart changed after the latest
    /// recorded abandonment.
    AfterExpiry,
}

impl FromStr for ReflagPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "never" => Ok(Self::Never),
            "after_expiry" => Ok(Self::AfterExpiry),
            other => Err(format!(
                "expected \"never\" or \"after_expiry\", got \"{other}\""
            )),
        }
    }
}

#[derive(Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub env: Environment,
    pub log_level: String,
    pub db_max_connections: u32,
    pub db_min_connections: u32,
    pub db_acquire_timeout_secs: u64,
    pub scan_interval_secs: u64,
    pub abandon_threshold_mins: i64,
    pub expire_after_days: i64,
    pub delete_after_days: i64,
    pub sweep_cron: String,
    pub reflag_policy: ReflagPolicy,
    pub stripe_secret_key: Option<String>,
    pub stripe_base_url: String,
    pub stripe_timeout_secs: u64,
    pub stripe_max_retries: u32,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("log_level", &self.log_level)
            .field("database_url", &"[redacted]")
            .field("db_max_connections", &self.db_max_connections)
            .field("db_min_connections", &self.db_min_connections)
            .field("db_acquire_timeout_secs", &self.db_acquire_timeout_secs)
            .field("scan_interval_secs", &self.scan_interval_secs)
            .field("abandon_threshold_mins", &self.abandon_threshold_mins)
            .field("expire_after_days", &self.expire_after_days)
            .field("delete_after_days", &self.delete_after_days)
            .field("sweep_cron", &self.sweep_cron)
            .field("reflag_policy", &self.reflag_policy)
            .field(
                "stripe_secret_key",
                &self.stripe_secret_key.as_ref().map(|_| "[redacted]"),
            )
            .field("stripe_base_url", &self.stripe_base_url)
            .field("stripe_timeout_secs", &self.stripe_timeout_secs)
            .field("stripe_max_retries", &self.stripe_max_retries)
            .finish()
    }
}

impl AppConfig {
    /// Returns `true` when discount codes can be issued.
    #[must_use]
    pub fn promotions_enabled(&self) -> bool {
        self.stripe_secret_key
            .as_deref()
            .is_some_and(|key| !key.trim().is_empty())
    }
}
