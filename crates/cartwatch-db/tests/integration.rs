//! Offline unit tests for cartwatch-db pool configuration and row types.
//! These tests do not require a live database connection.

use cartwatch_core::{
    AbandonedCartStatus, AppConfig, CartLineAggregate, CoreError, Environment, IdentityKey,
    ReflagPolicy,
};
use cartwatch_db::{AbandonedCartRow, PoolConfig, StaleCartRow};
use chrono::Utc;
use uuid::Uuid;

#[test]
fn pool_config_from_app_config_uses_core_values() {
    let app_config = AppConfig {
        database_url: "postgres://example".to_string(),
        env: Environment::Test,
        log_level: "info".to_string(),
        db_max_connections: 42,
        db_min_connections: 7,
        db_acquire_timeout_secs: 9,
        scan_interval_secs: 300,
        abandon_threshold_mins: 30,
        expire_after_days: 30,
        delete_after_days: 90,
        sweep_cron: "0 0 3 * * *".to_string(),
        reflag_policy: ReflagPolicy::Never,
        stripe_secret_key: None,
        stripe_base_url: "https://api.stripe.com/".to_string(),
        stripe_timeout_secs: 30,
        stripe_max_retries: 2,
    };

    let pool_config = PoolConfig::from_app_config(&app_config);
    assert_eq!(pool_config.max_connections, 42);
    assert_eq!(pool_config.min_connections, 7);
    assert_eq!(pool_config.acquire_timeout_secs, 9);
}

#[test]
fn stale_row_converts_to_session_aggregate() {
    let now = Utc::now();
    let row = StaleCartRow {
        session_id: Some("sess_1".to_string()),
        user_id: None,
        last_modified: now,
        item_count: 2,
        total_cents: 2000,
    };

    let agg = CartLineAggregate::try_from(row).expect("valid row");
    assert_eq!(agg.identity, IdentityKey::Session("sess_1".to_string()));
    assert_eq!(agg.item_count, 2);
    assert_eq!(agg.total_cents, 2000);
    assert_eq!(agg.last_modified, now);
}

#[test]
fn stale_row_with_both_identities_is_rejected() {
    let row = StaleCartRow {
        session_id: Some("sess_1".to_string()),
        user_id: Some("user_1".to_string()),
        last_modified: Utc::now(),
        item_count: 1,
        total_cents: 100,
    };

    assert_eq!(
        CartLineAggregate::try_from(row),
        Err(CoreError::InvalidIdentity)
    );
}

#[test]
fn stale_row_with_overflowing_count_is_rejected() {
    let row = StaleCartRow {
        session_id: None,
        user_id: Some("user_1".to_string()),
        last_modified: Utc::now(),
        item_count: i64::from(i32::MAX) + 1,
        total_cents: 100,
    };

    assert!(matches!(
        CartLineAggregate::try_from(row),
        Err(CoreError::InvalidAggregate { .. })
    ));
}

/// Compile-time smoke test: confirm that [`AbandonedCartRow`] exposes its
/// identity and status as domain types. No database required.
#[test]
fn abandoned_cart_row_exposes_domain_views() {
    let row = AbandonedCartRow {
        id: Uuid::now_v7(),
        session_id: None,
        user_id: Some("user_42".to_string()),
        customer_email: Some("first@buyer.com".to_string()),
        customer_name: Some("First Buyer".to_string()),
        cart_value_cents: 2000,
        item_count: 2,
        abandoned_at: Utc::now(),
        status: "expired".to_string(),
        promotion_code_id: None,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    };

    assert_eq!(row.identity().unwrap(), IdentityKey::User("user_42".to_string()));
    assert_eq!(row.status().unwrap(), AbandonedCartStatus::Expired);
}
