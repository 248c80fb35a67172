//! One-off runs of the background jobs.

use std::sync::Arc;

use cartwatch_core::AppConfig;
use cartwatch_recovery::{CartStore, PgCartStore};
use chrono::Utc;

fn build(
    pool: &sqlx::PgPool,
    config: &AppConfig,
) -> anyhow::Result<(cartwatch_recovery::CartScanner, cartwatch_recovery::Sweeper)> {
    let store: Arc<dyn CartStore> = Arc::new(PgCartStore::new(pool.clone()));
    let discounts = cartwatch_recovery::discount_provider_from_config(config)?;
    Ok(cartwatch_recovery::build_jobs(config, store, discounts)?)
}

/// Runs a single scan cycle and prints its counters.
///
/// # Errors
///
/// Returns an error if the stale-cart query fails or the Stripe client
/// cannot be built.
pub(crate) async fn run_scan(pool: &sqlx::PgPool, config: &AppConfig) -> anyhow::Result<()> {
    if !config.promotions_enabled() {
        eprintln!("note: STRIPE_SECRET_KEY not set, promotion codes will not be issued");
    }
    let (scanner, _) = build(pool, config)?;
    let report = scanner.run_cycle(Utc::now()).await?;

    println!("stale carts found:   {}", report.found);
    println!("newly recorded:      {}", report.recorded);
    println!("promotions issued:   {}", report.promotions_issued);
    println!("already recorded:    {}", report.already_recorded);
    println!("skipped (invalid):   {}", report.skipped_invalid);
    println!("failed:              {}", report.failed);
    Ok(())
}

/// Runs the lifecycle sweep once.
///
/// # Errors
///
/// Returns an error if either bulk statement fails.
pub(crate) async fn run_sweep(pool: &sqlx::PgPool, config: &AppConfig) -> anyhow::Result<()> {
    let (_, sweeper) = build(pool, config)?;
    let report = sweeper.run(Utc::now()).await?;

    println!(
        "expired {} cart(s) older than {} days",
        report.expired, config.expire_after_days
    );
    println!(
        "deleted {} cart(s) older than {} days",
        report.deleted, config.delete_after_days
    );
    Ok(())
}
