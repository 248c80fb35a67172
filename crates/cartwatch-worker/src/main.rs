mod scheduler;

use std::sync::Arc;
use std::time::Duration;

use cartwatch_recovery::{CartStore, PeriodicTask, PgCartStore};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = cartwatch_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    tracing::info!(env = %config.env, ?config, "cartwatch-worker starting");

    let pool_config = cartwatch_db::PoolConfig::from_app_config(&config);
    let pool = cartwatch_db::connect_pool(&config.database_url, pool_config).await?;
    let applied = cartwatch_db::run_migrations(&pool).await?;
    tracing::info!(applied, "migrations up to date");

    let store: Arc<dyn CartStore> = Arc::new(PgCartStore::new(pool.clone()));
    let discounts = cartwatch_recovery::discount_provider_from_config(&config)?;
    if !discounts.is_enabled() {
        tracing::warn!("STRIPE_SECRET_KEY not set; promotion codes will not be issued");
    }
    let (scanner, sweeper) = cartwatch_recovery::build_jobs(&config, store, discounts)?;

    let mut scheduler = scheduler::build_scheduler(sweeper, &config.sweep_cron).await?;

    let scanner = Arc::new(scanner);
    let scan_task = PeriodicTask::start(
        "cart-scanner",
        Duration::from_secs(config.scan_interval_secs),
        move || {
            let scanner = Arc::clone(&scanner);
            async move { scanner.run_cycle_logged().await }
        },
    );

    shutdown_signal().await;

    scan_task.stop().await;
    if let Err(e) = scheduler.shutdown().await {
        tracing::warn!(error = %e, "scheduler did not shut down cleanly");
    }
    pool.close().await;
    tracing::info!("cartwatch-worker stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("received shutdown signal, starting graceful shutdown");
}
