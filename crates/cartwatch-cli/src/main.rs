mod carts;
mod jobs;

use cartwatch_core::AbandonedCartStatus;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

#[derive(Debug, Parser)]
#[command(name = "cartwatch-cli")]
#[command(about = "Abandoned-cart recovery operator tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run one scan cycle now
    Scan,
    /// Expire and delete aged abandoned-cart records now
    Sweep,
    /// Apply pending database migrations
    Migrate,
    /// List recent abandoned carts
    List {
        /// Only show carts with this status (active or expired)
        #[arg(long)]
        status: Option<AbandonedCartStatus>,
        /// Maximum number of carts to show
        #[arg(long, default_value = "20")]
        limit: u32,
    },
    /// Show one abandoned cart with its snapshot lines
    Show {
        /// Abandoned cart id
        id: Uuid,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config = cartwatch_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    tracing::debug!(command = ?cli.command, env = %config.env, "cartwatch-cli starting");

    let pool_config = cartwatch_db::PoolConfig::from_app_config(&config);
    let pool = cartwatch_db::connect_pool(&config.database_url, pool_config).await?;

    let result = match cli.command {
        Commands::Migrate => {
            let applied = cartwatch_db::run_migrations(&pool).await?;
            println!("applied {applied} migration(s)");
            Ok(())
        }
        Commands::Scan => jobs::run_scan(&pool, &config).await,
        Commands::Sweep => jobs::run_sweep(&pool, &config).await,
        Commands::List { status, limit } => {
            carts::run_list(&pool, status, i64::from(limit)).await
        }
        Commands::Show { id } => carts::run_show(&pool, id).await,
    };

    pool.close().await;
    result
}
