//! Seed data script - loads the demo accounts, categories and sample stock
//!
//! Run with: cargo run --bin seed-data -- --database-url sqlite://moune.db?mode=rwc

use anyhow::Context;
use clap::Parser;
use std::sync::Arc;
use tracing::info;

use moune_storefront::{config, db, seed};

#[derive(Parser)]
#[command(name = "seed-data", about = "Load Moune demo data", version)]
struct Cli {
    #[arg(
        long,
        env = "DATABASE_URL",
        help = "Database URL; defaults to the configured database_url"
    )]
    database_url: Option<String>,

    #[arg(long, help = "Skip running migrations before seeding")]
    skip_migrations: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let cli = Cli::parse();
    let mut cfg = config::load_config().context("failed to load configuration")?;
    if let Some(url) = cli.database_url {
        cfg.database_url = url;
    }

    info!("Connecting to database: {}", cfg.database_url);
    let pool = db::establish_connection_from_app_config(&cfg).await?;
    if !cli.skip_migrations {
        db::run_migrations(&pool).await?;
    }

    let summary = seed::seed(Arc::new(pool)).await?;
    info!(
        users = summary.users,
        categories = summary.categories,
        warehouses = summary.warehouses,
        products = summary.products,
        orders = summary.orders,
        "seed data complete"
    );
    info!(
        "Admin login: {} / {}",
        seed::ADMIN_USERNAME,
        seed::ADMIN_PASSWORD
    );
    info!(
        "Customer login: {} / {}",
        seed::CUSTOMER_EMAIL,
        seed::CUSTOMER_PASSWORD
    );
    Ok(())
}
