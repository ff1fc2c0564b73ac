//! One-shot payout sweep for cron: completes overdue deliveries and exits.

use dotenv::dotenv;
use gigmarket_backend::config::PayoutConfig;
use gigmarket_backend::services::payouts;
use gigmarket_backend::{bus, create_pool};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let database_url = std::env::var("DATABASE_URL").map_err(|_| "DATABASE_URL must be set")?;
    let redis_url = std::env::var("REDIS_URL").ok().filter(|v| !v.is_empty());
    let config = PayoutConfig::from_env();

    let db = create_pool(&database_url).await?;
    let bus = bus::connect(redis_url.as_deref()).await?;

    let report =
        payouts::sweep_overdue_deliveries(&db, bus.as_ref(), config.grace_period, chrono::Utc::now())
            .await?;

    tracing::info!(
        "Sweep finished: {} completed, {} skipped, {} failed",
        report.completed.len(),
        report.skipped,
        report.failed
    );

    if report.failed > 0 {
        std::process::exit(1);
    }
    Ok(())
}
