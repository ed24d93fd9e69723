mod settings;

use std::time::Duration;

use chrono::Utc;
use engine::settle_expired;
use settings::Settings;
use sqlx::postgres::PgPoolOptions;
use store::postgres::PgStore;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let settings = Settings::load().expect("failed to load sweep-worker configuration");

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&settings.database_url)
        .await
        .expect("failed to connect to database");

    let store = PgStore::new(pool);

    tracing::info!(
        interval_secs = settings.sweep_interval_secs,
        batch_size = settings.sweep_batch_size,
        "sweep worker starting"
    );

    let mut ticker = tokio::time::interval(Duration::from_secs(settings.sweep_interval_secs));
    loop {
        ticker.tick().await;
        let now = Utc::now();
        let result = settle_expired(&store, now, settings.sweep_batch_size).await;
        if result.failed > 0 {
            tracing::warn!(
                attempted = result.attempted,
                failed = result.failed,
                "sweep tick completed with failures"
            );
        } else {
            tracing::info!(attempted = result.attempted, "sweep tick completed");
        }
    }
}
