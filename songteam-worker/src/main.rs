//! # SongTeam Worker
//!
//! Background process that reaps songs left in `generating` (for example
//! after an API restart), marking them failed and refunding their credit.
//!
//! ## Usage
//!
//! ```bash
//! DATABASE_URL=postgresql://... cargo run -p songteam-worker
//! ```

use songteam_shared::db::pool::{create_pool, health_check};
use songteam_worker::config::WorkerConfig;
use songteam_worker::pipeline::PgGenerationStore;
use songteam_worker::reaper::SongReaper;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "songteam_worker=debug,songteam_shared=info".into());

    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    tracing::info!("SongTeam Worker v{} starting...", env!("CARGO_PKG_VERSION"));

    let config = WorkerConfig::from_env()?;

    let pool = create_pool(config.database.clone()).await?;
    health_check(&pool).await?;

    let reaper = SongReaper::new(
        Arc::new(PgGenerationStore::new(pool.clone())),
        config.reaper.clone(),
    );

    let shutdown = CancellationToken::new();
    let signal = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Shutdown signal received");
        }
        signal.cancel();
    });

    reaper.run(shutdown).await;

    pool.close().await;
    tracing::info!("Worker stopped");
    Ok(())
}
