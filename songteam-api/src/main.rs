//! # SongTeam API Server
//!
//! JSON API for teams, accomplishments, song generation, credits and
//! Stripe billing.
//!
//! ## Usage
//!
//! ```bash
//! DATABASE_URL=postgresql://... JWT_SECRET=... cargo run -p songteam-api
//! ```
//!
//! Set `LOG_FORMAT=json` for structured log output.

use songteam_api::{app, app::AppState, config::Config};
use songteam_shared::db::{
    migrations::run_migrations,
    pool::{create_pool, health_check, DatabaseConfig},
};
use songteam_worker::generator::{HttpSongGenerator, MockGenerator, SongGenerator};
use songteam_worker::timeout::GenerationTimeout;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "songteam_api=debug,songteam_worker=debug,tower_http=debug".into());

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

fn build_generator(config: &Config) -> anyhow::Result<Arc<dyn SongGenerator>> {
    match &config.generation.api_url {
        Some(url) => {
            let timeout = GenerationTimeout::from_config(config.generation.timeout_secs);
            let generator =
                HttpSongGenerator::new(url.clone(), config.generation.api_key.clone(), timeout.duration())?;
            tracing::info!(endpoint = %url, timeout_secs = timeout.duration().as_secs(), "Using song engine");
            Ok(Arc::new(generator))
        }
        None => {
            tracing::warn!("SONG_GENERATION_API_URL not set; songs will be produced by the mock generator");
            Ok(Arc::new(MockGenerator::succeeding()))
        }
    }
}

async fn connect_redis(url: &str) -> Option<redis::aio::ConnectionManager> {
    let client = match redis::Client::open(url) {
        Ok(client) => client,
        Err(e) => {
            tracing::warn!(error = %e, "Invalid REDIS_URL; rate limiting disabled");
            return None;
        }
    };

    match redis::aio::ConnectionManager::new(client).await {
        Ok(manager) => {
            tracing::info!("Rate limiting enabled");
            Some(manager)
        }
        Err(e) => {
            tracing::warn!(error = %e, "Redis unreachable; rate limiting disabled");
            None
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        return;
    }
    tracing::info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    tracing::info!("SongTeam API Server v{} starting...", env!("CARGO_PKG_VERSION"));

    let config = Config::from_env()?;

    let pool = create_pool(DatabaseConfig {
        url: config.database.url.clone(),
        max_connections: config.database.max_connections,
        ..DatabaseConfig::default()
    })
    .await?;
    health_check(&pool).await?;
    run_migrations(&pool).await?;

    let generator = build_generator(&config)?;

    let redis = match &config.rate_limit.redis_url {
        Some(url) => connect_redis(url).await,
        None => None,
    };

    if config.stripe.secret_key.is_none() {
        tracing::warn!("STRIPE_SECRET_KEY not set; checkout is disabled");
    }

    let bind_address = config.bind_address();

    let mut state = AppState::new(pool.clone(), config, generator);
    if let Some(redis) = redis {
        state = state.with_redis(redis);
    }

    let router = app::build_router(state);

    let listener = tokio::net::TcpListener::bind(&bind_address).await?;
    tracing::info!("Server listening on http://{}", bind_address);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    pool.close().await;
    tracing::info!("Server stopped");

    Ok(())
}
