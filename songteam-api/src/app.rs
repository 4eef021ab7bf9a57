/// Application state and router builder
///
/// This module defines the shared application state and provides
/// a function to build the Axum router with all routes and middleware.
///
/// # Example
///
/// ```no_run
/// use songteam_api::{app::AppState, config::Config};
/// use songteam_worker::generator::MockGenerator;
/// use sqlx::PgPool;
/// use std::sync::Arc;
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// let pool = PgPool::connect(&config.database.url).await?;
/// let state = AppState::new(pool, config, Arc::new(MockGenerator::succeeding()));
/// let app = songteam_api::app::build_router(state);
/// # Ok(())
/// # }
/// ```

use crate::{
    config::Config,
    error::ApiError,
    middleware::{rate_limit::rate_limit_layer, security::SecurityHeadersLayer},
    stripe::StripeClient,
};
use axum::{
    extract::{Request, State},
    http::{header, HeaderValue, Method},
    middleware::{from_fn_with_state, Next},
    response::Response,
    routing::{get, post},
    Router,
};
use songteam_shared::auth::middleware::authenticate;
use songteam_worker::generator::SongGenerator;
use songteam_worker::pipeline::{GenerationStore, PgGenerationStore};
use songteam_worker::timeout::GenerationTimeout;
use sqlx::PgPool;
use std::sync::Arc;
use tower_http::{
    compression::CompressionLayer,
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

/// Shared application state
///
/// This is cloned for each request handler via Axum's `State` extractor.
/// Uses Arc internally for cheap cloning.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: PgPool,

    /// Application configuration
    pub config: Arc<Config>,

    /// Song engine used by the detached generation task
    pub generator: Arc<dyn SongGenerator>,

    /// Where generation outcomes are recorded
    pub store: Arc<dyn GenerationStore>,

    /// Stripe API client, present when a secret key is configured
    pub stripe: Option<StripeClient>,

    /// Redis connection for rate limiting; `None` disables it
    pub redis: Option<redis::aio::ConnectionManager>,

    /// Bound on a single generation call
    pub generation_timeout: GenerationTimeout,
}

impl AppState {
    /// Creates new application state
    pub fn new(db: PgPool, config: Config, generator: Arc<dyn SongGenerator>) -> Self {
        let stripe = config.stripe.secret_key.as_ref().map(|key| {
            StripeClient::new(reqwest::Client::new(), config.stripe.api_base.clone(), key.clone())
        });
        let generation_timeout = GenerationTimeout::from_config(config.generation.timeout_secs);

        Self {
            store: Arc::new(PgGenerationStore::new(db.clone())),
            db,
            config: Arc::new(config),
            generator,
            stripe,
            redis: None,
            generation_timeout,
        }
    }

    /// Enables Redis-backed rate limiting
    pub fn with_redis(mut self, redis: redis::aio::ConnectionManager) -> Self {
        self.redis = Some(redis);
        self
    }

    /// Replaces the generation store (tests record outcomes in memory)
    pub fn with_store(mut self, store: Arc<dyn GenerationStore>) -> Self {
        self.store = store;
        self
    }

    /// Gets JWT secret for token operations
    pub fn jwt_secret(&self) -> &str {
        &self.config.jwt.secret
    }
}

/// Builds the complete Axum router with all routes and middleware
///
/// # Architecture
///
/// ```text
/// /
/// ├── /health                               # Health check (public)
/// └── /v1/
///     ├── POST /billing/webhook             # Stripe webhook (signature checked)
///     └── (JWT + rate limit)
///         ├── /teams/
///         │   ├── POST /                    # Create team
///         │   ├── GET  /                    # Caller's teams
///         │   ├── POST /join                # Join by code
///         │   ├── GET  /:id
///         │   ├── GET  /:id/members
///         │   ├── POST /:id/accomplishments
///         │   ├── GET  /:id/accomplishments
///         │   ├── GET  /:id/songs
///         │   └── GET  /:id/credits
///         ├── POST /songs/generate
///         ├── GET  /songs/:id
///         ├── GET  /genres
///         ├── GET  /billing/plans
///         ├── POST /billing/checkout
///         └── POST /admin/grant-credits
/// ```
///
/// # Middleware Stack
///
/// Applied in order (bottom to top):
/// 1. Logging (tower-http TraceLayer)
/// 2. Response compression
/// 3. CORS (tower-http CorsLayer)
/// 4. Security headers
/// 5. Authentication and rate limiting (authenticated routes only)
pub fn build_router(state: AppState) -> Router {
    use crate::routes;

    // Health check (public, no auth)
    let health_routes = Router::new().route("/health", get(routes::health::health_check));

    // Stripe calls this directly; it authenticates with the signature header
    let webhook_routes =
        Router::new().route("/billing/webhook", post(routes::billing::stripe_webhook));

    let team_routes = Router::new()
        .route(
            "/",
            post(routes::teams::create_team).get(routes::teams::list_teams),
        )
        .route("/join", post(routes::teams::join_team))
        .route("/:id", get(routes::teams::get_team))
        .route("/:id/members", get(routes::teams::list_members))
        .route(
            "/:id/accomplishments",
            post(routes::accomplishments::create_accomplishment)
                .get(routes::accomplishments::list_accomplishments),
        )
        .route("/:id/songs", get(routes::songs::list_team_songs))
        .route("/:id/credits", get(routes::credits::get_credits));

    let authenticated_routes = Router::new()
        .nest("/teams", team_routes)
        .route("/songs/generate", post(routes::songs::generate_song))
        .route("/songs/:id", get(routes::songs::get_song))
        .route("/genres", get(routes::songs::list_genres))
        .route("/billing/plans", get(routes::billing::list_plans))
        .route("/billing/checkout", post(routes::billing::create_checkout))
        .route("/admin/grant-credits", post(routes::admin::grant_credits))
        .layer(from_fn_with_state(state.clone(), rate_limit_layer))
        .layer(from_fn_with_state(state.clone(), jwt_auth_layer));

    let v1_routes = Router::new()
        .merge(webhook_routes)
        .merge(authenticated_routes);

    // Configure CORS based on environment
    let cors = if state.config.api.cors_origins.iter().any(|o| o == "*") {
        // Development mode: permissive CORS
        CorsLayer::permissive()
    } else {
        let origins: Vec<HeaderValue> = state
            .config
            .api
            .cors_origins
            .iter()
            .filter_map(|origin| origin.parse().ok())
            .collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
            .allow_credentials(true)
            .max_age(std::time::Duration::from_secs(3600))
    };

    Router::new()
        .merge(health_routes)
        .nest("/v1", v1_routes)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(CompressionLayer::new())
        .layer(cors)
        .layer(SecurityHeadersLayer::new(state.config.api.production))
        .with_state(state)
}

/// JWT authentication middleware layer
///
/// Validates the bearer token, then injects `AuthContext` into request
/// extensions.
async fn jwt_auth_layer(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let header = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    let auth_context = authenticate(header, state.jwt_secret(), &state.config.jwt.audience)?;

    req.extensions_mut().insert(auth_context);

    Ok(next.run(req).await)
}
