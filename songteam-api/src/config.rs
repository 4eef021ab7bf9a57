/// Configuration management for the API server
///
/// This module loads configuration from environment variables and provides
/// a type-safe configuration struct.
///
/// # Environment Variables
///
/// - `API_HOST`: Host to bind to (default: 0.0.0.0)
/// - `API_PORT`: Port to bind to (default: 8080)
/// - `CORS_ORIGINS`: Comma-separated origins, `*` for any (default: *)
/// - `PRODUCTION`: Enables HSTS and requires a real song engine (default: false)
/// - `APP_URL`: Public web app URL used for checkout redirects
///   (default: http://localhost:3000)
/// - `DATABASE_URL`: PostgreSQL connection string (required)
/// - `DATABASE_MAX_CONNECTIONS`: Pool size (default: 10)
/// - `JWT_SECRET`: HS256 secret shared with the identity provider (required,
///   at least 32 characters)
/// - `JWT_AUDIENCE`: Expected `aud` claim (default: authenticated)
/// - `STRIPE_SECRET_KEY`, `STRIPE_WEBHOOK_SECRET`: Stripe credentials
/// - `STRIPE_PRICE_ID_STARTER`, `STRIPE_PRICE_ID_PRO`,
///   `STRIPE_PRICE_ID_CORPORATE`: Price ids per credit pack
/// - `STRIPE_API_BASE`: Stripe API base URL (default: https://api.stripe.com)
/// - `SONG_GENERATION_API_URL`, `SONG_GENERATION_API_KEY`: Song engine
/// - `SONG_GENERATION_TIMEOUT_SECS`: Generation call bound (default: 300)
/// - `REDIS_URL`: Enables rate limiting when set
/// - `RATE_LIMIT_PER_MINUTE`: Requests per user per minute (default: 60)
/// - `NEW_TEAM_CREDITS`: Credits granted to a freshly created team (default: 0)
///
/// # Example
///
/// ```no_run
/// use songteam_api::config::Config;
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// println!("Server will listen on {}:{}", config.api.host, config.api.port);
/// # Ok(())
/// # }
/// ```

use serde::{Deserialize, Serialize};
use songteam_shared::auth::jwt::DEFAULT_AUDIENCE;
use songteam_shared::pricing::PricingPlan;
use std::env;

/// Complete application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// API server configuration
    pub api: ApiConfig,

    /// Database configuration
    pub database: DatabaseConfig,

    /// JWT configuration
    pub jwt: JwtConfig,

    /// Stripe configuration
    pub stripe: StripeConfig,

    /// Song engine configuration
    pub generation: GenerationConfig,

    /// Rate limiting configuration
    pub rate_limit: RateLimitConfig,

    /// Credits granted when a team is created
    pub new_team_credits: i32,
}

/// API server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Host to bind to
    pub host: String,

    /// Port to bind to
    pub port: u16,

    /// Allowed CORS origins
    pub cors_origins: Vec<String>,

    /// Production mode
    pub production: bool,

    /// Public web app URL
    pub app_url: String,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,

    /// Maximum number of connections in pool
    pub max_connections: u32,
}

/// JWT configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtConfig {
    /// Secret key for JWT validation
    ///
    /// IMPORTANT: This must be kept secret and should be at least 32 bytes.
    pub secret: String,

    /// Expected audience
    pub audience: String,
}

/// Stripe configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StripeConfig {
    pub secret_key: Option<String>,
    pub webhook_secret: Option<String>,
    pub price_id_starter: Option<String>,
    pub price_id_pro: Option<String>,
    pub price_id_corporate: Option<String>,
    pub api_base: String,
}

impl StripeConfig {
    /// Stripe price id configured for a plan
    pub fn price_id(&self, plan: PricingPlan) -> Option<&str> {
        match plan {
            PricingPlan::Starter => self.price_id_starter.as_deref(),
            PricingPlan::Pro => self.price_id_pro.as_deref(),
            PricingPlan::Corporate => self.price_id_corporate.as_deref(),
        }
    }
}

/// Song engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// Full URL of the generation endpoint; unset means the mock generator
    pub api_url: Option<String>,

    /// Shared secret sent in `x-song-engine-secret`
    pub api_key: String,

    /// Bound on a single generation call
    pub timeout_secs: Option<u64>,
}

/// Rate limiting configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Redis URL; rate limiting is off when unset
    pub redis_url: Option<String>,

    /// Requests per user per minute
    pub requests_per_minute: u32,
}

fn optional(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

impl Config {
    /// Loads configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Required environment variables are missing
    /// - Environment variables have invalid values
    ///
    /// # Example
    ///
    /// ```no_run
    /// use songteam_api::config::Config;
    ///
    /// # fn example() -> anyhow::Result<()> {
    /// let config = Config::from_env()?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn from_env() -> anyhow::Result<Self> {
        // Load .env file if present (for development)
        dotenvy::dotenv().ok();

        let api_host = env::var("API_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let api_port = env::var("API_PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse::<u16>()?;

        let cors_origins = env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "*".to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let production = env::var("PRODUCTION")
            .map(|v| v == "true" || v == "1")
            .unwrap_or(false);

        let app_url = env::var("APP_URL")
            .unwrap_or_else(|_| "http://localhost:3000".to_string())
            .trim_end_matches('/')
            .to_string();

        let database_url = env::var("DATABASE_URL")
            .map_err(|_| anyhow::anyhow!("DATABASE_URL environment variable is required"))?;

        let max_connections = env::var("DATABASE_MAX_CONNECTIONS")
            .unwrap_or_else(|_| "10".to_string())
            .parse::<u32>()?;

        let jwt_secret = env::var("JWT_SECRET")
            .map_err(|_| anyhow::anyhow!("JWT_SECRET environment variable is required"))?;

        if jwt_secret.len() < 32 {
            anyhow::bail!("JWT_SECRET must be at least 32 characters long");
        }

        let jwt_audience =
            env::var("JWT_AUDIENCE").unwrap_or_else(|_| DEFAULT_AUDIENCE.to_string());

        let stripe = StripeConfig {
            secret_key: optional("STRIPE_SECRET_KEY"),
            webhook_secret: optional("STRIPE_WEBHOOK_SECRET"),
            price_id_starter: optional("STRIPE_PRICE_ID_STARTER"),
            price_id_pro: optional("STRIPE_PRICE_ID_PRO"),
            price_id_corporate: optional("STRIPE_PRICE_ID_CORPORATE"),
            api_base: env::var("STRIPE_API_BASE")
                .unwrap_or_else(|_| "https://api.stripe.com".to_string())
                .trim_end_matches('/')
                .to_string(),
        };

        let generation = GenerationConfig {
            api_url: optional("SONG_GENERATION_API_URL"),
            api_key: env::var("SONG_GENERATION_API_KEY").unwrap_or_default(),
            timeout_secs: optional("SONG_GENERATION_TIMEOUT_SECS")
                .map(|v| v.parse::<u64>())
                .transpose()?,
        };

        if production && generation.api_url.is_none() {
            anyhow::bail!("SONG_GENERATION_API_URL is required in production");
        }

        let rate_limit = RateLimitConfig {
            redis_url: optional("REDIS_URL"),
            requests_per_minute: env::var("RATE_LIMIT_PER_MINUTE")
                .unwrap_or_else(|_| "60".to_string())
                .parse::<u32>()?,
        };

        let new_team_credits = env::var("NEW_TEAM_CREDITS")
            .unwrap_or_else(|_| "0".to_string())
            .parse::<i32>()?;

        if new_team_credits < 0 {
            anyhow::bail!("NEW_TEAM_CREDITS must not be negative");
        }

        Ok(Self {
            api: ApiConfig {
                host: api_host,
                port: api_port,
                cors_origins,
                production,
                app_url,
            },
            database: DatabaseConfig {
                url: database_url,
                max_connections,
            },
            jwt: JwtConfig {
                secret: jwt_secret,
                audience: jwt_audience,
            },
            stripe,
            generation,
            rate_limit,
            new_team_credits,
        })
    }

    /// Returns the server bind address
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.api.host, self.api.port)
    }

    /// Configuration suitable for tests; no external services
    pub fn for_tests(database_url: &str, jwt_secret: &str) -> Self {
        Config {
            api: ApiConfig {
                host: "127.0.0.1".to_string(),
                port: 0,
                cors_origins: vec!["*".to_string()],
                production: false,
                app_url: "http://localhost:3000".to_string(),
            },
            database: DatabaseConfig {
                url: database_url.to_string(),
                max_connections: 5,
            },
            jwt: JwtConfig {
                secret: jwt_secret.to_string(),
                audience: DEFAULT_AUDIENCE.to_string(),
            },
            stripe: StripeConfig {
                api_base: "https://api.stripe.com".to_string(),
                ..Default::default()
            },
            generation: GenerationConfig {
                api_url: None,
                api_key: String::new(),
                timeout_secs: None,
            },
            rate_limit: RateLimitConfig {
                redis_url: None,
                requests_per_minute: 60,
            },
            new_team_credits: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bind_address() {
        let mut config = Config::for_tests(
            "postgresql://localhost/test",
            "test-secret-key-at-least-32-bytes-long",
        );
        config.api.port = 8080;

        assert_eq!(config.bind_address(), "127.0.0.1:8080");
    }

    #[test]
    fn test_price_id_per_plan() {
        let stripe = StripeConfig {
            price_id_starter: Some("price_starter".to_string()),
            price_id_pro: Some("price_pro".to_string()),
            ..Default::default()
        };

        assert_eq!(stripe.price_id(PricingPlan::Starter), Some("price_starter"));
        assert_eq!(stripe.price_id(PricingPlan::Pro), Some("price_pro"));
        assert_eq!(stripe.price_id(PricingPlan::Corporate), None);
    }
}
