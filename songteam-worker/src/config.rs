/// Worker configuration
///
/// # Environment Variables
///
/// - `DATABASE_URL`: PostgreSQL connection string (required)
/// - `DATABASE_MAX_CONNECTIONS`: Pool size (default: 10)
/// - `REAPER_INTERVAL_SECS`: Time between sweeps (default: 60)
/// - `SONG_STALE_AFTER_SECS`: Age at which a `generating` song is reaped
///   (default: 900)
/// - `SONG_GENERATION_TIMEOUT_SECS`: Generation call bound (default: 300);
///   the stale age must exceed it or live generations would be reaped

use crate::reaper::ReaperConfig;
use crate::timeout::{GenerationTimeout, DEFAULT_STALE_AFTER};
use songteam_shared::db::pool::DatabaseConfig;
use std::env;
use std::time::Duration;

/// Worker configuration
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub database: DatabaseConfig,
    pub reaper: ReaperConfig,
    pub generation_timeout: GenerationTimeout,
}

fn env_u64(name: &str) -> anyhow::Result<Option<u64>> {
    match env::var(name) {
        Ok(value) => value
            .parse::<u64>()
            .map(Some)
            .map_err(|_| anyhow::anyhow!("{} must be a positive integer, got {:?}", name, value)),
        Err(_) => Ok(None),
    }
}

impl WorkerConfig {
    /// Loads configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if `DATABASE_URL` is missing, a number fails to
    /// parse, or the stale age does not exceed the generation timeout.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let database = DatabaseConfig::from_env()?;

        let interval = env_u64("REAPER_INTERVAL_SECS")?
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(60));
        let stale_after = env_u64("SONG_STALE_AFTER_SECS")?
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_STALE_AFTER);
        let generation_timeout =
            GenerationTimeout::from_config(env_u64("SONG_GENERATION_TIMEOUT_SECS")?);

        let config = WorkerConfig {
            database,
            reaper: ReaperConfig {
                interval,
                stale_after,
                ..ReaperConfig::default()
            },
            generation_timeout,
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.reaper.interval.is_zero() {
            anyhow::bail!("REAPER_INTERVAL_SECS must be greater than zero");
        }
        if self.reaper.stale_after <= self.generation_timeout.duration() {
            anyhow::bail!(
                "SONG_STALE_AFTER_SECS ({}s) must exceed the generation timeout ({}s)",
                self.reaper.stale_after.as_secs(),
                self.generation_timeout.duration().as_secs()
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(stale_after: u64, timeout: u64) -> WorkerConfig {
        WorkerConfig {
            database: DatabaseConfig {
                url: "postgresql://localhost/test".to_string(),
                ..Default::default()
            },
            reaper: ReaperConfig {
                stale_after: Duration::from_secs(stale_after),
                ..ReaperConfig::default()
            },
            generation_timeout: GenerationTimeout::new(Duration::from_secs(timeout)),
        }
    }

    #[test]
    fn test_validate_accepts_defaults() {
        assert!(config(900, 300).validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_stale_age_below_timeout() {
        let err = config(120, 300).validate().unwrap_err();
        assert!(err.to_string().contains("must exceed the generation timeout"));
    }
}
