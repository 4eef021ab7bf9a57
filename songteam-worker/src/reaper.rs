/// Stale song reaper
///
/// The API runs generation on a detached task. If that process dies mid-call
/// the song stays in `generating` forever and the team is out a credit. The
/// reaper periodically fails such songs and refunds them through the same
/// guarded path the pipeline uses, so a song that finishes at the last
/// moment is never refunded twice.
///
/// # Example
///
/// ```no_run
/// use songteam_worker::pipeline::PgGenerationStore;
/// use songteam_worker::reaper::{ReaperConfig, SongReaper};
/// use std::sync::Arc;
/// use tokio_util::sync::CancellationToken;
///
/// # async fn example(pool: sqlx::PgPool) {
/// let reaper = SongReaper::new(Arc::new(PgGenerationStore::new(pool)), ReaperConfig::default());
/// reaper.run(CancellationToken::new()).await;
/// # }
/// ```

use crate::generator::GeneratorError;
use crate::pipeline::{GenerationStore, PipelineError};
use crate::timeout::DEFAULT_STALE_AFTER;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Reaper configuration
#[derive(Debug, Clone)]
pub struct ReaperConfig {
    /// Time between sweeps
    pub interval: Duration,

    /// How long a song may sit in `generating`
    pub stale_after: Duration,

    /// Songs handled per sweep
    pub batch_size: i64,
}

impl Default for ReaperConfig {
    fn default() -> Self {
        ReaperConfig {
            interval: Duration::from_secs(60),
            stale_after: DEFAULT_STALE_AFTER,
            batch_size: 100,
        }
    }
}

/// Fails and refunds abandoned songs
pub struct SongReaper {
    store: Arc<dyn GenerationStore>,
    config: ReaperConfig,
}

impl SongReaper {
    pub fn new(store: Arc<dyn GenerationStore>, config: ReaperConfig) -> Self {
        SongReaper { store, config }
    }

    /// One pass over stale songs
    ///
    /// # Returns
    ///
    /// Number of songs this pass moved to `error`.
    pub async fn sweep(&self) -> Result<usize, PipelineError> {
        let stale_after = chrono::Duration::from_std(self.config.stale_after)
            .unwrap_or_else(|_| chrono::Duration::seconds(DEFAULT_STALE_AFTER.as_secs() as i64));
        let cutoff = Utc::now() - stale_after;

        let stale = self.store.stale_songs(cutoff, self.config.batch_size).await?;
        if stale.is_empty() {
            return Ok(0);
        }

        let message = GeneratorError::Timeout.to_string();
        let mut reaped = 0;

        for song in stale {
            match self
                .store
                .fail_and_refund(song.team_id, song.song_id, &message)
                .await
            {
                Ok(true) => {
                    tracing::warn!(
                        song_id = %song.song_id,
                        team_id = %song.team_id,
                        "Reaped stale song"
                    );
                    reaped += 1;
                }
                Ok(false) => {
                    tracing::debug!(song_id = %song.song_id, "Song settled before reaping");
                }
                Err(e) => {
                    tracing::error!(song_id = %song.song_id, error = %e, "Failed to reap song");
                }
            }
        }

        Ok(reaped)
    }

    /// Sweeps on an interval until `shutdown` is cancelled
    pub async fn run(&self, shutdown: CancellationToken) {
        tracing::info!(
            interval_secs = self.config.interval.as_secs(),
            stale_after_secs = self.config.stale_after.as_secs(),
            "Song reaper starting"
        );

        let mut ticker = tokio::time::interval(self.config.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    tracing::info!("Song reaper shut down");
                    break;
                }
                _ = ticker.tick() => {
                    match self.sweep().await {
                        Ok(0) => {}
                        Ok(count) => tracing::info!(count, "Reaper sweep finished"),
                        Err(e) => tracing::error!(error = %e, "Reaper sweep failed"),
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::testing::MemoryStore;
    use songteam_shared::models::song::SongStatus;
    use uuid::Uuid;

    fn reaper(store: Arc<MemoryStore>) -> SongReaper {
        SongReaper::new(
            store,
            ReaperConfig {
                interval: Duration::from_secs(1),
                stale_after: Duration::from_secs(600),
                batch_size: 10,
            },
        )
    }

    #[test]
    fn test_default_config() {
        let config = ReaperConfig::default();
        assert_eq!(config.interval, Duration::from_secs(60));
        assert_eq!(config.stale_after, DEFAULT_STALE_AFTER);
        assert_eq!(config.batch_size, 100);
    }

    #[tokio::test]
    async fn test_sweep_reaps_only_stale_songs() {
        let store = Arc::new(MemoryStore::default());
        let team_id = Uuid::new_v4();
        let stale = Uuid::new_v4();
        let fresh = Uuid::new_v4();
        store.insert_generating(team_id, stale, Utc::now() - chrono::Duration::hours(1));
        store.insert_generating(team_id, fresh, Utc::now());

        let reaped = reaper(store.clone()).sweep().await.unwrap();

        assert_eq!(reaped, 1);
        let song = store.song(stale);
        assert_eq!(song.status, SongStatus::Error);
        assert_eq!(song.error_message.as_deref(), Some("Song generation timed out"));
        assert_eq!(store.refunds_for(stale), 1);
        assert_eq!(store.song(fresh).status, SongStatus::Generating);
        assert_eq!(store.refunds_for(fresh), 0);
    }

    #[tokio::test]
    async fn test_repeated_sweeps_refund_once() {
        let store = Arc::new(MemoryStore::default());
        let song_id = Uuid::new_v4();
        store.insert_generating(Uuid::new_v4(), song_id, Utc::now() - chrono::Duration::hours(2));

        let reaper = reaper(store.clone());
        assert_eq!(reaper.sweep().await.unwrap(), 1);
        assert_eq!(reaper.sweep().await.unwrap(), 0);
        assert_eq!(store.refunds_for(song_id), 1);
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let store = Arc::new(MemoryStore::default());
        let shutdown = CancellationToken::new();
        shutdown.cancel();

        // Returns immediately instead of looping forever
        reaper(store).run(shutdown).await;
    }
}
