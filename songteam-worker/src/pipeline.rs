/// Song generation pipeline
///
/// Runs after the API has committed the kickoff transaction (song in
/// `generating`, credit consumed, accomplishments claimed). The pipeline
/// calls the generator and settles the song one way or the other:
///
/// ```text
/// run_generation
///   ├─> SongGenerator::generate (bounded by GenerationTimeout)
///   ├─> ok    -> GenerationStore::complete        (generating -> complete)
///   └─> error -> GenerationStore::fail_and_refund (generating -> error + refund)
/// ```
///
/// # Concurrency
///
/// Both transitions are guarded on `status = 'generating'`, and the reaper
/// goes through the same `fail_and_refund`. Whoever performs the transition
/// issues the refund; everyone else sees `false` and does nothing.
///
/// # Example
///
/// ```no_run
/// use songteam_worker::generator::MockGenerator;
/// use songteam_worker::pipeline::{spawn_generation, GenerationJob, PgGenerationStore};
/// use songteam_worker::timeout::GenerationTimeout;
/// use std::sync::Arc;
///
/// # fn example(pool: sqlx::PgPool, job: GenerationJob) {
/// let handle = spawn_generation(
///     job,
///     Arc::new(MockGenerator::succeeding()),
///     Arc::new(PgGenerationStore::new(pool)),
///     GenerationTimeout::default(),
/// );
/// # drop(handle);
/// # }
/// ```

use crate::generator::{GenerationRequest, GeneratorError, SongGenerator, SONG_LENGTH_MS};
use crate::timeout::GenerationTimeout;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use songteam_shared::genre::Genre;
use songteam_shared::ledger::{self, LedgerError};
use songteam_shared::models::song::Song;
use sqlx::PgPool;
use std::sync::Arc;
use tokio::task::JoinHandle;
use uuid::Uuid;

/// Pipeline error types
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),
}

/// Everything the pipeline needs, captured at kickoff
#[derive(Debug, Clone)]
pub struct GenerationJob {
    pub song_id: Uuid,
    pub team_id: Uuid,
    pub team_name: String,
    pub genre: Genre,
    pub week_start: NaiveDate,
    pub week_end: NaiveDate,
    /// Accomplishment texts, oldest first
    pub accomplishments: Vec<String>,
}

impl GenerationJob {
    /// Accomplishments separated by a blank line
    pub fn lyrics(&self) -> String {
        self.accomplishments.join("\n\n")
    }

    pub fn week_label(&self) -> String {
        week_label(self.week_start, self.week_end)
    }

    /// Request sent to the song engine
    pub fn request(&self) -> GenerationRequest {
        GenerationRequest {
            song_id: self.song_id,
            team_name: self.team_name.clone(),
            genre: self.genre,
            week_label: self.week_label(),
            lyrics: self.lyrics(),
            length_ms: SONG_LENGTH_MS,
        }
    }
}

/// `M/D/YYYY - M/D/YYYY`, no zero padding
pub fn week_label(start: NaiveDate, end: NaiveDate) -> String {
    format!("{} - {}", start.format("%-m/%-d/%Y"), end.format("%-m/%-d/%Y"))
}

/// A song left in `generating`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StaleSong {
    pub song_id: Uuid,
    pub team_id: Uuid,
}

/// Where the pipeline and the reaper record outcomes
#[async_trait]
pub trait GenerationStore: Send + Sync {
    /// generating -> complete
    ///
    /// Returns `false` if the song had already left `generating`.
    async fn complete(
        &self,
        song_id: Uuid,
        lyrics: &str,
        audio_url: &str,
    ) -> Result<bool, PipelineError>;

    /// generating -> error, then refund one credit, atomically
    ///
    /// Returns `true` only for the caller that performed the transition.
    async fn fail_and_refund(
        &self,
        team_id: Uuid,
        song_id: Uuid,
        message: &str,
    ) -> Result<bool, PipelineError>;

    /// Songs in `generating` since before `cutoff`, oldest first
    async fn stale_songs(
        &self,
        cutoff: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<StaleSong>, PipelineError>;
}

/// PostgreSQL-backed store
#[derive(Debug, Clone)]
pub struct PgGenerationStore {
    pool: PgPool,
}

impl PgGenerationStore {
    pub fn new(pool: PgPool) -> Self {
        PgGenerationStore { pool }
    }
}

#[async_trait]
impl GenerationStore for PgGenerationStore {
    async fn complete(
        &self,
        song_id: Uuid,
        lyrics: &str,
        audio_url: &str,
    ) -> Result<bool, PipelineError> {
        Ok(Song::mark_complete(&self.pool, song_id, lyrics, audio_url).await?)
    }

    async fn fail_and_refund(
        &self,
        team_id: Uuid,
        song_id: Uuid,
        message: &str,
    ) -> Result<bool, PipelineError> {
        let mut tx = self.pool.begin().await?;

        if !Song::mark_error(&mut *tx, song_id, message).await? {
            tx.rollback().await?;
            return Ok(false);
        }

        let outcome = ledger::refund_song_in(&mut tx, team_id, song_id).await?;
        tx.commit().await?;

        tracing::info!(
            team_id = %team_id,
            song_id = %song_id,
            new_balance = outcome.balance(),
            duplicate = outcome.is_duplicate(),
            "Credit refunded for failed song"
        );

        Ok(true)
    }

    async fn stale_songs(
        &self,
        cutoff: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<StaleSong>, PipelineError> {
        let songs = Song::list_stale_generating(&self.pool, cutoff, limit).await?;
        Ok(songs
            .into_iter()
            .map(|s| StaleSong {
                song_id: s.id,
                team_id: s.team_id,
            })
            .collect())
    }
}

/// How a pipeline run ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationOutcome {
    Completed { audio_url: String },
    Failed { message: String, refunded: bool },
    /// Generation succeeded but the song had already been settled elsewhere
    Superseded,
}

/// Runs one generation to completion
///
/// # Errors
///
/// Only store failures. Generator failures are recorded on the song and
/// reported as [`GenerationOutcome::Failed`].
pub async fn run_generation(
    job: GenerationJob,
    generator: &dyn SongGenerator,
    store: &dyn GenerationStore,
    timeout: GenerationTimeout,
) -> Result<GenerationOutcome, PipelineError> {
    let request = job.request();
    let lyrics = request.lyrics.clone();

    tracing::info!(
        song_id = %job.song_id,
        team_id = %job.team_id,
        genre = job.genre.as_str(),
        generator = generator.name(),
        accomplishments = job.accomplishments.len(),
        "Generating song"
    );

    let result = match timeout.run(generator.generate(request)).await {
        Ok(result) => result,
        Err(_) => Err(GeneratorError::Timeout),
    };

    match result {
        Ok(song) => {
            if store.complete(job.song_id, &lyrics, &song.audio_url).await? {
                tracing::info!(song_id = %job.song_id, "Song generated successfully");
                Ok(GenerationOutcome::Completed {
                    audio_url: song.audio_url,
                })
            } else {
                tracing::warn!(
                    song_id = %job.song_id,
                    "Song was no longer generating; discarding result"
                );
                Ok(GenerationOutcome::Superseded)
            }
        }
        Err(e) => {
            let message = e.to_string();
            tracing::warn!(song_id = %job.song_id, error = %message, "Song generation failed");

            let refunded = store
                .fail_and_refund(job.team_id, job.song_id, &message)
                .await?;

            Ok(GenerationOutcome::Failed { message, refunded })
        }
    }
}

/// Runs [`run_generation`] on a detached task
///
/// Store failures are logged; the reaper settles whatever is left behind.
pub fn spawn_generation(
    job: GenerationJob,
    generator: Arc<dyn SongGenerator>,
    store: Arc<dyn GenerationStore>,
    timeout: GenerationTimeout,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let song_id = job.song_id;
        if let Err(e) = run_generation(job, generator.as_ref(), store.as_ref(), timeout).await {
            tracing::error!(
                song_id = %song_id,
                error = %e,
                "Failed to record song generation outcome"
            );
        }
    })
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use songteam_shared::models::song::SongStatus;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Debug, Clone)]
    pub struct StoredSong {
        pub team_id: Uuid,
        pub status: SongStatus,
        pub lyrics: Option<String>,
        pub audio_url: Option<String>,
        pub error_message: Option<String>,
        pub updated_at: DateTime<Utc>,
    }

    /// In-memory store with the same guarded transitions as PostgreSQL
    #[derive(Debug, Default)]
    pub struct MemoryStore {
        pub songs: Mutex<HashMap<Uuid, StoredSong>>,
        pub refunds: Mutex<Vec<Uuid>>,
    }

    impl MemoryStore {
        pub fn insert_generating(&self, team_id: Uuid, song_id: Uuid, updated_at: DateTime<Utc>) {
            self.songs.lock().unwrap().insert(
                song_id,
                StoredSong {
                    team_id,
                    status: SongStatus::Generating,
                    lyrics: None,
                    audio_url: None,
                    error_message: None,
                    updated_at,
                },
            );
        }

        pub fn song(&self, song_id: Uuid) -> StoredSong {
            self.songs.lock().unwrap()[&song_id].clone()
        }

        pub fn refunds_for(&self, song_id: Uuid) -> usize {
            self.refunds
                .lock()
                .unwrap()
                .iter()
                .filter(|id| **id == song_id)
                .count()
        }
    }

    #[async_trait]
    impl GenerationStore for MemoryStore {
        async fn complete(
            &self,
            song_id: Uuid,
            lyrics: &str,
            audio_url: &str,
        ) -> Result<bool, PipelineError> {
            let mut songs = self.songs.lock().unwrap();
            match songs.get_mut(&song_id) {
                Some(song) if song.status == SongStatus::Generating => {
                    song.status = SongStatus::Complete;
                    song.lyrics = Some(lyrics.to_string());
                    song.audio_url = Some(audio_url.to_string());
                    Ok(true)
                }
                _ => Ok(false),
            }
        }

        async fn fail_and_refund(
            &self,
            _team_id: Uuid,
            song_id: Uuid,
            message: &str,
        ) -> Result<bool, PipelineError> {
            let mut songs = self.songs.lock().unwrap();
            match songs.get_mut(&song_id) {
                Some(song) if song.status == SongStatus::Generating => {
                    song.status = SongStatus::Error;
                    song.error_message = Some(message.to_string());
                    self.refunds.lock().unwrap().push(song_id);
                    Ok(true)
                }
                _ => Ok(false),
            }
        }

        async fn stale_songs(
            &self,
            cutoff: DateTime<Utc>,
            limit: i64,
        ) -> Result<Vec<StaleSong>, PipelineError> {
            let songs = self.songs.lock().unwrap();
            let mut stale: Vec<_> = songs
                .iter()
                .filter(|(_, s)| s.status == SongStatus::Generating && s.updated_at < cutoff)
                .map(|(id, s)| (s.updated_at, StaleSong { song_id: *id, team_id: s.team_id }))
                .collect();
            stale.sort_by_key(|(at, _)| *at);
            Ok(stale
                .into_iter()
                .take(limit as usize)
                .map(|(_, s)| s)
                .collect())
        }
    }
}
