/// Song model and lifecycle transitions
///
/// # Lifecycle
///
/// ```text
/// pending ──> generating ──┬──> complete
///                          └──> error
/// ```
///
/// `complete` and `error` are terminal. Every transition is a guarded
/// `UPDATE ... WHERE status = <expected>` so only one writer can move a song
/// out of a given state; the `bool` each `mark_*` function returns says
/// whether this caller won.
///
/// # Schema
///
/// ```sql
/// CREATE TYPE song_status AS ENUM ('pending', 'generating', 'complete', 'error');
///
/// CREATE TABLE songs (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     team_id UUID NOT NULL REFERENCES teams(id) ON DELETE CASCADE,
///     created_by_user_id UUID NOT NULL,
///     title TEXT NOT NULL,
///     genre TEXT NOT NULL,
///     status song_status NOT NULL DEFAULT 'pending',
///     week_start_date DATE NOT NULL,
///     week_end_date DATE NOT NULL,
///     lyrics TEXT,
///     audio_url TEXT,
///     error_message TEXT,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     completed_at TIMESTAMPTZ
/// );
/// ```

use crate::genre::Genre;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

/// Song generation status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "song_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum SongStatus {
    /// Row created, credit not yet committed
    Pending,

    /// Handed to the generation engine
    Generating,

    /// Audio available
    Complete,

    /// Generation failed; credit refunded
    Error,
}

impl SongStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SongStatus::Pending => "pending",
            SongStatus::Generating => "generating",
            SongStatus::Complete => "complete",
            SongStatus::Error => "error",
        }
    }
}

/// Song model
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Song {
    pub id: Uuid,
    pub team_id: Uuid,
    pub created_by_user_id: Uuid,
    pub title: String,

    #[sqlx(try_from = "String")]
    pub genre: Genre,

    pub status: SongStatus,
    pub week_start_date: NaiveDate,
    pub week_end_date: NaiveDate,

    /// Set on completion
    pub lyrics: Option<String>,

    /// Set on completion
    pub audio_url: Option<String>,

    /// Set on failure
    pub error_message: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Input for creating a song
#[derive(Debug, Clone)]
pub struct CreateSong {
    pub team_id: Uuid,
    pub created_by_user_id: Uuid,
    pub title: String,
    pub genre: Genre,
    pub week_start_date: NaiveDate,
    pub week_end_date: NaiveDate,
}

impl Song {
    /// Inserts a song in `pending`
    pub async fn create<'e>(
        executor: impl PgExecutor<'e>,
        data: CreateSong,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Song>(
            r#"
            INSERT INTO songs (team_id, created_by_user_id, title, genre, status,
                               week_start_date, week_end_date)
            VALUES ($1, $2, $3, $4, 'pending', $5, $6)
            RETURNING id, team_id, created_by_user_id, title, genre, status,
                      week_start_date, week_end_date, lyrics, audio_url, error_message,
                      created_at, updated_at, completed_at
            "#,
        )
        .bind(data.team_id)
        .bind(data.created_by_user_id)
        .bind(data.title)
        .bind(data.genre.as_str())
        .bind(data.week_start_date)
        .bind(data.week_end_date)
        .fetch_one(executor)
        .await
    }

    pub async fn find_by_id<'e>(
        executor: impl PgExecutor<'e>,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Song>(
            r#"
            SELECT id, team_id, created_by_user_id, title, genre, status,
                   week_start_date, week_end_date, lyrics, audio_url, error_message,
                   created_at, updated_at, completed_at
            FROM songs
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(executor)
        .await
    }

    /// Lists a team's songs, newest first
    pub async fn list_by_team(
        pool: &PgPool,
        team_id: Uuid,
        limit: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Song>(
            r#"
            SELECT id, team_id, created_by_user_id, title, genre, status,
                   week_start_date, week_end_date, lyrics, audio_url, error_message,
                   created_at, updated_at, completed_at
            FROM songs
            WHERE team_id = $1
            ORDER BY created_at DESC
            LIMIT $2
            "#,
        )
        .bind(team_id)
        .bind(limit)
        .fetch_all(pool)
        .await
    }

    /// pending -> generating
    pub async fn mark_generating<'e>(
        executor: impl PgExecutor<'e>,
        id: Uuid,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE songs
            SET status = 'generating', updated_at = NOW()
            WHERE id = $1 AND status = 'pending'
            "#,
        )
        .bind(id)
        .execute(executor)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// generating -> complete, storing lyrics and the audio reference
    pub async fn mark_complete<'e>(
        executor: impl PgExecutor<'e>,
        id: Uuid,
        lyrics: &str,
        audio_url: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE songs
            SET status = 'complete',
                lyrics = $2,
                audio_url = $3,
                error_message = NULL,
                completed_at = NOW(),
                updated_at = NOW()
            WHERE id = $1 AND status = 'generating'
            "#,
        )
        .bind(id)
        .bind(lyrics)
        .bind(audio_url)
        .execute(executor)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// generating -> error
    ///
    /// Returns `true` only for the caller that performed the transition;
    /// that caller owns the refund.
    pub async fn mark_error<'e>(
        executor: impl PgExecutor<'e>,
        id: Uuid,
        message: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE songs
            SET status = 'error',
                error_message = $2,
                updated_at = NOW()
            WHERE id = $1 AND status = 'generating'
            "#,
        )
        .bind(id)
        .bind(message)
        .execute(executor)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Songs that have sat in `generating` since before `cutoff`
    pub async fn list_stale_generating(
        pool: &PgPool,
        cutoff: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Song>(
            r#"
            SELECT id, team_id, created_by_user_id, title, genre, status,
                   week_start_date, week_end_date, lyrics, audio_url, error_message,
                   created_at, updated_at, completed_at
            FROM songs
            WHERE status = 'generating' AND updated_at < $1
            ORDER BY updated_at ASC
            LIMIT $2
            "#,
        )
        .bind(cutoff)
        .bind(limit)
        .fetch_all(pool)
        .await
    }
}
