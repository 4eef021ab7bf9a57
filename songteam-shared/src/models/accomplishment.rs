/// Accomplishment model
///
/// Free-text wins logged by team members. Each accomplishment feeds at most
/// one song: once a song claims it, `used_in_song` flips to true and the
/// song id is recorded.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE accomplishments (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     team_id UUID NOT NULL REFERENCES teams(id) ON DELETE CASCADE,
///     user_id UUID NOT NULL,
///     text TEXT NOT NULL,
///     used_in_song BOOLEAN NOT NULL DEFAULT FALSE,
///     used_in_song_id UUID REFERENCES songs(id) ON DELETE SET NULL,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

/// Maximum accomplishment length in characters
pub const MAX_TEXT_LEN: usize = 2000;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Accomplishment {
    pub id: Uuid,
    pub team_id: Uuid,

    /// Author
    pub user_id: Uuid,

    pub text: String,
    pub used_in_song: bool,
    pub used_in_song_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAccomplishment {
    pub team_id: Uuid,
    pub user_id: Uuid,
    pub text: String,
}

impl Accomplishment {
    /// Records a new accomplishment
    pub async fn create(pool: &PgPool, data: CreateAccomplishment) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Accomplishment>(
            r#"
            INSERT INTO accomplishments (team_id, user_id, text)
            VALUES ($1, $2, $3)
            RETURNING id, team_id, user_id, text, used_in_song, used_in_song_id, created_at
            "#,
        )
        .bind(data.team_id)
        .bind(data.user_id)
        .bind(data.text)
        .fetch_one(pool)
        .await
    }

    /// Lists a team's accomplishments, newest first
    ///
    /// # Arguments
    ///
    /// * `unused_only` - skip accomplishments already claimed by a song
    /// * `limit` - maximum rows returned
    pub async fn list_by_team(
        pool: &PgPool,
        team_id: Uuid,
        unused_only: bool,
        limit: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Accomplishment>(
            r#"
            SELECT id, team_id, user_id, text, used_in_song, used_in_song_id, created_at
            FROM accomplishments
            WHERE team_id = $1
              AND ($2 = FALSE OR used_in_song = FALSE)
            ORDER BY created_at DESC
            LIMIT $3
            "#,
        )
        .bind(team_id)
        .bind(unused_only)
        .bind(limit)
        .fetch_all(pool)
        .await
    }

    /// Unused accomplishments created in `[from, until)`, oldest first
    ///
    /// Rows are locked so a concurrent generation request for the same
    /// window waits instead of claiming the same accomplishments.
    pub async fn find_unused_in_window<'e>(
        executor: impl PgExecutor<'e>,
        team_id: Uuid,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Accomplishment>(
            r#"
            SELECT id, team_id, user_id, text, used_in_song, used_in_song_id, created_at
            FROM accomplishments
            WHERE team_id = $1
              AND used_in_song = FALSE
              AND created_at >= $2
              AND created_at < $3
            ORDER BY created_at ASC
            FOR UPDATE
            "#,
        )
        .bind(team_id)
        .bind(from)
        .bind(until)
        .fetch_all(executor)
        .await
    }

    /// Links accomplishments to a song
    ///
    /// Only rows that are still unused are touched. The caller compares the
    /// returned count against `ids.len()` to detect a lost race.
    pub async fn mark_used<'e>(
        executor: impl PgExecutor<'e>,
        ids: &[Uuid],
        song_id: Uuid,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE accomplishments
            SET used_in_song = TRUE, used_in_song_id = $2
            WHERE id = ANY($1) AND used_in_song = FALSE
            "#,
        )
        .bind(ids)
        .bind(song_id)
        .execute(executor)
        .await?;

        Ok(result.rows_affected())
    }
}
