/// Team model and database operations
///
/// A team owns a credit balance and a unique join code. The balance column is
/// a cached projection of the credit ledger; it is only ever changed by the
/// functions in [`crate::ledger`].
///
/// # Schema
///
/// ```sql
/// CREATE TABLE teams (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     name TEXT NOT NULL,
///     owner_id UUID NOT NULL,
///     join_code TEXT NOT NULL UNIQUE,
///     song_credits_remaining INTEGER NOT NULL DEFAULT 0 CHECK (song_credits_remaining >= 0),
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```
///
/// # Example
///
/// ```no_run
/// use songteam_shared::models::team::{CreateTeam, Team};
/// use sqlx::PgPool;
/// use uuid::Uuid;
///
/// # async fn example(pool: PgPool) -> Result<(), Box<dyn std::error::Error>> {
/// let mut conn = pool.acquire().await?;
/// let team = Team::create(&mut conn, CreateTeam {
///     name: "Platform".to_string(),
///     owner_id: Uuid::new_v4(),
/// }).await?;
///
/// let found = Team::find_by_join_code(&pool, &team.join_code.to_lowercase()).await?;
/// assert_eq!(found.map(|t| t.id), Some(team.id));
/// # Ok(())
/// # }
/// ```

use crate::join_code;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgExecutor, PgPool};
use uuid::Uuid;

/// Errors specific to team creation
#[derive(Debug, thiserror::Error)]
pub enum TeamError {
    /// Every generated join code collided with an existing team
    #[error("Could not allocate a unique join code after {0} attempts")]
    JoinCodeExhausted(usize),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Team model
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Team {
    /// Unique team ID
    pub id: Uuid,

    /// Display name
    pub name: String,

    /// User who created the team
    pub owner_id: Uuid,

    /// Code other users enter to join (always stored uppercase)
    pub join_code: String,

    /// Current number of song credits
    pub song_credits_remaining: i32,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a team
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTeam {
    pub name: String,
    pub owner_id: Uuid,
}

impl Team {
    /// Inserts a team with a freshly generated join code
    ///
    /// Collisions on the join code are retried with a new code up to
    /// [`join_code::MAX_GENERATION_ATTEMPTS`] times. The insert uses
    /// `ON CONFLICT DO NOTHING`, so a collision never aborts the caller's
    /// transaction.
    ///
    /// The team starts with a zero balance; welcome credits are granted
    /// through the ledger so the ledger and balance stay in step.
    ///
    /// # Errors
    ///
    /// - `TeamError::JoinCodeExhausted` if every attempt collided
    /// - `TeamError::Database` on any database failure
    pub async fn create(conn: &mut PgConnection, data: CreateTeam) -> Result<Self, TeamError> {
        for attempt in 1..=join_code::MAX_GENERATION_ATTEMPTS {
            let code = join_code::generate();

            let team = sqlx::query_as::<_, Team>(
                r#"
                INSERT INTO teams (name, owner_id, join_code)
                VALUES ($1, $2, $3)
                ON CONFLICT (join_code) DO NOTHING
                RETURNING id, name, owner_id, join_code, song_credits_remaining,
                          created_at, updated_at
                "#,
            )
            .bind(&data.name)
            .bind(data.owner_id)
            .bind(&code)
            .fetch_optional(&mut *conn)
            .await?;

            match team {
                Some(team) => return Ok(team),
                None => {
                    tracing::warn!(attempt, join_code = %code, "Join code collision, retrying");
                }
            }
        }

        Err(TeamError::JoinCodeExhausted(join_code::MAX_GENERATION_ATTEMPTS))
    }

    /// Finds a team by ID
    pub async fn find_by_id<'e>(
        executor: impl PgExecutor<'e>,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Team>(
            r#"
            SELECT id, name, owner_id, join_code, song_credits_remaining, created_at, updated_at
            FROM teams
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(executor)
        .await
    }

    /// Looks up a team by join code
    ///
    /// The input is normalized first, so `" teamab23"` finds `TEAMAB23`.
    /// Malformed input short-circuits to `None` without a query.
    pub async fn find_by_join_code(pool: &PgPool, code: &str) -> Result<Option<Self>, sqlx::Error> {
        let code = join_code::normalize(code);
        if !join_code::is_well_formed(&code) {
            return Ok(None);
        }

        sqlx::query_as::<_, Team>(
            r#"
            SELECT id, name, owner_id, join_code, song_credits_remaining, created_at, updated_at
            FROM teams
            WHERE join_code = $1
            "#,
        )
        .bind(code)
        .fetch_optional(pool)
        .await
    }

    /// Loads a team and takes a row lock for the rest of the transaction
    ///
    /// Used wherever the balance is read and then changed, so concurrent
    /// requests against the same team serialize.
    pub async fn lock_for_update(
        conn: &mut PgConnection,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Team>(
            r#"
            SELECT id, name, owner_id, join_code, song_credits_remaining, created_at, updated_at
            FROM teams
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(id)
        .fetch_optional(conn)
        .await
    }

    /// Lists the teams a user belongs to, newest membership first
    pub async fn list_for_user(pool: &PgPool, user_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Team>(
            r#"
            SELECT t.id, t.name, t.owner_id, t.join_code, t.song_credits_remaining,
                   t.created_at, t.updated_at
            FROM teams t
            INNER JOIN team_members m ON m.team_id = t.id
            WHERE m.user_id = $1
            ORDER BY m.joined_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(pool)
        .await
    }

    /// Whether the team has at least one credit to spend
    pub fn has_credits(&self) -> bool {
        self.song_credits_remaining >= 1
    }
}
