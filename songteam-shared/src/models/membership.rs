/// Team membership model
///
/// Links users to teams. A user holds at most one membership per team,
/// enforced by the composite primary key.
///
/// # Schema
///
/// ```sql
/// CREATE TYPE member_role AS ENUM ('owner', 'member');
///
/// CREATE TABLE team_members (
///     team_id UUID NOT NULL REFERENCES teams(id) ON DELETE CASCADE,
///     user_id UUID NOT NULL,
///     role member_role NOT NULL DEFAULT 'member',
///     joined_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     PRIMARY KEY (team_id, user_id)
/// );
/// ```
///
/// # Roles
///
/// - **owner**: created the team; may buy credits for it
/// - **member**: may log accomplishments and generate songs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

/// Role within a team
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "member_role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum MemberRole {
    Owner,
    Member,
}

impl MemberRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MemberRole::Owner => "owner",
            MemberRole::Member => "member",
        }
    }

    /// Only owners may purchase credits for a team
    pub fn can_manage_billing(&self) -> bool {
        matches!(self, MemberRole::Owner)
    }
}

/// A user's membership in a team
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct TeamMember {
    pub team_id: Uuid,
    pub user_id: Uuid,
    pub role: MemberRole,
    pub joined_at: DateTime<Utc>,
}

/// Input for adding a user to a team
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTeamMember {
    pub team_id: Uuid,
    pub user_id: Uuid,

    #[serde(default = "default_role")]
    pub role: MemberRole,
}

fn default_role() -> MemberRole {
    MemberRole::Member
}

impl TeamMember {
    /// Adds a user to a team unless they already belong to it
    ///
    /// # Returns
    ///
    /// The new membership, or `None` when the user was already a member.
    /// The existing membership is left untouched in that case.
    ///
    /// # Errors
    ///
    /// Returns an error if the team doesn't exist or the database fails
    ///
    /// # Example
    ///
    /// ```no_run
    /// # use songteam_shared::models::membership::{CreateTeamMember, MemberRole, TeamMember};
    /// # use sqlx::PgPool;
    /// # use uuid::Uuid;
    /// # async fn example(pool: PgPool, team_id: Uuid, user_id: Uuid) -> Result<(), sqlx::Error> {
    /// let added = TeamMember::insert_if_absent(&pool, CreateTeamMember {
    ///     team_id,
    ///     user_id,
    ///     role: MemberRole::Member,
    /// }).await?;
    ///
    /// if added.is_none() {
    ///     println!("already a member");
    /// }
    /// # Ok(())
    /// # }
    /// ```
    pub async fn insert_if_absent<'e>(
        executor: impl PgExecutor<'e>,
        data: CreateTeamMember,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, TeamMember>(
            r#"
            INSERT INTO team_members (team_id, user_id, role)
            VALUES ($1, $2, $3)
            ON CONFLICT (team_id, user_id) DO NOTHING
            RETURNING team_id, user_id, role, joined_at
            "#,
        )
        .bind(data.team_id)
        .bind(data.user_id)
        .bind(data.role)
        .fetch_optional(executor)
        .await
    }

    /// Finds a specific membership
    pub async fn find(
        pool: &PgPool,
        team_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, TeamMember>(
            r#"
            SELECT team_id, user_id, role, joined_at
            FROM team_members
            WHERE team_id = $1 AND user_id = $2
            "#,
        )
        .bind(team_id)
        .bind(user_id)
        .fetch_optional(pool)
        .await
    }

    /// Gets a user's role in a team, if any
    pub async fn get_role<'e>(
        executor: impl PgExecutor<'e>,
        team_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<MemberRole>, sqlx::Error> {
        sqlx::query_scalar::<_, MemberRole>(
            r#"
            SELECT role FROM team_members
            WHERE team_id = $1 AND user_id = $2
            "#,
        )
        .bind(team_id)
        .bind(user_id)
        .fetch_optional(executor)
        .await
    }

    /// Lists members of a team in join order
    pub async fn list_by_team(pool: &PgPool, team_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, TeamMember>(
            r#"
            SELECT team_id, user_id, role, joined_at
            FROM team_members
            WHERE team_id = $1
            ORDER BY joined_at ASC
            "#,
        )
        .bind(team_id)
        .fetch_all(pool)
        .await
    }

    /// Counts members of a team
    pub async fn count_by_team(pool: &PgPool, team_id: Uuid) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar("SELECT COUNT(*) FROM team_members WHERE team_id = $1")
            .bind(team_id)
            .fetch_one(pool)
            .await
    }
}
