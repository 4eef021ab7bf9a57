/// Operators allowed to hand out credits outside of Stripe

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct AdminUser {
    pub user_id: Uuid,
    pub can_grant_credits: bool,
    pub created_at: DateTime<Utc>,
}

impl AdminUser {
    pub async fn find(pool: &PgPool, user_id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, AdminUser>(
            r#"
            SELECT user_id, can_grant_credits, created_at
            FROM admin_users
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(pool)
        .await
    }

    /// Creates or updates an admin entry
    pub async fn upsert(
        pool: &PgPool,
        user_id: Uuid,
        can_grant_credits: bool,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, AdminUser>(
            r#"
            INSERT INTO admin_users (user_id, can_grant_credits)
            VALUES ($1, $2)
            ON CONFLICT (user_id) DO UPDATE SET can_grant_credits = EXCLUDED.can_grant_credits
            RETURNING user_id, can_grant_credits, created_at
            "#,
        )
        .bind(user_id)
        .bind(can_grant_credits)
        .fetch_one(pool)
        .await
    }
}
