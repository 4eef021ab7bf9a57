/// Processed Stripe webhook events
///
/// Stripe delivers webhooks at least once. Claiming the event id inside the
/// same transaction as the credit grant means a redelivered event is
/// acknowledged without granting twice.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgPool};

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct StripeWebhookEvent {
    pub stripe_event_id: String,
    pub event_type: String,
    pub processed_at: DateTime<Utc>,
}

impl StripeWebhookEvent {
    /// Records the event id
    ///
    /// Returns `false` if the event had already been claimed. When the
    /// surrounding transaction rolls back, the claim goes with it and a
    /// redelivery will be processed again.
    pub async fn claim(
        conn: &mut PgConnection,
        stripe_event_id: &str,
        event_type: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            INSERT INTO stripe_webhook_events (stripe_event_id, event_type)
            VALUES ($1, $2)
            ON CONFLICT (stripe_event_id) DO NOTHING
            "#,
        )
        .bind(stripe_event_id)
        .bind(event_type)
        .execute(conn)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    pub async fn find(pool: &PgPool, stripe_event_id: &str) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, StripeWebhookEvent>(
            r#"
            SELECT stripe_event_id, event_type, processed_at
            FROM stripe_webhook_events
            WHERE stripe_event_id = $1
            "#,
        )
        .bind(stripe_event_id)
        .fetch_optional(pool)
        .await
    }
}
