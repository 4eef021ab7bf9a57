/// Credit ledger entries
///
/// Rows are append-only. Positive amounts add credits (`granted`,
/// `admin_granted`, `purchased`, `refunded`); `consumed` rows carry `-1`.
/// `balance_after` snapshots the team balance right after the entry was
/// applied, which makes the history readable without a running sum.
///
/// Partial unique indexes provide idempotency keys:
///
/// - one `consumed` and one `refunded` row per song
/// - one `purchased` row per Stripe payment id
///
/// Writes go through [`crate::ledger`]; this module only knows how to
/// insert a row and read history.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

/// Ledger entry type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "credit_transaction_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    /// Welcome or promotional credits
    Granted,

    /// Manually granted by a credit admin
    AdminGranted,

    /// Bought through Stripe Checkout
    Purchased,

    /// Spent on a song
    Consumed,

    /// Returned after a failed generation
    Refunded,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Granted => "granted",
            TransactionType::AdminGranted => "admin_granted",
            TransactionType::Purchased => "purchased",
            TransactionType::Consumed => "consumed",
            TransactionType::Refunded => "refunded",
        }
    }

    /// Whether entries of this type add to the balance
    pub fn is_credit(&self) -> bool {
        !matches!(self, TransactionType::Consumed)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct CreditTransaction {
    pub id: Uuid,
    pub team_id: Uuid,

    /// Acting user; absent for system entries such as refunds and webhooks
    pub user_id: Option<Uuid>,

    /// Signed change in credits
    pub amount: i32,

    pub transaction_type: TransactionType,
    pub song_id: Option<Uuid>,
    pub stripe_payment_id: Option<String>,
    pub notes: Option<String>,
    pub balance_after: i32,
    pub created_at: DateTime<Utc>,
}

/// Row to append
#[derive(Debug, Clone)]
pub struct NewCreditTransaction {
    pub team_id: Uuid,
    pub user_id: Option<Uuid>,
    pub amount: i32,
    pub transaction_type: TransactionType,
    pub song_id: Option<Uuid>,
    pub stripe_payment_id: Option<String>,
    pub notes: Option<String>,
    pub balance_after: i32,
}

impl CreditTransaction {
    /// Appends a row unless it collides with an idempotency key
    ///
    /// Returns `None` when an equivalent row already exists. Uses
    /// `ON CONFLICT DO NOTHING`, so the surrounding transaction stays usable.
    pub async fn insert(
        conn: &mut PgConnection,
        data: NewCreditTransaction,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, CreditTransaction>(
            r#"
            INSERT INTO credit_transactions
                (team_id, user_id, amount, transaction_type, song_id,
                 stripe_payment_id, notes, balance_after)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT DO NOTHING
            RETURNING id, team_id, user_id, amount, transaction_type, song_id,
                      stripe_payment_id, notes, balance_after, created_at
            "#,
        )
        .bind(data.team_id)
        .bind(data.user_id)
        .bind(data.amount)
        .bind(data.transaction_type)
        .bind(data.song_id)
        .bind(data.stripe_payment_id)
        .bind(data.notes)
        .bind(data.balance_after)
        .fetch_optional(conn)
        .await
    }

    /// Most recent entries for a team
    pub async fn list_by_team(
        pool: &PgPool,
        team_id: Uuid,
        limit: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, CreditTransaction>(
            r#"
            SELECT id, team_id, user_id, amount, transaction_type, song_id,
                   stripe_payment_id, notes, balance_after, created_at
            FROM credit_transactions
            WHERE team_id = $1
            ORDER BY created_at DESC, id DESC
            LIMIT $2
            "#,
        )
        .bind(team_id)
        .bind(limit)
        .fetch_all(pool)
        .await
    }

    /// All entries attached to a song (its consumption and any refund)
    pub async fn list_by_song(pool: &PgPool, song_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, CreditTransaction>(
            r#"
            SELECT id, team_id, user_id, amount, transaction_type, song_id,
                   stripe_payment_id, notes, balance_after, created_at
            FROM credit_transactions
            WHERE song_id = $1
            ORDER BY created_at ASC
            "#,
        )
        .bind(song_id)
        .fetch_all(pool)
        .await
    }

    /// Sum of all ledger amounts for a team
    ///
    /// Always equals `teams.song_credits_remaining`.
    pub async fn sum_for_team(pool: &PgPool, team_id: Uuid) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar(
            "SELECT COALESCE(SUM(amount), 0)::BIGINT FROM credit_transactions WHERE team_id = $1",
        )
        .bind(team_id)
        .fetch_one(pool)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transaction_type_strings() {
        assert_eq!(TransactionType::AdminGranted.as_str(), "admin_granted");
        assert_eq!(
            serde_json::to_string(&TransactionType::AdminGranted).unwrap(),
            "\"admin_granted\""
        );
    }

    #[test]
    fn test_only_consumed_is_a_debit() {
        assert!(TransactionType::Granted.is_credit());
        assert!(TransactionType::AdminGranted.is_credit());
        assert!(TransactionType::Purchased.is_credit());
        assert!(TransactionType::Refunded.is_credit());
        assert!(!TransactionType::Consumed.is_credit());
    }
}
