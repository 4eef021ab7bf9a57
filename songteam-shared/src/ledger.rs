/// Credit ledger operations
///
/// Every change to a team's balance goes through this module. Each change
/// is one database transaction that:
///
/// 1. locks the team row (or decrements it conditionally),
/// 2. appends a [`CreditTransaction`] with the resulting balance,
/// 3. writes the new balance back to `teams.song_credits_remaining`.
///
/// As a result the cached balance always equals the sum of ledger amounts and
/// can never drop below zero.
///
/// # Idempotency
///
/// Grants may carry an idempotency key: the song id for refunds and the
/// Stripe payment id for purchases. Replaying a grant with a key that is
/// already recorded returns [`GrantOutcome::Duplicate`] and changes nothing.
///
/// # Transactions
///
/// Functions ending in `_in` run on a caller-supplied connection so they can
/// be combined with other writes (song kickoff, webhook claims) in one
/// transaction. The plain variants open and commit their own.
///
/// # Example
///
/// ```no_run
/// use songteam_shared::ledger::{self, GrantRequest};
/// use songteam_shared::models::credit_transaction::TransactionType;
/// use sqlx::PgPool;
/// use uuid::Uuid;
///
/// # async fn example(pool: PgPool, team_id: Uuid, admin_id: Uuid) -> Result<(), Box<dyn std::error::Error>> {
/// let outcome = ledger::grant(&pool, GrantRequest {
///     team_id,
///     amount: 5,
///     transaction_type: TransactionType::AdminGranted,
///     user_id: Some(admin_id),
///     song_id: None,
///     stripe_payment_id: None,
///     notes: Some("Conference promo".to_string()),
/// }).await?;
///
/// println!("balance now {}", outcome.balance());
/// # Ok(())
/// # }
/// ```

use crate::models::credit_transaction::{CreditTransaction, NewCreditTransaction, TransactionType};
use crate::models::team::Team;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

/// Credits spent per song
pub const SONG_COST: i32 = 1;

/// Ledger errors
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    /// Balance is below the amount being consumed
    #[error("Insufficient credits: team {team_id} has {balance}")]
    InsufficientCredits { team_id: Uuid, balance: i32 },

    #[error("Team not found: {0}")]
    TeamNotFound(Uuid),

    /// Grant amount is not positive, or would overflow the balance
    #[error("Invalid credit amount: {0}")]
    InvalidAmount(i32),

    /// `consumed` entries can only be written by [`consume_in`]
    #[error("{0:?} cannot be used for a grant")]
    InvalidTransactionType(TransactionType),

    /// A consumption for this song is already on the ledger
    #[error("Credit already consumed for song {0}")]
    AlreadyConsumed(Uuid),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// A credit grant
#[derive(Debug, Clone)]
pub struct GrantRequest {
    pub team_id: Uuid,
    pub amount: i32,
    pub transaction_type: TransactionType,
    pub user_id: Option<Uuid>,
    pub song_id: Option<Uuid>,
    pub stripe_payment_id: Option<String>,
    pub notes: Option<String>,
}

/// Result of a grant
#[derive(Debug, Clone)]
pub enum GrantOutcome {
    /// Credits added
    Granted {
        transaction: CreditTransaction,
        new_balance: i32,
    },

    /// The idempotency key was already recorded; nothing changed
    Duplicate { balance: i32 },
}

impl GrantOutcome {
    /// Team balance after the call
    pub fn balance(&self) -> i32 {
        match self {
            GrantOutcome::Granted { new_balance, .. } => *new_balance,
            GrantOutcome::Duplicate { balance } => *balance,
        }
    }

    pub fn is_duplicate(&self) -> bool {
        matches!(self, GrantOutcome::Duplicate { .. })
    }
}

/// Adds credits in a transaction of its own
pub async fn grant(pool: &PgPool, request: GrantRequest) -> Result<GrantOutcome, LedgerError> {
    let mut tx = pool.begin().await?;
    let outcome = grant_in(&mut tx, request).await?;
    tx.commit().await?;
    Ok(outcome)
}

/// Adds credits on the caller's connection
///
/// # Errors
///
/// - `InvalidAmount` if `amount <= 0` or the new balance would overflow
/// - `InvalidTransactionType` for `consumed`
/// - `TeamNotFound` if the team doesn't exist
pub async fn grant_in(
    conn: &mut PgConnection,
    request: GrantRequest,
) -> Result<GrantOutcome, LedgerError> {
    if request.amount <= 0 {
        return Err(LedgerError::InvalidAmount(request.amount));
    }
    if !request.transaction_type.is_credit() {
        return Err(LedgerError::InvalidTransactionType(request.transaction_type));
    }

    let team = Team::lock_for_update(&mut *conn, request.team_id)
        .await?
        .ok_or(LedgerError::TeamNotFound(request.team_id))?;

    let new_balance = team
        .song_credits_remaining
        .checked_add(request.amount)
        .ok_or(LedgerError::InvalidAmount(request.amount))?;

    let inserted = CreditTransaction::insert(
        &mut *conn,
        NewCreditTransaction {
            team_id: request.team_id,
            user_id: request.user_id,
            amount: request.amount,
            transaction_type: request.transaction_type,
            song_id: request.song_id,
            stripe_payment_id: request.stripe_payment_id,
            notes: request.notes,
            balance_after: new_balance,
        },
    )
    .await?;

    let Some(transaction) = inserted else {
        tracing::info!(
            team_id = %request.team_id,
            transaction_type = request.transaction_type.as_str(),
            "Duplicate credit grant ignored"
        );
        return Ok(GrantOutcome::Duplicate {
            balance: team.song_credits_remaining,
        });
    };

    set_balance(conn, request.team_id, new_balance).await?;

    tracing::info!(
        team_id = %request.team_id,
        amount = request.amount,
        transaction_type = request.transaction_type.as_str(),
        new_balance,
        "Credits granted"
    );

    Ok(GrantOutcome::Granted {
        transaction,
        new_balance,
    })
}

/// Spends one credit on a song, on the caller's connection
///
/// The decrement is conditional (`WHERE song_credits_remaining >= 1`), so two
/// concurrent requests for a team holding one credit cannot both succeed.
///
/// # Returns
///
/// The balance after consumption.
///
/// # Errors
///
/// - `InsufficientCredits` when the balance is zero
/// - `TeamNotFound` if the team doesn't exist
/// - `AlreadyConsumed` if this song was already paid for
pub async fn consume_in(
    conn: &mut PgConnection,
    team_id: Uuid,
    user_id: Uuid,
    song_id: Uuid,
) -> Result<i32, LedgerError> {
    let new_balance: Option<i32> = sqlx::query_scalar(
        r#"
        UPDATE teams
        SET song_credits_remaining = song_credits_remaining - $2,
            updated_at = NOW()
        WHERE id = $1 AND song_credits_remaining >= $2
        RETURNING song_credits_remaining
        "#,
    )
    .bind(team_id)
    .bind(SONG_COST)
    .fetch_optional(&mut *conn)
    .await?;

    let Some(new_balance) = new_balance else {
        return match Team::find_by_id(&mut *conn, team_id).await? {
            Some(team) => Err(LedgerError::InsufficientCredits {
                team_id,
                balance: team.song_credits_remaining,
            }),
            None => Err(LedgerError::TeamNotFound(team_id)),
        };
    };

    let inserted = CreditTransaction::insert(
        &mut *conn,
        NewCreditTransaction {
            team_id,
            user_id: Some(user_id),
            amount: -SONG_COST,
            transaction_type: TransactionType::Consumed,
            song_id: Some(song_id),
            stripe_payment_id: None,
            notes: None,
            balance_after: new_balance,
        },
    )
    .await?;

    if inserted.is_none() {
        // The decrement above is rolled back with the caller's transaction
        return Err(LedgerError::AlreadyConsumed(song_id));
    }

    tracing::debug!(team_id = %team_id, song_id = %song_id, new_balance, "Credit consumed");
    Ok(new_balance)
}

/// Notes recorded on a refund entry
pub fn refund_notes(song_id: Uuid) -> String {
    format!("Refund for failed song generation ({})", song_id)
}

/// Builds the refund grant for a failed song
///
/// Keyed by song id, so at most one refund per song ever lands.
pub fn refund_request(team_id: Uuid, song_id: Uuid) -> GrantRequest {
    GrantRequest {
        team_id,
        amount: SONG_COST,
        transaction_type: TransactionType::Refunded,
        user_id: None,
        song_id: Some(song_id),
        stripe_payment_id: None,
        notes: Some(refund_notes(song_id)),
    }
}

/// Refunds a song's credit on the caller's connection
pub async fn refund_song_in(
    conn: &mut PgConnection,
    team_id: Uuid,
    song_id: Uuid,
) -> Result<GrantOutcome, LedgerError> {
    grant_in(conn, refund_request(team_id, song_id)).await
}

/// Current balance
pub async fn balance(pool: &PgPool, team_id: Uuid) -> Result<i32, LedgerError> {
    Team::find_by_id(pool, team_id)
        .await?
        .map(|t| t.song_credits_remaining)
        .ok_or(LedgerError::TeamNotFound(team_id))
}

/// Most recent ledger entries, newest first
pub async fn history(
    pool: &PgPool,
    team_id: Uuid,
    limit: i64,
) -> Result<Vec<CreditTransaction>, LedgerError> {
    Ok(CreditTransaction::list_by_team(pool, team_id, limit).await?)
}

async fn set_balance(conn: &mut PgConnection, team_id: Uuid, balance: i32) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE teams
        SET song_credits_remaining = $2, updated_at = NOW()
        WHERE id = $1
        "#,
    )
    .bind(team_id)
    .bind(balance)
    .execute(conn)
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_refund_request_shape() {
        let team_id = Uuid::new_v4();
        let song_id = Uuid::new_v4();
        let req = refund_request(team_id, song_id);

        assert_eq!(req.team_id, team_id);
        assert_eq!(req.amount, 1);
        assert_eq!(req.transaction_type, TransactionType::Refunded);
        assert_eq!(req.song_id, Some(song_id));
        assert!(req.user_id.is_none());
        assert_eq!(
            req.notes.as_deref(),
            Some(format!("Refund for failed song generation ({})", song_id).as_str())
        );
    }

    #[test]
    fn test_grant_outcome_balance() {
        let dup = GrantOutcome::Duplicate { balance: 3 };
        assert_eq!(dup.balance(), 3);
        assert!(dup.is_duplicate());
    }

    #[test]
    fn test_ledger_error_display() {
        let team_id = Uuid::nil();
        let err = LedgerError::InsufficientCredits { team_id, balance: 0 };
        assert_eq!(
            err.to_string(),
            format!("Insufficient credits: team {} has 0", team_id)
        );
        assert_eq!(LedgerError::InvalidAmount(-2).to_string(), "Invalid credit amount: -2");
    }
}
