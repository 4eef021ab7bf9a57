/// Database models for SongTeam
///
/// Each model owns its SQL. Multi-step writes that must be atomic (song
/// kickoff, credit grants, webhook processing) are composed by callers inside
/// a transaction, which is why many functions accept any `PgExecutor` or a
/// `&mut PgConnection` rather than the pool.
///
/// # Models
///
/// - `team`: Teams, their join codes and credit balance
/// - `membership`: User-team relationships with roles
/// - `accomplishment`: Logged wins that songs are written from
/// - `song`: Generated songs and their lifecycle
/// - `credit_transaction`: Append-only credit ledger
/// - `admin_user`: Operators allowed to grant credits
/// - `stripe_event`: Processed webhook event ids
///
/// # Example
///
/// ```no_run
/// use songteam_shared::models::team::Team;
/// use songteam_shared::db::pool::{create_pool, DatabaseConfig};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let pool = create_pool(DatabaseConfig::default()).await?;
/// let team = Team::find_by_join_code(&pool, "teamab23").await?;
/// # Ok(())
/// # }
/// ```

pub mod accomplishment;
pub mod admin_user;
pub mod credit_transaction;
pub mod membership;
pub mod song;
pub mod stripe_event;
pub mod team;
