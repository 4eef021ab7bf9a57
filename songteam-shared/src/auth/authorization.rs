/// Authorization checks
///
/// Authentication says who the caller is; these helpers decide what they may
/// touch. Every team-scoped endpoint starts with one of them.
///
/// | Check                   | Passes when                              |
/// |-------------------------|------------------------------------------|
/// | `require_membership`    | caller has any role in the team          |
/// | `require_team_owner`    | caller is the team's owner               |
/// | `require_credit_admin`  | caller is an admin with `can_grant_credits` |
///
/// # Example
///
/// ```no_run
/// # use songteam_shared::auth::authorization::require_membership;
/// # use sqlx::PgPool;
/// # use uuid::Uuid;
/// # async fn example(pool: PgPool, team_id: Uuid, user_id: Uuid) -> Result<(), Box<dyn std::error::Error>> {
/// let role = require_membership(&pool, team_id, user_id).await?;
/// println!("caller is {}", role.as_str());
/// # Ok(())
/// # }
/// ```

use crate::models::admin_user::AdminUser;
use crate::models::membership::{MemberRole, TeamMember};
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

/// Authorization error types
#[derive(Debug, thiserror::Error)]
pub enum AuthzError {
    #[error("Not a member of team {0}")]
    NotMember(Uuid),

    #[error("Only the team owner can do this for team {0}")]
    NotOwner(Uuid),

    #[error("Not authorized to grant credits")]
    NotCreditAdmin,

    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),
}

/// Ensures the user belongs to the team
///
/// # Returns
///
/// The user's role
///
/// # Errors
///
/// Returns `AuthzError::NotMember` if the user has no membership
pub async fn require_membership<'e>(
    executor: impl PgExecutor<'e>,
    team_id: Uuid,
    user_id: Uuid,
) -> Result<MemberRole, AuthzError> {
    TeamMember::get_role(executor, team_id, user_id)
        .await?
        .ok_or(AuthzError::NotMember(team_id))
}

/// Ensures the user owns the team
///
/// Non-members get `NotMember`, members get `NotOwner`; both map to 403.
pub async fn require_team_owner(
    pool: &PgPool,
    team_id: Uuid,
    user_id: Uuid,
) -> Result<(), AuthzError> {
    let role = require_membership(pool, team_id, user_id).await?;

    if !role.can_manage_billing() {
        return Err(AuthzError::NotOwner(team_id));
    }

    Ok(())
}

/// Ensures the user may grant credits to any team
pub async fn require_credit_admin(pool: &PgPool, user_id: Uuid) -> Result<(), AuthzError> {
    match AdminUser::find(pool, user_id).await? {
        Some(admin) if admin.can_grant_credits => Ok(()),
        _ => Err(AuthzError::NotCreditAdmin),
    }
}
