/// Team endpoints
///
/// # Endpoints
///
/// - `POST /v1/teams` - Create a team; the caller becomes its owner
/// - `GET /v1/teams` - Teams the caller belongs to
/// - `POST /v1/teams/join` - Join a team by its 8-character code
/// - `GET /v1/teams/:id` - Team details (members only)
/// - `GET /v1/teams/:id/members` - Member list (members only)

use crate::{
    app::AppState,
    error::{ApiError, ApiResult, ValidationErrorDetail},
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use songteam_shared::{
    auth::{authorization::require_membership, middleware::AuthContext},
    join_code,
    ledger::{self, GrantRequest},
    models::{
        credit_transaction::TransactionType,
        membership::{CreateTeamMember, MemberRole, TeamMember},
        team::{CreateTeam, Team},
    },
};
use uuid::Uuid;
use validator::Validate;

/// Create team request
#[derive(Debug, Deserialize, Validate)]
pub struct CreateTeamRequest {
    #[validate(length(min = 1, max = 100, message = "Team name must be 1-100 characters"))]
    pub name: String,
}

/// Join team request
#[derive(Debug, Deserialize)]
pub struct JoinTeamRequest {
    #[serde(default)]
    pub join_code: String,
}

/// Team as seen by one of its members
#[derive(Debug, Serialize)]
pub struct TeamResponse {
    pub id: Uuid,
    pub name: String,
    pub join_code: String,
    pub song_credits_remaining: i32,

    /// Caller's role in the team
    pub role: MemberRole,

    pub created_at: DateTime<Utc>,
}

impl TeamResponse {
    fn new(team: Team, role: MemberRole) -> Self {
        TeamResponse {
            id: team.id,
            name: team.name,
            join_code: team.join_code,
            song_credits_remaining: team.song_credits_remaining,
            role,
            created_at: team.created_at,
        }
    }
}

/// List teams response
#[derive(Debug, Serialize)]
pub struct ListTeamsResponse {
    pub teams: Vec<TeamResponse>,
}

/// Join team response
#[derive(Debug, Serialize)]
pub struct JoinTeamResponse {
    pub success: bool,
    pub team_id: Uuid,
    pub team_name: String,
    pub message: String,
}

/// Team detail response
#[derive(Debug, Serialize)]
pub struct TeamDetailResponse {
    #[serde(flatten)]
    pub team: TeamResponse,

    pub member_count: i64,
}

/// Member list response
#[derive(Debug, Serialize)]
pub struct ListMembersResponse {
    pub members: Vec<TeamMember>,
}

/// Create a team
///
/// Team row, owner membership and (if `NEW_TEAM_CREDITS` is set) the
/// welcome grant are written in one transaction.
///
/// # Endpoint
///
/// ```text
/// POST /v1/teams
/// Authorization: Bearer <jwt_token>
///
/// { "name": "Platform" }
/// ```
///
/// # Response (201)
///
/// ```json
/// {
///   "id": "uuid",
///   "name": "Platform",
///   "join_code": "TEAMAB23",
///   "song_credits_remaining": 0,
///   "role": "owner",
///   "created_at": "2025-01-06T12:00:00Z"
/// }
/// ```
///
/// # Errors
///
/// - `400 Bad Request`: Name empty or longer than 100 characters
/// - `401 Unauthorized`: Missing or invalid JWT token
/// - `500 Internal Server Error`: Join code space exhausted or database error
pub async fn create_team(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(mut req): Json<CreateTeamRequest>,
) -> ApiResult<(StatusCode, Json<TeamResponse>)> {
    req.name = req.name.trim().to_string();
    req.validate()?;

    let mut tx = state.db.begin().await?;

    let mut team = Team::create(
        &mut tx,
        CreateTeam {
            name: req.name,
            owner_id: auth.user_id,
        },
    )
    .await?;

    TeamMember::insert_if_absent(
        &mut *tx,
        CreateTeamMember {
            team_id: team.id,
            user_id: auth.user_id,
            role: MemberRole::Owner,
        },
    )
    .await?;

    let welcome_credits = state.config.new_team_credits;
    if welcome_credits > 0 {
        let outcome = ledger::grant_in(
            &mut tx,
            GrantRequest {
                team_id: team.id,
                amount: welcome_credits,
                transaction_type: TransactionType::Granted,
                user_id: Some(auth.user_id),
                song_id: None,
                stripe_payment_id: None,
                notes: Some(format!("Welcome credits ({})", welcome_credits)),
            },
        )
        .await?;
        team.song_credits_remaining = outcome.balance();
    }

    tx.commit().await?;

    tracing::info!(
        team_id = %team.id,
        owner_id = %auth.user_id,
        join_code = %team.join_code,
        "Team created"
    );

    Ok((
        StatusCode::CREATED,
        Json(TeamResponse::new(team, MemberRole::Owner)),
    ))
}

/// List the caller's teams
///
/// # Endpoint
///
/// ```text
/// GET /v1/teams
/// ```
pub async fn list_teams(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<ListTeamsResponse>> {
    let teams = Team::list_for_user(&state.db, auth.user_id).await?;

    let teams = teams
        .into_iter()
        .map(|team| {
            let role = if team.owner_id == auth.user_id {
                MemberRole::Owner
            } else {
                MemberRole::Member
            };
            TeamResponse::new(team, role)
        })
        .collect();

    Ok(Json(ListTeamsResponse { teams }))
}

/// Join a team by code
///
/// Codes are matched case-insensitively after trimming.
///
/// # Endpoint
///
/// ```text
/// POST /v1/teams/join
///
/// { "join_code": "teamab23" }
/// ```
///
/// # Errors
///
/// - `400 Bad Request`: No code given
/// - `404 Not Found`: No team has this code
/// - `409 Conflict`: Caller already belongs to the team (body carries `team_id`)
pub async fn join_team(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<JoinTeamRequest>,
) -> ApiResult<Json<JoinTeamResponse>> {
    let code = join_code::normalize(&req.join_code);
    if code.is_empty() {
        return Err(ApiError::ValidationError(vec![ValidationErrorDetail {
            field: "join_code".to_string(),
            message: "Join code required".to_string(),
        }]));
    }

    let team = Team::find_by_join_code(&state.db, &code)
        .await?
        .ok_or_else(|| {
            ApiError::NotFound("Invalid join code. Please check and try again.".to_string())
        })?;

    let added = TeamMember::insert_if_absent(
        &state.db,
        CreateTeamMember {
            team_id: team.id,
            user_id: auth.user_id,
            role: MemberRole::Member,
        },
    )
    .await?;

    if added.is_none() {
        return Err(ApiError::AlreadyMember { team_id: team.id });
    }

    tracing::info!(team_id = %team.id, user_id = %auth.user_id, "User joined team");

    Ok(Json(JoinTeamResponse {
        success: true,
        team_id: team.id,
        message: format!("Successfully joined {}!", team.name),
        team_name: team.name,
    }))
}

/// Get one team
///
/// # Errors
///
/// - `403 Forbidden`: Caller is not a member
/// - `404 Not Found`: Team vanished between the membership check and the read
pub async fn get_team(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(team_id): Path<Uuid>,
) -> ApiResult<Json<TeamDetailResponse>> {
    let role = require_membership(&state.db, team_id, auth.user_id).await?;

    let team = Team::find_by_id(&state.db, team_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Team not found".to_string()))?;

    let member_count = TeamMember::count_by_team(&state.db, team_id).await?;

    Ok(Json(TeamDetailResponse {
        team: TeamResponse::new(team, role),
        member_count,
    }))
}

/// List a team's members
pub async fn list_members(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(team_id): Path<Uuid>,
) -> ApiResult<Json<ListMembersResponse>> {
    require_membership(&state.db, team_id, auth.user_id).await?;

    let members = TeamMember::list_by_team(&state.db, team_id).await?;

    Ok(Json(ListMembersResponse { members }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_team_validation() {
        let ok = CreateTeamRequest {
            name: "Platform".to_string(),
        };
        assert!(ok.validate().is_ok());

        let empty = CreateTeamRequest {
            name: String::new(),
        };
        assert!(empty.validate().is_err());

        let long = CreateTeamRequest {
            name: "x".repeat(101),
        };
        assert!(long.validate().is_err());
    }

    #[test]
    fn test_join_request_defaults_to_empty_code() {
        let req: JoinTeamRequest = serde_json::from_str("{}").unwrap();
        assert!(req.join_code.is_empty());
    }
}
