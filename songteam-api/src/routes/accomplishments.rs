/// Accomplishment endpoints
///
/// - `POST /v1/teams/:id/accomplishments` - Log an accomplishment
/// - `GET /v1/teams/:id/accomplishments?unused=true&limit=50` - List them
///
/// Both are members only.

use crate::{app::AppState, error::ApiResult};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use songteam_shared::{
    auth::{authorization::require_membership, middleware::AuthContext},
    models::accomplishment::{Accomplishment, CreateAccomplishment},
};
use uuid::Uuid;
use validator::Validate;

const DEFAULT_LIMIT: i64 = 50;
const MAX_LIMIT: i64 = 200;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateAccomplishmentRequest {
    /// Trimmed before validation
    #[serde(default)]
    #[validate(length(min = 1, max = 2000, message = "Accomplishment text must be 1-2000 characters"))]
    pub text: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListAccomplishmentsQuery {
    /// Only accomplishments no song has claimed yet
    #[serde(default)]
    pub unused: bool,

    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct ListAccomplishmentsResponse {
    pub accomplishments: Vec<Accomplishment>,
}

/// Log an accomplishment
///
/// # Errors
///
/// - `400 Bad Request`: Empty or over-long text
/// - `403 Forbidden`: Caller is not a member
pub async fn create_accomplishment(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(team_id): Path<Uuid>,
    Json(mut req): Json<CreateAccomplishmentRequest>,
) -> ApiResult<(StatusCode, Json<Accomplishment>)> {
    req.text = req.text.trim().to_string();
    req.validate()?;

    require_membership(&state.db, team_id, auth.user_id).await?;

    let accomplishment = Accomplishment::create(
        &state.db,
        CreateAccomplishment {
            team_id,
            user_id: auth.user_id,
            text: req.text,
        },
    )
    .await?;

    tracing::debug!(
        team_id = %team_id,
        accomplishment_id = %accomplishment.id,
        "Accomplishment logged"
    );

    Ok((StatusCode::CREATED, Json(accomplishment)))
}

/// List a team's accomplishments, newest first
pub async fn list_accomplishments(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(team_id): Path<Uuid>,
    Query(query): Query<ListAccomplishmentsQuery>,
) -> ApiResult<Json<ListAccomplishmentsResponse>> {
    require_membership(&state.db, team_id, auth.user_id).await?;

    let limit = query.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let accomplishments =
        Accomplishment::list_by_team(&state.db, team_id, query.unused, limit).await?;

    Ok(Json(ListAccomplishmentsResponse { accomplishments }))
}
