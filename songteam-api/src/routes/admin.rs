/// Admin endpoints
///
/// ```text
/// POST /v1/admin/grant-credits
///
/// { "team_id": "uuid", "credits": 10, "notes": "Conference promo" }
/// ```
///
/// ```json
/// { "success": true, "message": "Successfully granted 10 credits to Platform", "new_balance": 13 }
/// ```
///
/// Only users listed in `admin_users` with `can_grant_credits` may call it.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
};
use axum::{extract::State, Extension, Json};
use serde::{Deserialize, Serialize};
use songteam_shared::{
    auth::{authorization::require_credit_admin, middleware::AuthContext},
    ledger::{self, GrantRequest, LedgerError},
    models::{credit_transaction::TransactionType, team::Team},
};
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct GrantCreditsRequest {
    pub team_id: Uuid,
    pub credits: i32,
    pub notes: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct GrantCreditsResponse {
    pub success: bool,
    pub message: String,
    pub new_balance: i32,
}

/// Grant credits to any team
///
/// # Errors
///
/// - `400 Bad Request`: `credits` is not positive
/// - `403 Forbidden`: Caller is not a credit admin
/// - `404 Not Found`: Unknown team
pub async fn grant_credits(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<GrantCreditsRequest>,
) -> ApiResult<Json<GrantCreditsResponse>> {
    require_credit_admin(&state.db, auth.user_id).await?;

    if req.credits <= 0 {
        return Err(LedgerError::InvalidAmount(req.credits).into());
    }

    let notes = req
        .notes
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| format!("Admin granted {} credits", req.credits));

    let mut tx = state.db.begin().await?;

    let outcome = ledger::grant_in(
        &mut tx,
        GrantRequest {
            team_id: req.team_id,
            amount: req.credits,
            transaction_type: TransactionType::AdminGranted,
            user_id: Some(auth.user_id),
            song_id: None,
            stripe_payment_id: None,
            notes: Some(notes),
        },
    )
    .await?;

    let team = Team::find_by_id(&mut *tx, req.team_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Team not found".to_string()))?;

    tx.commit().await?;

    tracing::info!(
        admin_id = %auth.user_id,
        team_id = %req.team_id,
        credits = req.credits,
        new_balance = outcome.balance(),
        "Admin granted credits"
    );

    Ok(Json(GrantCreditsResponse {
        success: true,
        message: format!("Successfully granted {} credits to {}", req.credits, team.name),
        new_balance: outcome.balance(),
    }))
}
