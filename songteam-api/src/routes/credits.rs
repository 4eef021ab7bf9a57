/// Credit balance and ledger
///
/// ```text
/// GET /v1/teams/:id/credits?limit=20
/// ```
///
/// ```json
/// {
///   "team_id": "uuid",
///   "balance": 3,
///   "transactions": [
///     { "amount": -1, "transaction_type": "consumed", "balance_after": 3, ... }
///   ]
/// }
/// ```

use crate::{app::AppState, error::ApiResult};
use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use songteam_shared::{
    auth::{authorization::require_membership, middleware::AuthContext},
    ledger,
    models::credit_transaction::CreditTransaction,
};
use uuid::Uuid;

#[derive(Debug, Default, Deserialize)]
pub struct CreditsQuery {
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct CreditsResponse {
    pub team_id: Uuid,
    pub balance: i32,

    /// Newest first
    pub transactions: Vec<CreditTransaction>,
}

pub async fn get_credits(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(team_id): Path<Uuid>,
    Query(query): Query<CreditsQuery>,
) -> ApiResult<Json<CreditsResponse>> {
    require_membership(&state.db, team_id, auth.user_id).await?;

    let limit = query.limit.unwrap_or(20).clamp(1, 100);
    let balance = ledger::balance(&state.db, team_id).await?;
    let transactions = ledger::history(&state.db, team_id, limit).await?;

    Ok(Json(CreditsResponse {
        team_id,
        balance,
        transactions,
    }))
}
