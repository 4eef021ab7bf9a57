/// Billing endpoints
///
/// # Endpoints
///
/// - `GET /v1/billing/plans` - Credit packs on sale
/// - `POST /v1/billing/checkout` - Start a Stripe Checkout for a team (owner only)
/// - `POST /v1/billing/webhook` - Stripe webhook receiver (no JWT; signed)
///
/// # Purchase Flow
///
/// ```text
/// owner -> POST /checkout -> Stripe hosted page -> pays
///   Stripe -> POST /webhook (checkout.session.completed)
///     verify signature
///     BEGIN
///       claim event id            (redelivery -> 200, nothing granted)
///       grant `purchased` credits (keyed by payment intent)
///     COMMIT
/// ```

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    stripe::{
        verify_webhook_signature, CheckoutRequest, CompletedCheckout, Purchase, StripeError,
        WebhookEvent, CHECKOUT_COMPLETED,
    },
};
use axum::{
    extract::State,
    http::HeaderMap,
    Extension, Json,
};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use songteam_shared::{
    auth::{authorization::require_team_owner, middleware::AuthContext},
    ledger::{self, GrantOutcome, GrantRequest, LedgerError},
    models::{credit_transaction::TransactionType, stripe_event::StripeWebhookEvent},
    pricing::{InvalidPlan, PricingPlan},
};
use uuid::Uuid;

const SIGNATURE_HEADER: &str = "stripe-signature";

#[derive(Debug, Serialize)]
pub struct PlanInfo {
    pub id: &'static str,
    pub name: &'static str,
    pub credits: i32,
    pub price_cents: i64,
    pub price_per_song_cents: i64,
    pub popular: bool,
}

#[derive(Debug, Serialize)]
pub struct ListPlansResponse {
    pub plans: Vec<PlanInfo>,
}

#[derive(Debug, Deserialize)]
pub struct CreateCheckoutRequest {
    pub plan: String,
    pub team_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct CreateCheckoutResponse {
    /// Stripe-hosted checkout page
    pub url: String,
    pub session_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct WebhookAck {
    pub received: bool,
}

/// List credit packs
pub async fn list_plans() -> Json<ListPlansResponse> {
    Json(ListPlansResponse {
        plans: PricingPlan::ALL
            .iter()
            .map(|plan| PlanInfo {
                id: plan.as_str(),
                name: plan.name(),
                credits: plan.credits(),
                price_cents: plan.price_cents(),
                price_per_song_cents: plan.price_per_song_cents(),
                popular: plan.is_popular(),
            })
            .collect(),
    })
}

/// Start a Stripe Checkout
///
/// # Endpoint
///
/// ```text
/// POST /v1/billing/checkout
///
/// { "plan": "pro", "team_id": "uuid" }
/// ```
///
/// # Errors
///
/// - `400 Bad Request`: Unknown plan
/// - `403 Forbidden`: Caller does not own the team
/// - `503 Service Unavailable`: Stripe or the plan's price is not configured
pub async fn create_checkout(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<CreateCheckoutRequest>,
) -> ApiResult<Json<CreateCheckoutResponse>> {
    let plan: PricingPlan = req
        .plan
        .trim()
        .to_lowercase()
        .parse()
        .map_err(|e: InvalidPlan| ApiError::BadRequest(e.to_string()))?;

    require_team_owner(&state.db, req.team_id, auth.user_id).await?;

    let stripe = state.stripe.as_ref().ok_or(StripeError::NotConfigured)?;
    let price_id = state
        .config
        .stripe
        .price_id(plan)
        .ok_or(StripeError::MissingPrice(plan.as_str()))?;

    let app_url = &state.config.api.app_url;
    let session = stripe
        .create_checkout_session(&CheckoutRequest {
            team_id: req.team_id,
            user_id: auth.user_id,
            plan,
            price_id,
            customer_email: auth.email.as_deref(),
            success_url: format!("{}/dashboard?success=true", app_url),
            cancel_url: format!("{}/credits/purchase?canceled=true", app_url),
        })
        .await?;

    let url = session.url.ok_or_else(|| {
        ApiError::InternalError(format!("Checkout session {} has no URL", session.id))
    })?;

    tracing::info!(
        team_id = %req.team_id,
        user_id = %auth.user_id,
        plan = plan.as_str(),
        session_id = %session.id,
        "Checkout session created"
    );

    Ok(Json(CreateCheckoutResponse {
        url,
        session_id: session.id,
    }))
}

/// Receive a Stripe webhook
///
/// Always `{ "received": true }` once the signature checks out, including
/// for event types we ignore and for redeliveries.
///
/// # Errors
///
/// - `400 Bad Request`: Missing or invalid signature, or unparsable body
/// - `500 Internal Server Error`: Database failure (Stripe retries)
/// - `503 Service Unavailable`: No webhook secret configured
pub async fn stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<WebhookAck>> {
    let secret = state
        .config
        .stripe
        .webhook_secret
        .as_deref()
        .ok_or(StripeError::NotConfigured)?;

    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::BadRequest("Missing Stripe-Signature header".to_string()))?;

    if let Err(e) = verify_webhook_signature(&body, signature, secret, chrono::Utc::now().timestamp()) {
        tracing::warn!(error = %e, "Rejected Stripe webhook");
        return Err(e.into());
    }

    let event = WebhookEvent::parse(&body)?;

    if event.event_type == CHECKOUT_COMPLETED {
        handle_checkout_completed(&state, &event).await?;
    } else {
        tracing::debug!(event_id = %event.id, event_type = %event.event_type, "Ignoring Stripe event");
    }

    Ok(Json(WebhookAck { received: true }))
}

async fn handle_checkout_completed(state: &AppState, event: &WebhookEvent) -> ApiResult<()> {
    // A signed event we can't interpret won't improve on redelivery
    let purchase = match CompletedCheckout::from_event(event).and_then(|c| c.purchase()) {
        Ok(purchase) => purchase,
        Err(e) => {
            tracing::error!(event_id = %event.id, error = %e, "Unusable checkout.session.completed event");
            return Ok(());
        }
    };

    let mut tx = state.db.begin().await?;

    if !StripeWebhookEvent::claim(&mut tx, &event.id, &event.event_type).await? {
        tracing::info!(event_id = %event.id, "Duplicate Stripe event ignored");
        return Ok(());
    }

    match ledger::grant_in(&mut tx, purchase_grant(&purchase)).await {
        Ok(GrantOutcome::Granted { new_balance, .. }) => {
            tracing::info!(
                event_id = %event.id,
                team_id = %purchase.team_id,
                credits = purchase.credits,
                new_balance,
                "Purchased credits granted"
            );
        }
        Ok(GrantOutcome::Duplicate { .. }) => {
            tracing::info!(
                event_id = %event.id,
                payment_id = %purchase.payment_id,
                "Payment already credited"
            );
        }
        Err(LedgerError::TeamNotFound(team_id)) => {
            tracing::error!(event_id = %event.id, team_id = %team_id, "Paid checkout for unknown team");
        }
        Err(e) => return Err(e.into()),
    }

    tx.commit().await?;
    Ok(())
}

fn purchase_grant(purchase: &Purchase) -> GrantRequest {
    GrantRequest {
        team_id: purchase.team_id,
        amount: purchase.credits,
        transaction_type: TransactionType::Purchased,
        user_id: purchase.user_id,
        song_id: None,
        stripe_payment_id: Some(purchase.payment_id.clone()),
        notes: Some(format!("Purchased via Stripe - {} credits", purchase.credits)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_list_plans() {
        let Json(response) = list_plans().await;
        let ids: Vec<_> = response.plans.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec!["starter", "pro", "corporate"]);
        assert_eq!(response.plans[1].credits, 20);
    }

    #[test]
    fn test_purchase_grant() {
        let purchase = Purchase {
            team_id: Uuid::new_v4(),
            user_id: None,
            credits: 50,
            payment_id: "pi_123".to_string(),
        };

        let grant = purchase_grant(&purchase);
        assert_eq!(grant.transaction_type, TransactionType::Purchased);
        assert_eq!(grant.amount, 50);
        assert_eq!(grant.stripe_payment_id.as_deref(), Some("pi_123"));
        assert_eq!(grant.notes.as_deref(), Some("Purchased via Stripe - 50 credits"));
    }
}
