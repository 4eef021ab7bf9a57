/// Stripe integration
///
/// Two pieces:
///
/// - [`StripeClient::create_checkout_session`]: form-encoded `POST
///   /v1/checkout/sessions` for a one-off credit pack purchase
/// - [`verify_webhook_signature`]: checks the `Stripe-Signature` header on
///   incoming webhooks
///
/// # Webhook signatures
///
/// ```text
/// Stripe-Signature: t=1700000000,v1=5257a869...,v1=...
/// expected = hex(HMAC-SHA256(webhook_secret, "{t}.{raw body}"))
/// ```
///
/// The header may carry several `v1` entries during secret rotation; any
/// match is accepted. Timestamps more than five minutes away from now are
/// rejected to limit replays.

use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use songteam_shared::pricing::PricingPlan;
use std::collections::HashMap;
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

/// Maximum age (either direction) of a webhook timestamp, in seconds
pub const SIGNATURE_TOLERANCE_SECS: i64 = 300;

/// Event type that grants purchased credits
pub const CHECKOUT_COMPLETED: &str = "checkout.session.completed";

/// Stripe error types
#[derive(Debug, thiserror::Error)]
pub enum StripeError {
    #[error("Payments are not configured")]
    NotConfigured,

    #[error("No Stripe price configured for plan {0}")]
    MissingPrice(&'static str),

    #[error("Malformed Stripe-Signature header")]
    MalformedSignature,

    #[error("Webhook timestamp outside tolerance")]
    StaleTimestamp,

    #[error("Webhook signature mismatch")]
    SignatureMismatch,

    #[error("Invalid webhook payload: {0}")]
    InvalidPayload(String),

    #[error("Stripe request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Stripe API error ({status}): {message}")]
    Api { status: u16, message: String },
}

impl StripeError {
    /// Whether the error is the sender's fault (bad signature or payload)
    pub fn is_webhook_rejection(&self) -> bool {
        matches!(
            self,
            StripeError::MalformedSignature
                | StripeError::StaleTimestamp
                | StripeError::SignatureMismatch
                | StripeError::InvalidPayload(_)
        )
    }
}

fn expected_signature(
    payload: &[u8],
    secret: &str,
    timestamp: i64,
) -> Result<HmacSha256, StripeError> {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| StripeError::NotConfigured)?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    Ok(mac)
}

/// Verifies a `Stripe-Signature` header against the raw request body
///
/// # Arguments
///
/// * `payload` - Raw request body, exactly as received
/// * `header` - `Stripe-Signature` header value
/// * `secret` - Webhook signing secret (`whsec_...`)
/// * `now` - Current Unix time in seconds
///
/// # Errors
///
/// - `MalformedSignature` if `t` or `v1` is missing or unparsable
/// - `StaleTimestamp` if `t` is outside [`SIGNATURE_TOLERANCE_SECS`]
/// - `SignatureMismatch` if no `v1` matches
pub fn verify_webhook_signature(
    payload: &[u8],
    header: &str,
    secret: &str,
    now: i64,
) -> Result<(), StripeError> {
    let mut timestamp: Option<i64> = None;
    let mut signatures: Vec<Vec<u8>> = Vec::new();

    for part in header.split(',') {
        let Some((key, value)) = part.trim().split_once('=') else {
            continue;
        };
        match key {
            "t" => {
                timestamp = Some(value.parse().map_err(|_| StripeError::MalformedSignature)?);
            }
            "v1" => {
                signatures.push(hex::decode(value).map_err(|_| StripeError::MalformedSignature)?);
            }
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or(StripeError::MalformedSignature)?;
    if signatures.is_empty() {
        return Err(StripeError::MalformedSignature);
    }

    // `t` is attacker-controlled until the signature checks out
    let skew = now.checked_sub(timestamp).map(i64::unsigned_abs);
    if skew.map_or(true, |skew| skew > SIGNATURE_TOLERANCE_SECS.unsigned_abs()) {
        return Err(StripeError::StaleTimestamp);
    }

    let expected = expected_signature(payload, secret, timestamp)?;
    let matched = signatures
        .iter()
        .any(|signature| expected.clone().verify_slice(signature).is_ok());

    if matched {
        Ok(())
    } else {
        Err(StripeError::SignatureMismatch)
    }
}

/// Builds a `Stripe-Signature` header value for a payload
///
/// Used by tests and local tooling that replays events.
pub fn sign_payload(payload: &[u8], secret: &str, timestamp: i64) -> Result<String, StripeError> {
    let signature = hex::encode(
        expected_signature(payload, secret, timestamp)?
            .finalize()
            .into_bytes(),
    );
    Ok(format!("t={},v1={}", timestamp, signature))
}

/// Webhook envelope
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEvent {
    pub id: String,

    #[serde(rename = "type")]
    pub event_type: String,

    pub data: WebhookEventData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEventData {
    pub object: serde_json::Value,
}

impl WebhookEvent {
    pub fn parse(payload: &[u8]) -> Result<Self, StripeError> {
        serde_json::from_slice(payload).map_err(|e| StripeError::InvalidPayload(e.to_string()))
    }
}

/// The parts of a Checkout Session the webhook cares about
#[derive(Debug, Clone, Deserialize)]
pub struct CompletedCheckout {
    pub id: String,

    pub payment_intent: Option<String>,

    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

/// Credit purchase described by a completed checkout
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Purchase {
    pub team_id: Uuid,
    pub user_id: Option<Uuid>,
    pub credits: i32,
    /// Idempotency key: the payment intent, or the session id if absent
    pub payment_id: String,
}

impl CompletedCheckout {
    pub fn from_event(event: &WebhookEvent) -> Result<Self, StripeError> {
        serde_json::from_value(event.data.object.clone())
            .map_err(|e| StripeError::InvalidPayload(e.to_string()))
    }

    fn metadata(&self, snake: &str, camel: &str) -> Option<&str> {
        self.metadata
            .get(snake)
            .or_else(|| self.metadata.get(camel))
            .map(String::as_str)
    }

    /// Reads the purchase back out of the session metadata
    pub fn purchase(&self) -> Result<Purchase, StripeError> {
        let team_id = self
            .metadata("team_id", "teamId")
            .and_then(|v| Uuid::parse_str(v).ok())
            .ok_or_else(|| StripeError::InvalidPayload("missing team_id metadata".to_string()))?;

        let user_id = self
            .metadata("user_id", "userId")
            .and_then(|v| Uuid::parse_str(v).ok());

        let credits = self
            .metadata("credits", "credits")
            .and_then(|v| v.parse::<i32>().ok())
            .filter(|c| *c > 0)
            .ok_or_else(|| StripeError::InvalidPayload("missing credits metadata".to_string()))?;

        Ok(Purchase {
            team_id,
            user_id,
            credits,
            payment_id: self.payment_intent.clone().unwrap_or_else(|| self.id.clone()),
        })
    }
}

/// Parameters for a checkout session
#[derive(Debug, Clone)]
pub struct CheckoutRequest<'a> {
    pub team_id: Uuid,
    pub user_id: Uuid,
    pub plan: PricingPlan,
    pub price_id: &'a str,
    pub customer_email: Option<&'a str>,
    pub success_url: String,
    pub cancel_url: String,
}

impl CheckoutRequest<'_> {
    /// Form fields in Stripe's bracket notation
    pub fn form(&self) -> Vec<(&'static str, String)> {
        let mut form = vec![
            ("mode", "payment".to_string()),
            ("payment_method_types[0]", "card".to_string()),
            ("line_items[0][price]", self.price_id.to_string()),
            ("line_items[0][quantity]", "1".to_string()),
            ("success_url", self.success_url.clone()),
            ("cancel_url", self.cancel_url.clone()),
            ("metadata[team_id]", self.team_id.to_string()),
            ("metadata[user_id]", self.user_id.to_string()),
            ("metadata[credits]", self.plan.credits().to_string()),
            ("metadata[plan]", self.plan.as_str().to_string()),
        ];

        if let Some(email) = self.customer_email {
            form.push(("customer_email", email.to_string()));
        }

        form
    }
}

/// Created checkout session
#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    pub url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StripeErrorBody {
    error: StripeErrorDetail,
}

#[derive(Debug, Deserialize)]
struct StripeErrorDetail {
    message: Option<String>,
}

/// Minimal Stripe API client
#[derive(Debug, Clone)]
pub struct StripeClient {
    http: reqwest::Client,
    api_base: String,
    secret_key: String,
}

impl StripeClient {
    pub fn new(http: reqwest::Client, api_base: impl Into<String>, secret_key: impl Into<String>) -> Self {
        StripeClient {
            http,
            api_base: api_base.into(),
            secret_key: secret_key.into(),
        }
    }

    /// Creates a payment-mode Checkout Session
    pub async fn create_checkout_session(
        &self,
        request: &CheckoutRequest<'_>,
    ) -> Result<CheckoutSession, StripeError> {
        let response = self
            .http
            .post(format!("{}/v1/checkout/sessions", self.api_base))
            .bearer_auth(&self.secret_key)
            .form(&request.form())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<StripeErrorBody>(&body)
                .ok()
                .and_then(|b| b.error.message)
                .unwrap_or(body);
            return Err(StripeError::Api {
                status: status.as_u16(),
                message,
            });
        }

        Ok(response.json::<CheckoutSession>().await?)
    }
}
