/// Error handling for the API server
///
/// This module provides a unified error type that maps to HTTP responses.
/// All handlers should return `Result<T, ApiError>` which automatically
/// converts to appropriate HTTP status codes.
///
/// | Status | `error`                 | Raised for                                    |
/// |--------|-------------------------|-----------------------------------------------|
/// | 400    | `bad_request`           | malformed input, bad webhook signature        |
/// | 400    | `validation_error`      | field-level validation failures               |
/// | 401    | `unauthorized`          | missing or invalid token                      |
/// | 402    | `insufficient_credits`  | song requested with no credits left           |
/// | 403    | `forbidden`             | not a member, not the owner, not an admin     |
/// | 404    | `not_found`             | unknown team, song or join code               |
/// | 409    | `already_member`        | joining a team twice                          |
/// | 429    | `rate_limit_exceeded`   | per-user rate limit                           |
/// | 500    | `internal_error`        | anything unexpected (details only in logs)    |
///
/// # Example
///
/// ```
/// use songteam_api::error::{ApiError, ApiResult};
/// use axum::Json;
/// use serde_json::json;
///
/// async fn handler(credits: i32) -> ApiResult<Json<serde_json::Value>> {
///     if credits < 1 {
///         return Err(ApiError::PaymentRequired("No song credits remaining".to_string()));
///     }
///     Ok(Json(json!({ "credits": credits })))
/// }
/// ```

use crate::stripe::StripeError;
use axum::{
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use songteam_shared::auth::authorization::AuthzError;
use songteam_shared::auth::jwt::JwtError;
use songteam_shared::auth::middleware::AuthError;
use songteam_shared::ledger::LedgerError;
use songteam_shared::models::team::TeamError;
use std::fmt;
use uuid::Uuid;

/// API result type alias
pub type ApiResult<T> = Result<T, ApiError>;

/// Unified API error type
#[derive(Debug)]
pub enum ApiError {
    /// Bad request (400)
    BadRequest(String),

    /// Unauthorized (401)
    Unauthorized(String),

    /// Payment required (402) - no song credits left
    PaymentRequired(String),

    /// Forbidden (403)
    Forbidden(String),

    /// Not found (404)
    NotFound(String),

    /// Conflict (409) - caller already belongs to the team
    AlreadyMember { team_id: Uuid },

    /// Bad request (400) - field-level validation errors
    ValidationError(Vec<ValidationErrorDetail>),

    /// Too many requests (429)
    RateLimitExceeded {
        retry_after: u64,
        message: String,
    },

    /// Internal server error (500)
    InternalError(String),

    /// Service unavailable (503)
    ServiceUnavailable(String),
}

/// Validation error detail
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationErrorDetail {
    /// Field that failed validation
    pub field: String,

    /// Error message
    pub message: String,
}

/// Error response format
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error code (e.g., "bad_request", "unauthorized")
    pub error: String,

    /// Human-readable error message
    pub message: String,

    /// Optional validation errors
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<ValidationErrorDetail>>,

    /// Team the caller already belongs to (409 only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub team_id: Option<Uuid>,
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            ApiError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            ApiError::PaymentRequired(msg) => write!(f, "Payment required: {}", msg),
            ApiError::Forbidden(msg) => write!(f, "Forbidden: {}", msg),
            ApiError::NotFound(msg) => write!(f, "Not found: {}", msg),
            ApiError::AlreadyMember { team_id } => {
                write!(f, "Conflict: already a member of team {}", team_id)
            }
            ApiError::ValidationError(errors) => {
                write!(f, "Validation failed: {} errors", errors.len())
            }
            ApiError::RateLimitExceeded { message, .. } => write!(f, "Rate limit exceeded: {}", message),
            ApiError::InternalError(msg) => write!(f, "Internal error: {}", msg),
            ApiError::ServiceUnavailable(msg) => write!(f, "Service unavailable: {}", msg),
        }
    }
}

impl std::error::Error for ApiError {}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) | ApiError::ValidationError(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::PaymentRequired(_) => StatusCode::PAYMENT_REQUIRED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::AlreadyMember { .. } => StatusCode::CONFLICT,
            ApiError::RateLimitExceeded { .. } => StatusCode::TOO_MANY_REQUESTS,
            ApiError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let retry_after = match &self {
            ApiError::RateLimitExceeded { retry_after, .. } => Some(*retry_after),
            _ => None,
        };

        let mut team_id = None;
        let (error_code, message, details) = match self {
            ApiError::BadRequest(msg) => ("bad_request", msg, None),
            ApiError::Unauthorized(msg) => ("unauthorized", msg, None),
            ApiError::PaymentRequired(msg) => ("insufficient_credits", msg, None),
            ApiError::Forbidden(msg) => ("forbidden", msg, None),
            ApiError::NotFound(msg) => ("not_found", msg, None),
            ApiError::AlreadyMember { team_id: id } => {
                team_id = Some(id);
                (
                    "already_member",
                    "You are already a member of this team".to_string(),
                    None,
                )
            }
            ApiError::ValidationError(errors) => (
                "validation_error",
                "Request validation failed".to_string(),
                Some(errors),
            ),
            ApiError::RateLimitExceeded { message, .. } => ("rate_limit_exceeded", message, None),
            ApiError::InternalError(msg) => {
                // Log internal errors but don't expose details to clients
                tracing::error!("Internal error: {}", msg);
                (
                    "internal_error",
                    "An internal error occurred".to_string(),
                    None,
                )
            }
            ApiError::ServiceUnavailable(msg) => ("service_unavailable", msg, None),
        };

        let body = Json(ErrorResponse {
            error: error_code.to_string(),
            message,
            details,
            team_id,
        });

        let mut response = (status, body).into_response();
        if let Some(secs) = retry_after {
            response
                .headers_mut()
                .insert("Retry-After", HeaderValue::from(secs));
        }
        response
    }
}

/// Convert sqlx errors to API errors
impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => ApiError::NotFound("Resource not found".to_string()),
            _ => ApiError::InternalError(format!("Database error: {}", err)),
        }
    }
}

/// Convert validator errors to API errors
impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut details: Vec<ValidationErrorDetail> = errors
            .field_errors()
            .into_iter()
            .flat_map(|(field, errs)| {
                errs.iter().map(move |e| ValidationErrorDetail {
                    field: field.to_string(),
                    message: e
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| format!("Invalid value ({})", e.code)),
                })
            })
            .collect();
        details.sort_by(|a, b| a.field.cmp(&b.field));
        ApiError::ValidationError(details)
    }
}

/// Convert auth errors to API errors
impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::MissingCredentials => {
                ApiError::Unauthorized("Missing authorization header".to_string())
            }
            AuthError::InvalidFormat => ApiError::Unauthorized("Expected Bearer token".to_string()),
            AuthError::InvalidToken(err) => err.into(),
        }
    }
}

/// Convert JWT errors to API errors
impl From<JwtError> for ApiError {
    fn from(err: JwtError) -> Self {
        match err {
            JwtError::Expired => ApiError::Unauthorized("Token expired".to_string()),
            JwtError::InvalidAudience => {
                ApiError::Unauthorized("Invalid token audience".to_string())
            }
            JwtError::CreateError(msg) => ApiError::InternalError(msg),
            _ => ApiError::Unauthorized(format!("Invalid token: {}", err)),
        }
    }
}

/// Convert authorization errors to API errors
impl From<AuthzError> for ApiError {
    fn from(err: AuthzError) -> Self {
        match err {
            AuthzError::NotMember(_) => {
                ApiError::Forbidden("Not a member of this team".to_string())
            }
            AuthzError::NotOwner(_) => {
                ApiError::Forbidden("Only the team owner can do this".to_string())
            }
            AuthzError::NotCreditAdmin => {
                ApiError::Forbidden("Not authorized to grant credits".to_string())
            }
            AuthzError::DatabaseError(err) => {
                ApiError::InternalError(format!("Database error: {}", err))
            }
        }
    }
}

/// Convert ledger errors to API errors
impl From<LedgerError> for ApiError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::InsufficientCredits { .. } => ApiError::PaymentRequired(
                "No song credits remaining. Purchase more credits to continue.".to_string(),
            ),
            LedgerError::TeamNotFound(_) => ApiError::NotFound("Team not found".to_string()),
            LedgerError::InvalidAmount(amount) if amount > 0 => {
                ApiError::BadRequest("Credit amount would overflow the team balance".to_string())
            }
            LedgerError::InvalidAmount(_) => {
                ApiError::BadRequest("Credits must be a positive number".to_string())
            }
            err @ (LedgerError::InvalidTransactionType(_)
            | LedgerError::AlreadyConsumed(_)
            | LedgerError::Database(_)) => ApiError::InternalError(err.to_string()),
        }
    }
}

/// Convert team creation errors to API errors
impl From<TeamError> for ApiError {
    fn from(err: TeamError) -> Self {
        ApiError::InternalError(err.to_string())
    }
}

/// Convert Stripe errors to API errors
impl From<StripeError> for ApiError {
    fn from(err: StripeError) -> Self {
        match err {
            StripeError::NotConfigured | StripeError::MissingPrice(_) => {
                tracing::warn!(error = %err, "Payments unavailable");
                ApiError::ServiceUnavailable("Payments are not available".to_string())
            }
            e if e.is_webhook_rejection() => ApiError::BadRequest(format!("Webhook Error: {}", e)),
            e => ApiError::InternalError(format!("Stripe error: {}", e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ApiError::BadRequest("Invalid input".to_string());
        assert_eq!(err.to_string(), "Bad request: Invalid input");

        let err = ApiError::NotFound("Team not found".to_string());
        assert_eq!(err.to_string(), "Not found: Team not found");
    }

    #[test]
    fn test_validation_error() {
        let errors = vec![
            ValidationErrorDetail {
                field: "name".to_string(),
                message: "Team name is required".to_string(),
            },
            ValidationErrorDetail {
                field: "text".to_string(),
                message: "Too long".to_string(),
            },
        ];

        let err = ApiError::ValidationError(errors);
        assert_eq!(err.to_string(), "Validation failed: 2 errors");
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(
            ApiError::from(LedgerError::InsufficientCredits {
                team_id: Uuid::nil(),
                balance: 0
            })
            .status(),
            StatusCode::PAYMENT_REQUIRED
        );
        assert_eq!(
            ApiError::from(AuthzError::NotMember(Uuid::nil())).status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            ApiError::from(AuthError::MissingCredentials).status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ApiError::AlreadyMember { team_id: Uuid::nil() }.status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ApiError::from(StripeError::SignatureMismatch).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(LedgerError::TeamNotFound(Uuid::nil())).status(),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn test_invalid_amounts_are_bad_requests() {
        let overflow = ApiError::from(LedgerError::InvalidAmount(i32::MAX));
        assert_eq!(overflow.status(), StatusCode::BAD_REQUEST);
        assert!(overflow.to_string().contains("overflow"));

        let zero = ApiError::from(LedgerError::InvalidAmount(0));
        assert_eq!(zero.status(), StatusCode::BAD_REQUEST);
        assert!(zero.to_string().contains("positive"));
    }

    #[tokio::test]
    async fn test_conflict_body_carries_team_id() {
        let team_id = Uuid::new_v4();
        let response = ApiError::AlreadyMember { team_id }.into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: ErrorResponse = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body.error, "already_member");
        assert_eq!(body.team_id, Some(team_id));
    }

    #[test]
    fn test_rate_limit_sets_retry_after() {
        let response = ApiError::RateLimitExceeded {
            retry_after: 7,
            message: "slow down".to_string(),
        }
        .into_response();

        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers().get("Retry-After").unwrap(), "7");
    }
}
