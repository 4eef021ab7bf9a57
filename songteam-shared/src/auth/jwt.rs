/// JWT access token validation
///
/// Sign-in is handled by an external identity provider that issues HS256
/// access tokens. This service never mints tokens in production; it only
/// checks the signature, expiry and audience, then trusts `sub` as the user
/// id. Token creation is kept for tests and local tooling.
///
/// # Expected claims
///
/// - `sub`: user id (UUID)
/// - `aud`: audience, `"authenticated"` by default
/// - `exp` / `iat`: Unix timestamps
/// - `email`: optional, used to prefill checkout
///
/// # Example
///
/// ```
/// use songteam_shared::auth::jwt::{create_token, validate_token, Claims, DEFAULT_AUDIENCE};
/// use uuid::Uuid;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let secret = "a-test-secret-that-is-at-least-32-bytes";
/// let user_id = Uuid::new_v4();
///
/// let token = create_token(&Claims::new(user_id, None, DEFAULT_AUDIENCE), secret)?;
/// let claims = validate_token(&token, secret, DEFAULT_AUDIENCE)?;
/// assert_eq!(claims.sub, user_id);
/// # Ok(())
/// # }
/// ```

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Audience the identity provider stamps on signed-in users' tokens
pub const DEFAULT_AUDIENCE: &str = "authenticated";

/// Lifetime of tokens created by [`Claims::new`]
pub const DEFAULT_TOKEN_LIFETIME_HOURS: i64 = 1;

/// Error type for JWT operations
#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    #[error("Failed to create token: {0}")]
    CreateError(String),

    #[error("Token has expired")]
    Expired,

    #[error("Invalid token audience")]
    InvalidAudience,

    #[error("Invalid token signature")]
    InvalidSignature,

    #[error("Invalid token: {0}")]
    Invalid(String),
}

/// Access token claims
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User ID
    pub sub: Uuid,

    /// Audience
    pub aud: String,

    /// Issued at (Unix timestamp)
    pub iat: i64,

    /// Expiration (Unix timestamp)
    pub exp: i64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    /// Provider role, e.g. `"authenticated"`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

impl Claims {
    /// Claims expiring after [`DEFAULT_TOKEN_LIFETIME_HOURS`]
    pub fn new(user_id: Uuid, email: Option<String>, audience: &str) -> Self {
        Self::with_expiration(
            user_id,
            email,
            audience,
            Duration::hours(DEFAULT_TOKEN_LIFETIME_HOURS),
        )
    }

    /// Claims with a custom lifetime; a negative duration yields an expired token
    pub fn with_expiration(
        user_id: Uuid,
        email: Option<String>,
        audience: &str,
        expires_in: Duration,
    ) -> Self {
        let now = Utc::now();

        Self {
            sub: user_id,
            aud: audience.to_string(),
            iat: now.timestamp(),
            exp: (now + expires_in).timestamp(),
            email,
            role: Some("authenticated".to_string()),
        }
    }
}

/// Signs claims with HS256
pub fn create_token(claims: &Claims, secret: &str) -> Result<String, JwtError> {
    encode(
        &Header::new(Algorithm::HS256),
        claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| JwtError::CreateError(e.to_string()))
}

/// Verifies signature, expiry and audience
///
/// # Errors
///
/// - `JwtError::Expired` if `exp` has passed
/// - `JwtError::InvalidAudience` if `aud` doesn't match
/// - `JwtError::InvalidSignature` if signed with another secret
/// - `JwtError::Invalid` for anything else (malformed, wrong algorithm)
pub fn validate_token(token: &str, secret: &str, audience: &str) -> Result<Claims, JwtError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_audience(&[audience]);
    validation.leeway = 0;

    decode::<Claims>(token, &DecodingKey::from_secret(secret.as_bytes()), &validation)
        .map(|data| data.claims)
        .map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => JwtError::Expired,
            ErrorKind::InvalidAudience => JwtError::InvalidAudience,
            ErrorKind::InvalidSignature => JwtError::InvalidSignature,
            _ => JwtError::Invalid(e.to_string()),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret-key-at-least-32-bytes-long";

    #[test]
    fn test_create_and_validate() {
        let user_id = Uuid::new_v4();
        let claims = Claims::new(user_id, Some("a@example.com".to_string()), DEFAULT_AUDIENCE);
        let token = create_token(&claims, SECRET).unwrap();

        let validated = validate_token(&token, SECRET, DEFAULT_AUDIENCE).unwrap();
        assert_eq!(validated.sub, user_id);
        assert_eq!(validated.email.as_deref(), Some("a@example.com"));
        assert_eq!(validated.aud, DEFAULT_AUDIENCE);
    }

    #[test]
    fn test_wrong_secret() {
        let token = create_token(&Claims::new(Uuid::new_v4(), None, DEFAULT_AUDIENCE), SECRET).unwrap();
        let result = validate_token(&token, "another-secret-key-also-32-bytes-long", DEFAULT_AUDIENCE);
        assert!(matches!(result, Err(JwtError::InvalidSignature)));
    }

    #[test]
    fn test_expired_token() {
        let claims = Claims::with_expiration(
            Uuid::new_v4(),
            None,
            DEFAULT_AUDIENCE,
            Duration::seconds(-120),
        );
        let token = create_token(&claims, SECRET).unwrap();
        assert!(matches!(
            validate_token(&token, SECRET, DEFAULT_AUDIENCE),
            Err(JwtError::Expired)
        ));
    }

    #[test]
    fn test_wrong_audience() {
        let token = create_token(&Claims::new(Uuid::new_v4(), None, "anon"), SECRET).unwrap();
        assert!(matches!(
            validate_token(&token, SECRET, DEFAULT_AUDIENCE),
            Err(JwtError::InvalidAudience)
        ));
    }

    #[test]
    fn test_garbage_token() {
        assert!(matches!(
            validate_token("not.a.jwt", SECRET, DEFAULT_AUDIENCE),
            Err(JwtError::Invalid(_))
        ));
    }
}
