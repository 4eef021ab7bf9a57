/// Request authentication
///
/// Turns an `Authorization` header into an [`AuthContext`]. The API's JWT
/// layer calls [`authenticate`] and inserts the result into request
/// extensions, where handlers pick it up with `Extension<AuthContext>`.
///
/// # Example
///
/// ```
/// use songteam_shared::auth::jwt::{create_token, Claims, DEFAULT_AUDIENCE};
/// use songteam_shared::auth::middleware::authenticate;
/// use uuid::Uuid;
///
/// let secret = "a-test-secret-that-is-at-least-32-bytes";
/// let user_id = Uuid::new_v4();
/// let token = create_token(&Claims::new(user_id, None, DEFAULT_AUDIENCE), secret).unwrap();
///
/// let header = format!("Bearer {}", token);
/// let auth = authenticate(Some(&header), secret, DEFAULT_AUDIENCE).unwrap();
/// assert_eq!(auth.user_id, user_id);
/// ```

use super::jwt::{validate_token, JwtError};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identity of the caller, available to every authenticated handler
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthContext {
    pub user_id: Uuid,

    /// Email from the token, if the provider included one
    pub email: Option<String>,
}

/// Why a request could not be authenticated
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Missing authorization header")]
    MissingCredentials,

    #[error("Expected Bearer token")]
    InvalidFormat,

    #[error(transparent)]
    InvalidToken(#[from] JwtError),
}

/// Extracts the token from a `Bearer <token>` header value
pub fn bearer_token(header: Option<&str>) -> Result<&str, AuthError> {
    let header = header.ok_or(AuthError::MissingCredentials)?;
    let token = header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .ok_or(AuthError::InvalidFormat)?;

    if token.is_empty() {
        return Err(AuthError::InvalidFormat);
    }

    Ok(token)
}

/// Validates the header and builds the caller's context
pub fn authenticate(
    header: Option<&str>,
    secret: &str,
    audience: &str,
) -> Result<AuthContext, AuthError> {
    let token = bearer_token(header)?;
    let claims = validate_token(token, secret, audience)?;

    Ok(AuthContext {
        user_id: claims.sub,
        email: claims.email,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bearer_token_parsing() {
        assert_eq!(bearer_token(Some("Bearer abc.def")).unwrap(), "abc.def");
        assert!(matches!(bearer_token(None), Err(AuthError::MissingCredentials)));
        assert!(matches!(bearer_token(Some("Basic xyz")), Err(AuthError::InvalidFormat)));
        assert!(matches!(bearer_token(Some("Bearer ")), Err(AuthError::InvalidFormat)));
    }

    #[test]
    fn test_authenticate_rejects_bad_token() {
        let result = authenticate(Some("Bearer nope"), "secret", "authenticated");
        assert!(matches!(result, Err(AuthError::InvalidToken(_))));
    }
}
