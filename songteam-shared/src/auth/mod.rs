/// Authentication and authorization
///
/// # Modules
///
/// - [`jwt`]: HS256 access token validation (tokens come from the identity provider)
/// - [`middleware`]: `Authorization` header parsing into an [`middleware::AuthContext`]
/// - [`authorization`]: team membership, ownership and credit-admin checks

pub mod authorization;
pub mod jwt;
pub mod middleware;
