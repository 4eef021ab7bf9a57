/// Middleware modules for the API server
///
/// - `security`: Security response headers
/// - `rate_limit`: Per-user token bucket on authenticated routes

pub mod rate_limit;
pub mod security;
