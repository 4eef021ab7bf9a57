/// Per-user rate limiting for authenticated endpoints
///
/// Token bucket with Redis-backed state, so limits hold across API
/// instances. Every user gets `RATE_LIMIT_PER_MINUTE` tokens that refill
/// continuously; each request spends one.
///
/// # Storage
///
/// State stored in Redis with keys: `ratelimit:user:{user_id}`
/// TTL: 2 minutes (auto-cleanup)
///
/// # Availability
///
/// The limiter fails open. With no `REDIS_URL`, or when Redis errors, the
/// request is let through and a warning is logged.
///
/// # Headers
///
/// - `X-RateLimit-Limit`: Requests allowed per minute
/// - `X-RateLimit-Remaining`: Tokens remaining
/// - `X-RateLimit-Reset`: Unix timestamp when the bucket is full again
/// - `Retry-After`: Seconds to wait (429 responses only)

use crate::app::AppState;
use crate::error::ApiError;
use axum::{
    extract::{Extension, Request, State},
    http::HeaderValue,
    middleware::Next,
    response::Response,
};
use songteam_shared::auth::middleware::AuthContext;
use uuid::Uuid;

/// Seconds a bucket survives without traffic
const BUCKET_TTL_SECS: u64 = 120;

/// Atomic refill-and-take. Returns `{allowed, remaining, retry_after}`.
const TOKEN_BUCKET_SCRIPT: &str = r#"
local key = KEYS[1]
local capacity = tonumber(ARGV[1])
local refill_rate = tonumber(ARGV[2])
local now = tonumber(ARGV[3])
local ttl = tonumber(ARGV[4])

local bucket = redis.call('HMGET', key, 'tokens', 'last_refill')
local tokens = tonumber(bucket[1])
local last_refill = tonumber(bucket[2])

if not tokens then
    tokens = capacity
    last_refill = now
end

local elapsed = math.max(0, now - last_refill)
tokens = math.min(capacity, tokens + (elapsed * refill_rate))

if tokens >= 1 then
    tokens = tokens - 1
    redis.call('HSET', key, 'tokens', tokens, 'last_refill', now)
    redis.call('EXPIRE', key, ttl)
    return {1, math.floor(tokens), 0}
else
    redis.call('HSET', key, 'tokens', tokens, 'last_refill', now)
    redis.call('EXPIRE', key, ttl)
    return {0, 0, math.ceil((1 - tokens) / refill_rate)}
end
"#;

/// Bucket parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateLimit {
    /// Maximum requests per minute
    pub requests_per_minute: u32,

    /// Token refill rate (tokens per second)
    pub refill_rate: f64,

    /// Maximum tokens in bucket (burst capacity)
    pub bucket_capacity: u32,
}

impl RateLimit {
    /// A bucket that allows `requests_per_minute`, bursting up to the same
    pub fn per_minute(requests_per_minute: u32) -> Self {
        let requests_per_minute = requests_per_minute.max(1);
        RateLimit {
            requests_per_minute,
            refill_rate: requests_per_minute as f64 / 60.0,
            bucket_capacity: requests_per_minute,
        }
    }

    /// Seconds until a bucket holding `remaining` tokens is full again
    pub fn seconds_until_full(&self, remaining: u32) -> u64 {
        let missing = self.bucket_capacity.saturating_sub(remaining) as f64;
        (missing / self.refill_rate).ceil() as u64
    }
}

/// Result of rate limit check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitResult {
    /// Whether request is allowed
    pub allowed: bool,

    /// Tokens remaining
    pub remaining: u32,

    /// Seconds to wait before retrying (0 when allowed)
    pub retry_after: u64,
}

impl RateLimitResult {
    fn from_script(values: &[i64]) -> Option<Self> {
        match values {
            [allowed, remaining, retry_after] => {
                let allowed = *allowed == 1;
                Some(RateLimitResult {
                    allowed,
                    remaining: u32::try_from(*remaining).unwrap_or(0),
                    retry_after: if allowed {
                        0
                    } else {
                        u64::try_from(*retry_after).unwrap_or(1).max(1)
                    },
                })
            }
            _ => None,
        }
    }
}

/// Rate limiting middleware layer
///
/// Must run inside the JWT layer; it keys buckets by the caller's user id.
///
/// # Errors
///
/// - 429 Too Many Requests: bucket empty
pub async fn rate_limit_layer(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let Some(redis) = state.redis.clone() else {
        return Ok(next.run(request).await);
    };

    let limit = RateLimit::per_minute(state.config.rate_limit.requests_per_minute);

    let result = match check_rate_limit(redis, auth.user_id, limit).await {
        Ok(result) => result,
        Err(e) => {
            tracing::warn!(error = %e, user_id = %auth.user_id, "Rate limit check failed; allowing request");
            return Ok(next.run(request).await);
        }
    };

    if !result.allowed {
        tracing::debug!(user_id = %auth.user_id, retry_after = result.retry_after, "Rate limit exceeded");
        return Err(ApiError::RateLimitExceeded {
            retry_after: result.retry_after,
            message: format!(
                "Rate limit exceeded. Try again in {} seconds",
                result.retry_after
            ),
        });
    }

    let mut response = next.run(request).await;

    let reset = chrono::Utc::now().timestamp().max(0) as u64 + limit.seconds_until_full(result.remaining);
    let headers = response.headers_mut();
    headers.insert("X-RateLimit-Limit", HeaderValue::from(limit.requests_per_minute));
    headers.insert("X-RateLimit-Remaining", HeaderValue::from(result.remaining));
    headers.insert("X-RateLimit-Reset", HeaderValue::from(reset));

    Ok(response)
}

/// Spends one token from the user's bucket
///
/// # Errors
///
/// Returns the Redis error if the script could not run; the caller decides
/// whether to fail open.
pub async fn check_rate_limit(
    mut redis: redis::aio::ConnectionManager,
    user_id: Uuid,
    limit: RateLimit,
) -> Result<RateLimitResult, redis::RedisError> {
    let key = format!("ratelimit:user:{}", user_id);
    let now = chrono::Utc::now().timestamp();

    let values: Vec<i64> = redis::Script::new(TOKEN_BUCKET_SCRIPT)
        .key(&key)
        .arg(limit.bucket_capacity)
        .arg(limit.refill_rate)
        .arg(now)
        .arg(BUCKET_TTL_SECS)
        .invoke_async(&mut redis)
        .await?;

    RateLimitResult::from_script(&values).ok_or_else(|| {
        redis::RedisError::from((
            redis::ErrorKind::TypeError,
            "unexpected rate limit script reply",
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_per_minute() {
        let limit = RateLimit::per_minute(60);
        assert_eq!(limit.requests_per_minute, 60);
        assert_eq!(limit.bucket_capacity, 60);
        assert_eq!(limit.refill_rate, 1.0);

        let slow = RateLimit::per_minute(10);
        assert!((slow.refill_rate - 0.1667).abs() < 0.001);
    }

    #[test]
    fn test_zero_is_clamped() {
        let limit = RateLimit::per_minute(0);
        assert_eq!(limit.bucket_capacity, 1);
        assert!(limit.refill_rate > 0.0);
    }

    #[test]
    fn test_seconds_until_full() {
        let limit = RateLimit::per_minute(60);
        assert_eq!(limit.seconds_until_full(60), 0);
        assert_eq!(limit.seconds_until_full(57), 3);
        assert_eq!(limit.seconds_until_full(0), 60);
    }

    #[test]
    fn test_script_reply_parsing() {
        assert_eq!(
            RateLimitResult::from_script(&[1, 41, 0]),
            Some(RateLimitResult {
                allowed: true,
                remaining: 41,
                retry_after: 0,
            })
        );

        let denied = RateLimitResult::from_script(&[0, 0, 6]).unwrap();
        assert!(!denied.allowed);
        assert_eq!(denied.retry_after, 6);

        assert_eq!(RateLimitResult::from_script(&[1, 2]), None);
    }
}
