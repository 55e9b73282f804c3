//! Governor-based rate limiting for the order routes.

use axum::http::{Request, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use std::num::NonZeroU32;
use std::sync::Arc;

/// A shared rate limiter instance.
pub type SharedLimiter = Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>;

const FALLBACK_PER_MINUTE: NonZeroU32 = match NonZeroU32::new(30) {
    Some(n) => n,
    None => unreachable!(),
};

/// Create a rate limiter with the given requests-per-minute quota. A zero
/// quota falls back to 30/min.
pub fn create_limiter(requests_per_minute: u32) -> SharedLimiter {
    let quota =
        Quota::per_minute(NonZeroU32::new(requests_per_minute).unwrap_or(FALLBACK_PER_MINUTE));
    Arc::new(RateLimiter::direct(quota))
}

/// Rate limiting middleware. Returns 429 Too Many Requests when exceeded.
///
/// The limiter is read from request extensions; routes without one pass
/// through.
pub async fn rate_limit_middleware(
    request: Request<axum::body::Body>,
    next: Next,
) -> Result<Response, Response> {
    let limiter = request.extensions().get::<SharedLimiter>().cloned();

    if let Some(limiter) = limiter {
        if limiter.check().is_err() {
            tracing::debug!(path = %request.uri().path(), "Rate limit exceeded");
            return Err((StatusCode::TOO_MANY_REQUESTS, "Rate limit exceeded").into_response());
        }
    }

    Ok(next.run(request).await)
}
