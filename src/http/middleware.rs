//! Rate limiting middleware.

use axum::extract::{ConnectInfo, Request, State};
use axum::http::header::{HeaderMap, HeaderName, HeaderValue, RETRY_AFTER};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{trace, warn};

use crate::error::ApiError;
use crate::ratelimit::{ClientId, Clock, Decision, RateLimitPolicies};

pub const X_RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
pub const X_RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");
pub const X_RATELIMIT_RESET: HeaderName = HeaderName::from_static("x-ratelimit-reset");

const X_FORWARDED_FOR: &str = "x-forwarded-for";

/// Shared state for the rate limiting middleware.
pub struct RateLimitState {
    pub policies: RateLimitPolicies,
    pub clock: Arc<dyn Clock>,
    pub trust_forwarded_for: bool,
}

impl RateLimitState {
    pub fn new(policies: RateLimitPolicies, clock: Arc<dyn Clock>) -> Self {
        Self {
            policies,
            clock,
            trust_forwarded_for: false,
        }
    }

    pub fn trust_forwarded_for(mut self, trust: bool) -> Self {
        self.trust_forwarded_for = trust;
        self
    }
}

/// Check the request against its policy before it reaches any handler.
///
/// Every limited response carries `X-RateLimit-*` headers. Rejected requests
/// get a 429 with the standard failure body and a `Retry-After` header.
pub async fn rate_limit(
    State(state): State<Arc<RateLimitState>>,
    request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path();
    let Some(policy) = state.policies.select(path) else {
        trace!(path, "Path exempt from rate limiting");
        return next.run(request).await;
    };

    let forwarded_for = request
        .headers()
        .get(X_FORWARDED_FOR)
        .and_then(|value| value.to_str().ok());
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let client = ClientId::resolve(forwarded_for, peer, state.trust_forwarded_for);

    let now = state.clock.now_ms();
    let decision = policy.limiter.check(client.as_str(), now);

    if !decision.admit {
        warn!(
            client = %client,
            policy = policy.name,
            path,
            limit = decision.limit,
            "Too many requests"
        );
        let mut response = ApiError::TooManyRequests.into_response();
        let headers = response.headers_mut();
        apply_headers(headers, &decision);
        headers.insert(RETRY_AFTER, HeaderValue::from(decision.retry_after_secs(now)));
        return response;
    }

    let mut response = next.run(request).await;
    apply_headers(response.headers_mut(), &decision);
    response
}

/// Attach the advisory rate limit headers for `decision`.
pub fn apply_headers(headers: &mut HeaderMap, decision: &Decision) {
    headers.insert(X_RATELIMIT_LIMIT, HeaderValue::from(decision.limit));
    headers.insert(X_RATELIMIT_REMAINING, HeaderValue::from(decision.remaining));
    headers.insert(X_RATELIMIT_RESET, HeaderValue::from(decision.reset_secs()));
}
