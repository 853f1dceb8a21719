//! Per-client rate limiting
//!
//! Each client IP gets a token bucket held in memory. A bucket starts full
//! with `requests_per_minute` tokens, refills continuously at
//! `requests_per_minute / 60` tokens per second, and every request consumes
//! one token. An empty bucket yields `429 Too Many Requests`.
//!
//! # Headers
//!
//! - `X-RateLimit-Limit`: requests allowed per minute
//! - `X-RateLimit-Remaining`: whole tokens left
//! - `X-RateLimit-Reset`: Unix timestamp when the bucket is full again
//! - `Retry-After`: seconds to wait (429 responses only)
//!
//! # Client identity
//!
//! The peer address from `ConnectInfo` is used when the server was started
//! with connect info, otherwise the first `X-Forwarded-For` entry.
//!
//! ```no_run
//! use std::sync::Arc;
//! use axum::{routing::get, Router};
//! use taskflow_api::middleware::rate_limit::{rate_limit_layer, RateLimit, RateLimiter};
//!
//! let limiter = Arc::new(RateLimiter::new(RateLimit::per_minute(60)));
//! let app: Router = Router::new()
//!     .route("/", get(|| async { "ok" }))
//!     .layer(axum::middleware::from_fn_with_state(limiter, rate_limit_layer));
//! ```

use crate::error::ApiError;
use axum::{
    extract::{ConnectInfo, Request, State},
    http::{HeaderMap, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use dashmap::DashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Rate limit configuration
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
    /// A budget of `n` requests per minute with a burst of `n`
    pub fn per_minute(n: u32) -> Self {
        let n = n.max(1);
        RateLimit {
            requests_per_minute: n,
            refill_rate: n as f64 / 60.0,
            bucket_capacity: n,
        }
    }
}

#[derive(Debug, Clone)]
struct TokenBucket {
    tokens: f64,
    last_refill: Instant,
}

impl TokenBucket {
    fn new(capacity: u32, now: Instant) -> Self {
        TokenBucket {
            tokens: capacity as f64,
            last_refill: now,
        }
    }

    fn refill(&mut self, rate: f64, capacity: u32, now: Instant) {
        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * rate).min(capacity as f64);
        self.last_refill = now;
    }

    fn try_consume(&mut self, count: f64) -> bool {
        if self.tokens >= count {
            self.tokens -= count;
            true
        } else {
            false
        }
    }

    /// Seconds until `count` tokens are available (rounded up)
    fn seconds_until_available(&self, count: f64, rate: f64) -> u64 {
        let deficit = count - self.tokens;
        if deficit <= 0.0 {
            0
        } else {
            (deficit / rate).ceil() as u64
        }
    }
}

/// Outcome of a rate limit check
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateLimitDecision {
    /// Whether the request may proceed
    pub allowed: bool,

    /// Whole tokens remaining after this request
    pub remaining: u32,

    /// Seconds until another request would be allowed (0 when allowed)
    pub retry_after: u64,

    /// Seconds until the bucket is full again
    pub reset_after: u64,
}

/// In-memory per-key token buckets
#[derive(Debug)]
pub struct RateLimiter {
    limit: RateLimit,
    buckets: DashMap<String, TokenBucket>,
}

impl RateLimiter {
    pub fn new(limit: RateLimit) -> Self {
        Self {
            limit,
            buckets: DashMap::new(),
        }
    }

    pub fn limit(&self) -> RateLimit {
        self.limit
    }

    /// Consumes one token for `key`
    pub fn check(&self, key: &str) -> RateLimitDecision {
        self.check_at(key, Instant::now())
    }

    fn check_at(&self, key: &str, now: Instant) -> RateLimitDecision {
        let RateLimit {
            refill_rate,
            bucket_capacity,
            ..
        } = self.limit;

        let mut bucket = self
            .buckets
            .entry(key.to_string())
            .or_insert_with(|| TokenBucket::new(bucket_capacity, now));

        bucket.refill(refill_rate, bucket_capacity, now);
        let allowed = bucket.try_consume(1.0);

        RateLimitDecision {
            allowed,
            remaining: bucket.tokens.floor().max(0.0) as u32,
            retry_after: if allowed {
                0
            } else {
                bucket.seconds_until_available(1.0, refill_rate)
            },
            reset_after: bucket.seconds_until_available(bucket_capacity as f64, refill_rate),
        }
    }

    /// Drops buckets that have been idle long enough to be full again
    pub fn prune_idle(&self, idle_for: Duration) -> usize {
        self.prune_idle_at(idle_for, Instant::now())
    }

    fn prune_idle_at(&self, idle_for: Duration, now: Instant) -> usize {
        let mut pruned = 0;
        self.buckets.retain(|_, bucket| {
            let keep = now.saturating_duration_since(bucket.last_refill) < idle_for;
            if !keep {
                pruned += 1;
            }
            keep
        });
        pruned
    }

    /// Number of tracked clients
    pub fn tracked_clients(&self) -> usize {
        self.buckets.len()
    }
}

/// Identifies the client for rate limiting purposes
pub fn client_key(req: &Request) -> String {
    if let Some(ConnectInfo(addr)) = req.extensions().get::<ConnectInfo<SocketAddr>>() {
        return addr.ip().to_string();
    }

    forwarded_for(req.headers()).unwrap_or_else(|| "unknown".to_string())
}

fn forwarded_for(headers: &HeaderMap) -> Option<String> {
    headers
        .get("X-Forwarded-For")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|ip| ip.trim().to_string())
        .filter(|ip| !ip.is_empty())
}

/// Adds `X-RateLimit-*` headers
///
/// Nested limiters are stricter, so headers already set by an inner limiter
/// are kept.
fn apply_headers(headers: &mut HeaderMap, limit: RateLimit, decision: &RateLimitDecision) {
    if headers.contains_key("X-RateLimit-Limit") {
        return;
    }

    let reset_at = chrono::Utc::now().timestamp().max(0) as u64 + decision.reset_after;

    headers.insert("X-RateLimit-Limit", HeaderValue::from(limit.requests_per_minute));
    headers.insert("X-RateLimit-Remaining", HeaderValue::from(decision.remaining));
    headers.insert("X-RateLimit-Reset", HeaderValue::from(reset_at));
}

/// Rate limiting middleware
///
/// # Errors
///
/// - 429 Too Many Requests: the client's bucket is empty
pub async fn rate_limit_layer(
    State(limiter): State<Arc<RateLimiter>>,
    request: Request,
    next: Next,
) -> Response {
    let key = client_key(&request);
    let decision = limiter.check(&key);

    if !decision.allowed {
        tracing::warn!(
            client = %key,
            retry_after = decision.retry_after,
            path = %request.uri().path(),
            "Rate limit exceeded"
        );

        let mut response = ApiError::RateLimitExceeded {
            retry_after: decision.retry_after,
            message: format!(
                "Too many requests. Try again in {} seconds",
                decision.retry_after
            ),
        }
        .into_response();
        apply_headers(response.headers_mut(), limiter.limit(), &decision);
        return response;
    }

    let mut response = next.run(request).await;
    apply_headers(response.headers_mut(), limiter.limit(), &decision);
    response
}
