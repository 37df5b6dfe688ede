//! Per-client token bucket rate limiting.
//!
//! Each client may burst up to `max_requests` and the budget refills evenly
//! over the configured window, so sustained traffic is capped at
//! `max_requests` per window. Clients are keyed by peer IP, falling back to
//! the first `X-Forwarded-For` entry and then to a shared `unknown` key.

use std::{
    collections::HashMap,
    net::SocketAddr,
    sync::atomic::{AtomicU64, Ordering},
    time::{Duration, Instant},
};

use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use medibills_types::config::RateLimitConfig;
use parking_lot::Mutex;
use tracing::warn;

use crate::{error::ApiError, metrics, state::AppState};

/// Bucket count above which idle buckets are swept on the next check.
const SWEEP_THRESHOLD: usize = 10_000;

/// Key used when no client address can be determined.
const UNKNOWN_CLIENT: &str = "unknown";

/// Error returned when a request is rate limited.
#[derive(Debug, Clone)]
pub struct RateLimitRejection {
    /// Estimated milliseconds until the client should retry.
    pub retry_after_ms: u64,
    /// The client that was limited.
    pub client: String,
}

impl RateLimitRejection {
    /// Retry hint rounded up to whole seconds, for the `Retry-After` header.
    pub fn retry_after_secs(&self) -> u64 {
        self.retry_after_ms.div_ceil(1000).max(1)
    }
}

impl std::fmt::Display for RateLimitRejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Rate limit exceeded for {}, retry in {}ms", self.client, self.retry_after_ms)
    }
}

impl std::error::Error for RateLimitRejection {}

/// A token bucket that allows controlled bursts while enforcing an average rate.
#[derive(Debug)]
struct TokenBucket {
    /// Current number of available tokens (scaled by 1000 for sub-token precision).
    tokens_millis: u64,
    /// Maximum tokens the bucket can hold (scaled by 1000).
    capacity_millis: u64,
    /// Tokens added per second.
    refill_rate: f64,
    /// Last time tokens were refilled.
    last_refill: Instant,
}

impl TokenBucket {
    fn new(capacity: u64, refill_rate: f64) -> Self {
        Self {
            tokens_millis: capacity.saturating_mul(1000),
            capacity_millis: capacity.saturating_mul(1000),
            refill_rate,
            last_refill: Instant::now(),
        }
    }

    /// Refill tokens based on elapsed time, then try to consume one token.
    fn try_acquire(&mut self) -> bool {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill);

        let refill = (elapsed.as_secs_f64() * self.refill_rate * 1000.0) as u64;
        if refill > 0 {
            self.tokens_millis = self.tokens_millis.saturating_add(refill).min(self.capacity_millis);
            self.last_refill = now;
        }

        if self.tokens_millis >= 1000 {
            self.tokens_millis -= 1000;
            true
        } else {
            false
        }
    }

    /// Estimates milliseconds until the next token is available.
    fn retry_after_ms(&self) -> u64 {
        if self.refill_rate <= 0.0 {
            return 1000;
        }
        let deficit_millis = 1000u64.saturating_sub(self.tokens_millis);
        let ms = (deficit_millis as f64 / (self.refill_rate * 1000.0) * 1000.0).ceil() as u64;
        ms.max(1)
    }
}

/// Per-client rate limiter.
///
/// Thread-safe: the bucket map is behind a `Mutex`, counters are atomics.
#[derive(Debug)]
pub struct RateLimiter {
    buckets: Mutex<HashMap<String, TokenBucket>>,
    capacity: u64,
    refill_rate: f64,
    window: Duration,
    rejected_count: AtomicU64,
}

impl RateLimiter {
    /// Creates a limiter with burst `capacity` refilling at `refill_rate` tokens/s.
    pub fn new(capacity: u64, refill_rate: f64, window: Duration) -> Self {
        Self {
            buckets: Mutex::new(HashMap::new()),
            capacity,
            refill_rate,
            window,
            rejected_count: AtomicU64::new(0),
        }
    }

    /// Creates a limiter from validated configuration.
    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self::new(config.max_requests, config.refill_rate(), config.window)
    }

    /// Consumes one token for `client`.
    ///
    /// # Errors
    ///
    /// Returns [`RateLimitRejection`] with a retry hint when the client's
    /// bucket is empty.
    pub fn check(&self, client: &str) -> Result<(), RateLimitRejection> {
        let mut buckets = self.buckets.lock();
        if buckets.len() > SWEEP_THRESHOLD {
            let now = Instant::now();
            buckets.retain(|_, bucket| now.duration_since(bucket.last_refill) < self.window);
        }

        let bucket = buckets
            .entry(client.to_string())
            .or_insert_with(|| TokenBucket::new(self.capacity, self.refill_rate));
        if bucket.try_acquire() {
            return Ok(());
        }

        self.rejected_count.fetch_add(1, Ordering::Relaxed);
        Err(RateLimitRejection { retry_after_ms: bucket.retry_after_ms(), client: client.to_string() })
    }

    /// Total number of rejected requests.
    pub fn rejected_count(&self) -> u64 {
        self.rejected_count.load(Ordering::Relaxed)
    }

    /// Number of clients currently tracked.
    pub fn tracked_clients(&self) -> usize {
        self.buckets.lock().len()
    }
}

/// Determines the rate limit key for a request.
pub(crate) fn client_key(req: &Request) -> String {
    if let Some(ConnectInfo(addr)) = req.extensions().get::<ConnectInfo<SocketAddr>>() {
        return addr.ip().to_string();
    }
    req.headers()
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map_or_else(|| UNKNOWN_CLIENT.to_string(), str::to_string)
}

/// Middleware rejecting requests over the client's budget with 429.
pub async fn enforce(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let client = client_key(&req);
    if let Err(rejection) = state.limiter.check(&client) {
        warn!(client = %rejection.client, retry_after_ms = rejection.retry_after_ms, "Rate limit exceeded");
        metrics::record_rate_limit_rejected();
        return ApiError::RateLimited { retry_after_secs: rejection.retry_after_secs() }
            .into_response();
    }
    next.run(req).await
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use axum::body::Body;

    use super::*;

    fn test_limiter() -> RateLimiter {
        RateLimiter::new(5, 10.0, Duration::from_secs(1))
    }

    // ── Token bucket ─────────────────────────────────────────────────────

    #[test]
    fn token_bucket_allows_up_to_capacity() {
        let mut bucket = TokenBucket::new(5, 1.0);
        for _ in 0..5 {
            assert!(bucket.try_acquire());
        }
        assert!(!bucket.try_acquire());
    }

    #[test]
    fn token_bucket_refills_over_time() {
        let mut bucket = TokenBucket::new(1, 1000.0);
        assert!(bucket.try_acquire());
        assert!(!bucket.try_acquire());
        std::thread::sleep(Duration::from_millis(20));
        assert!(bucket.try_acquire());
    }

    #[test]
    fn token_bucket_retry_hint_is_positive() {
        let mut bucket = TokenBucket::new(1, 0.5);
        assert!(bucket.try_acquire());
        assert!(!bucket.try_acquire());
        let ms = bucket.retry_after_ms();
        assert!(ms > 0 && ms <= 2000, "got {ms}");
    }

    // ── Limiter ──────────────────────────────────────────────────────────

    #[test]
    fn limiter_rejects_after_burst() {
        let limiter = test_limiter();
        for _ in 0..5 {
            limiter.check("10.0.0.1").unwrap();
        }
        let rejection = limiter.check("10.0.0.1").unwrap_err();
        assert_eq!(rejection.client, "10.0.0.1");
        assert!(rejection.retry_after_secs() >= 1);
        assert_eq!(limiter.rejected_count(), 1);
    }

    #[test]
    fn limiter_isolates_clients() {
        let limiter = test_limiter();
        for _ in 0..5 {
            limiter.check("a").unwrap();
        }
        assert!(limiter.check("a").is_err());
        assert!(limiter.check("b").is_ok());
        assert_eq!(limiter.tracked_clients(), 2);
    }

    #[test]
    fn limiter_from_default_config_allows_hundred() {
        let limiter = RateLimiter::from_config(&RateLimitConfig::default());
        for _ in 0..100 {
            limiter.check("c").unwrap();
        }
        assert!(limiter.check("c").is_err());
    }

    // ── Client key ───────────────────────────────────────────────────────

    #[test]
    fn client_key_prefers_peer_address() {
        let mut req = Request::builder()
            .header("x-forwarded-for", "203.0.113.9")
            .body(Body::empty())
            .unwrap();
        req.extensions_mut().insert(ConnectInfo(SocketAddr::from(([192, 0, 2, 1], 4000))));
        assert_eq!(client_key(&req), "192.0.2.1");
    }

    #[test]
    fn client_key_falls_back_to_forwarded_for() {
        let req = Request::builder()
            .header("x-forwarded-for", " 203.0.113.9 , 10.0.0.1")
            .body(Body::empty())
            .unwrap();
        assert_eq!(client_key(&req), "203.0.113.9");

        let req = Request::builder().body(Body::empty()).unwrap();
        assert_eq!(client_key(&req), "unknown");
    }
}
