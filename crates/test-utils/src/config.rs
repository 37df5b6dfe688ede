//! Test configuration helpers.
//!
//! Centralizes the small, fast values tests use so individual test modules
//! don't scatter magic numbers.

// Test utilities are expected to panic on failure - that's their purpose
#![allow(clippy::expect_used)]

use std::time::Duration;

use medibills_types::config::{DatabaseConfig, RateLimitConfig, SessionConfig};

use crate::TestDir;

/// Session secret used by every test server. 32 bytes.
pub const TEST_SESSION_SECRET: &[u8] = b"medibills-test-secret-0123456789";

/// Returns a database configuration backed by a file in `dir`.
///
/// Uses a short busy timeout so lock contention fails fast instead of hanging.
#[must_use]
pub fn test_database_config(dir: &TestDir) -> DatabaseConfig {
    DatabaseConfig::builder()
        .url(dir.sqlite_url("medibills-test.sqlite"))
        .max_connections(4)
        .busy_timeout(Duration::from_secs(2))
        .build()
        .expect("valid test database config")
}

/// Returns a session configuration with the production lifetimes.
#[must_use]
pub fn test_session_config() -> SessionConfig {
    SessionConfig::default()
}

/// Returns a rate limit configuration allowing `max_requests` per minute.
///
/// # Panics
///
/// Panics if `max_requests` is zero.
#[must_use]
pub fn test_rate_limit_config(max_requests: u64) -> RateLimitConfig {
    RateLimitConfig::builder()
        .window(Duration::from_secs(60))
        .max_requests(max_requests)
        .build()
        .expect("valid test rate limit config")
}
