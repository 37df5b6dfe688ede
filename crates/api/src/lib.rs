//! HTTP API for MediBills.
//!
//! Exposes the JSON endpoints over an axum [`Router`](axum::Router):
//! - **Envelope**: every response is `{success, data?, error?, message?, details?}`
//! - **Sessions**: cookie-carried tokens resolved by middleware; guards are
//!   extractors ([`RequireAuth`], [`RequireGuest`])
//! - **Validation**: every body field is checked before the store is touched,
//!   and all failures are reported together
//! - **Rate limiting**: per-client token buckets in front of every route
//!
//! ## Quick Start
//!
//! ```no_run
//! use medibills_api::{ApiSettings, AppState, router};
//! use medibills_store::Database;
//! use medibills_types::config::DatabaseConfig;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let db = Database::open(&DatabaseConfig::default()).await?;
//! db.migrate().await?;
//! let state = AppState::new(db, b"a-secret-of-at-least-32-bytes-long", ApiSettings::default())?;
//! state.health.mark_ready();
//!
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:3001").await?;
//! axum::serve(listener, router(state)).await?;
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod cookies;
pub mod envelope;
pub mod error;
mod extract;
mod fields;
pub mod health;
pub mod metrics;
pub mod middleware;
pub mod rate_limit;
mod routes;
mod services;
pub mod state;

pub use envelope::{Envelope, FieldError};
pub use error::{ApiError, ApiResult};
pub use health::{HealthState, ServicePhase};
pub use middleware::{RequireAuth, RequireGuest, SessionIdentity};
pub use rate_limit::RateLimiter;
pub use routes::router;
pub use services::AuthService;
pub use state::{ApiSettings, AppState};
