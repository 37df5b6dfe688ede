//! Shared application state.

use std::sync::Arc;

use medibills_store::{Database, SessionStore};
use medibills_types::config::{Environment, RateLimitConfig, SessionConfig};

use crate::{health::HealthState, rate_limit::RateLimiter, services::AuthService};

/// Default request body limit (10 MiB).
pub const DEFAULT_BODY_LIMIT_BYTES: usize = 10 * 1024 * 1024;

fn default_allowed_origins() -> Vec<String> {
    vec!["http://localhost:3000".to_string(), "http://127.0.0.1:3000".to_string()]
}

/// HTTP-layer settings assembled by the binary.
///
/// # Example
///
/// ```
/// use medibills_api::ApiSettings;
/// use medibills_types::config::Environment;
///
/// let settings = ApiSettings::builder().environment(Environment::Test).bcrypt_cost(4).build();
/// assert_eq!(settings.body_limit_bytes, 10 * 1024 * 1024);
/// ```
#[derive(Debug, Clone, bon::Builder)]
pub struct ApiSettings {
    /// Deployment environment; controls error detail exposure and CORS.
    #[builder(default)]
    pub environment: Environment,
    /// Session cookie and lifetime settings.
    #[builder(default)]
    pub session: SessionConfig,
    /// Per-client request budget.
    #[builder(default)]
    pub rate_limit: RateLimitConfig,
    /// Origins allowed to make credentialed cross-origin requests.
    #[builder(default = default_allowed_origins())]
    pub allowed_origins: Vec<String>,
    /// bcrypt work factor for new hashes.
    #[builder(default = bcrypt::DEFAULT_COST)]
    pub bcrypt_cost: u32,
    /// Maximum accepted request body size.
    #[builder(default = DEFAULT_BODY_LIMIT_BYTES)]
    pub body_limit_bytes: usize,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Everything a handler can reach. Cheap to clone.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Connection pool and repositories.
    pub db: Database,
    /// Server-side sessions.
    pub sessions: SessionStore,
    /// Registration, login, and account changes.
    pub auth: AuthService,
    /// Per-client token buckets.
    pub limiter: Arc<RateLimiter>,
    /// Lifecycle phase for the readiness probe.
    pub health: HealthState,
    /// HTTP-layer settings.
    pub settings: Arc<ApiSettings>,
}

impl AppState {
    /// Wires state over an open, migrated database.
    ///
    /// # Errors
    ///
    /// Returns [`medibills_store::StoreError::SessionSetup`] if the session
    /// secret or lifetimes are unusable.
    pub fn new(
        db: Database,
        session_secret: &[u8],
        settings: ApiSettings,
    ) -> medibills_store::Result<Self> {
        let sessions = SessionStore::new(&db, session_secret, &settings.session)?;
        let auth = AuthService::new(db.clone(), settings.bcrypt_cost);
        let limiter = Arc::new(RateLimiter::from_config(&settings.rate_limit));
        Ok(Self {
            db,
            sessions,
            auth,
            limiter,
            health: HealthState::new(),
            settings: Arc::new(settings),
        })
    }
}
