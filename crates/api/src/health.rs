//! Liveness and readiness probes.
//!
//! - **Liveness** (`GET /health`): the process is serving requests.
//! - **Readiness** (`GET /health/ready`): startup has finished, shutdown has
//!   not begun, and the database answers a ping. Fails with 503 otherwise.

use std::sync::{
    Arc,
    atomic::{AtomicU8, Ordering},
};

use axum::{Json, extract::State, http::StatusCode};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use tracing::warn;

use crate::{envelope::Envelope, state::AppState};

/// Service lifecycle phase.
///
/// Transitions: `Starting` → `Ready` → `ShuttingDown`, never backwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum ServicePhase {
    /// Schema and sessions are being prepared.
    Starting = 0,
    /// Serving traffic.
    Ready = 1,
    /// Draining connections before exit.
    ShuttingDown = 2,
}

impl ServicePhase {
    fn from_u8(val: u8) -> Self {
        match val {
            1 => Self::Ready,
            2 => Self::ShuttingDown,
            _ => Self::Starting,
        }
    }
}

/// Shared, lock-free lifecycle state.
#[derive(Debug, Clone)]
pub struct HealthState {
    phase: Arc<AtomicU8>,
}

impl Default for HealthState {
    fn default() -> Self {
        Self::new()
    }
}

impl HealthState {
    /// Creates a new `HealthState` in the `Starting` phase.
    pub fn new() -> Self {
        Self { phase: Arc::new(AtomicU8::new(ServicePhase::Starting as u8)) }
    }

    /// Returns the current lifecycle phase.
    pub fn phase(&self) -> ServicePhase {
        ServicePhase::from_u8(self.phase.load(Ordering::Acquire))
    }

    /// Transitions to `Ready`. Only succeeds from `Starting`.
    pub fn mark_ready(&self) -> bool {
        self.phase
            .compare_exchange(
                ServicePhase::Starting as u8,
                ServicePhase::Ready as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    /// Transitions to `ShuttingDown` from any phase.
    pub fn mark_shutting_down(&self) {
        self.phase.store(ServicePhase::ShuttingDown as u8, Ordering::Release);
    }

    /// Returns `true` while the service should receive traffic.
    pub fn readiness_check(&self) -> bool {
        self.phase() == ServicePhase::Ready
    }
}

/// Liveness response body.
#[derive(Debug, Serialize)]
pub struct LivenessReport {
    success: bool,
    message: &'static str,
    timestamp: String,
    environment: &'static str,
}

/// Readiness details.
#[derive(Debug, Serialize)]
pub struct ReadinessReport {
    phase: ServicePhase,
    database: &'static str,
    #[serde(rename = "checkedAt")]
    checked_at: DateTime<Utc>,
}

/// `GET /health`
pub async fn liveness(State(state): State<AppState>) -> Json<LivenessReport> {
    Json(LivenessReport {
        success: true,
        message: "Medical Bills API is running",
        timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        environment: state.settings.environment.as_str(),
    })
}

/// `GET /health/ready`
pub async fn readiness(
    State(state): State<AppState>,
) -> (StatusCode, Json<Envelope<ReadinessReport>>) {
    let phase = state.health.phase();
    let database = match state.db.health_check().await {
        Ok(()) => "ok",
        Err(e) => {
            warn!(error = %e, "Readiness database ping failed");
            "unavailable"
        },
    };
    let report = ReadinessReport { phase, database, checked_at: Utc::now() };

    if state.health.readiness_check() && database == "ok" {
        (StatusCode::OK, Json(Envelope::data(report)))
    } else {
        let mut envelope = Envelope::data(report);
        envelope.success = false;
        envelope.error = Some("Service not ready".to_string());
        (StatusCode::SERVICE_UNAVAILABLE, Json(envelope))
    }
}
