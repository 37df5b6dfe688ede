//! Graceful shutdown handling.
//!
//! Provides signal handling for clean server shutdown.

use std::future::Future;

use medibills_api::HealthState;
use tokio::signal;

/// Wait for a shutdown signal (Ctrl-C or SIGTERM).
///
/// This function blocks until a shutdown signal is received.
/// On Unix systems, it also handles SIGTERM for container environments.
#[allow(clippy::expect_used)]
pub async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating shutdown");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating shutdown");
        }
    }
}

/// Resolves once `signal` fires, after flipping the readiness probe.
///
/// Load balancers polling `/health/ready` see 503 while in-flight requests
/// drain.
pub async fn drain_on(health: HealthState, signal: impl Future<Output = ()>) {
    signal.await;
    health.mark_shutting_down();
    tracing::info!("Readiness withdrawn, draining in-flight requests");
}
