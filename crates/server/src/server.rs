//! HTTP serving loop.

use std::{future::Future, net::SocketAddr};

use medibills_api::{AppState, router};
use tokio::net::TcpListener;
use tracing::info;

use crate::shutdown::drain_on;

/// Serves `state` on `listener` until `signal` resolves.
///
/// Marks the service ready once the listener is live. On shutdown, readiness
/// is withdrawn, in-flight requests finish, and the connection pool is
/// closed before returning.
///
/// # Errors
///
/// Returns the I/O error that stopped the accept loop.
pub async fn run(
    listener: TcpListener,
    state: AppState,
    signal: impl Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    let local_addr = listener.local_addr()?;
    let app = router(state.clone()).into_make_service_with_connect_info::<SocketAddr>();

    state.health.mark_ready();
    info!(%local_addr, "Server ready, accepting connections");

    let result = axum::serve(listener, app)
        .with_graceful_shutdown(drain_on(state.health.clone(), signal))
        .await;

    state.db.close().await;
    result
}
