//! MediBills server binary.
//!
//! Serves the JSON API over HTTP, backed by a SQLite database.
//!
//! # Usage
//!
//! ```bash
//! # Start with defaults (development, 0.0.0.0:3001, ./database.sqlite)
//! medibills
//!
//! # Production settings from the environment
//! MEDIBILLS_ENV=production \
//! SESSION_SECRET=$(openssl rand -hex 32) \
//! DATABASE_URL=sqlite:/var/lib/medibills/db.sqlite \
//! medibills serve
//!
//! # Create the schema, or the demo account, and exit
//! medibills migrate
//! medibills seed
//! ```

use std::{io::IsTerminal, net::SocketAddr};

use clap::Parser;
use medibills_api::ApiError;
use medibills_server::{
    bootstrap::{self, BootstrapError},
    config::{Cli, CliCommand, Config, LogFormat},
    seed, server, shutdown,
};
use metrics_exporter_prometheus::PrometheusBuilder;
use snafu::{ResultExt, Snafu};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Top-level error type for the server binary.
#[derive(Debug, Snafu)]
enum ServerError {
    #[snafu(display("bootstrap error: {source}"))]
    Bootstrap { source: BootstrapError },

    #[snafu(display("failed to bind {addr}: {source}"))]
    Bind { addr: SocketAddr, source: std::io::Error },

    #[snafu(display("server error: {source}"))]
    Serve { source: std::io::Error },

    #[snafu(display("seed failed: {source}"))]
    Seed { source: ApiError },

    #[snafu(display("metrics exporter error: {message}"))]
    Metrics { message: String },
}

#[tokio::main]
async fn main() -> Result<(), ServerError> {
    let cli = Cli::parse();
    let config = cli.config;

    init_logging(&config);

    match cli.command.unwrap_or(CliCommand::Serve) {
        CliCommand::Serve => serve(&config).await,
        CliCommand::Migrate => migrate(&config).await,
        CliCommand::Seed => seed(&config).await,
    }
}

async fn serve(config: &Config) -> Result<(), ServerError> {
    tracing::info!(
        listen_addr = %config.listen_addr,
        environment = %config.environment,
        "Starting MediBills API"
    );

    if config.is_localhost_only() {
        tracing::warn!(
            "Listening on localhost only. Remote connections will be rejected. \
             Set --listen or MEDIBILLS_LISTEN to accept remote connections."
        );
    }

    if let Some(metrics_addr) = config.metrics_addr {
        init_metrics_exporter(metrics_addr)?;
    }

    let state = bootstrap::bootstrap(config).await.context(BootstrapSnafu)?;
    let listener = tokio::net::TcpListener::bind(config.listen_addr)
        .await
        .context(BindSnafu { addr: config.listen_addr })?;

    server::run(listener, state, shutdown::shutdown_signal()).await.context(ServeSnafu)?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

async fn migrate(config: &Config) -> Result<(), ServerError> {
    let db = bootstrap::open_database(config).await.context(BootstrapSnafu)?;
    db.close().await;
    tracing::info!(database_url = %config.database_url, "Schema is up to date");
    Ok(())
}

async fn seed(config: &Config) -> Result<(), ServerError> {
    let state = bootstrap::bootstrap(config).await.context(BootstrapSnafu)?;
    let outcome = seed::seed_demo_user(&state).await;
    state.db.close().await;
    outcome.context(SeedSnafu)?;
    Ok(())
}

/// Initializes the logging system based on configuration.
///
/// Supports three formats:
/// - `Text`: Human-readable format (development)
/// - `Json`: JSON structured logging (production)
/// - `Auto`: JSON for non-TTY stdout, text otherwise
fn init_logging(config: &Config) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let use_json = match config.log_format {
        LogFormat::Json => true,
        LogFormat::Text => false,
        LogFormat::Auto => !std::io::stdout().is_terminal(),
    };

    if use_json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().json().flatten_event(true).with_current_span(false))
            .init();
    } else {
        tracing_subscriber::registry().with(env_filter).with(fmt::layer()).init();
    }
}

/// Initializes the Prometheus metrics exporter.
///
/// Starts an HTTP server that exposes metrics at `/metrics`, with latency
/// histogram buckets aligned to the API's SLI targets.
fn init_metrics_exporter(addr: SocketAddr) -> Result<(), ServerError> {
    let builder = PrometheusBuilder::new()
        .with_http_listener(addr)
        .set_buckets(&medibills_api::metrics::SLI_HISTOGRAM_BUCKETS)
        .map_err(|e| ServerError::Metrics {
            message: format!("failed to configure histogram buckets: {e}"),
        })?;

    builder.install().map_err(|e| ServerError::Metrics {
        message: format!("failed to install Prometheus exporter: {e}"),
    })?;

    tracing::info!(metrics_addr = %addr, "Prometheus metrics exporter started");
    Ok(())
}
