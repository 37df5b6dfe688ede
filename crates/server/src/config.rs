//! Command-line and environment configuration.
//!
//! Every flag can also be set through an environment variable; flags win.
//! The parsed [`Config`] is turned into the validated section types from
//! [`medibills_types::config`] before anything is opened.

use std::{net::SocketAddr, time::Duration};

use clap::{Args, Parser, Subcommand, ValueEnum};
use medibills_api::ApiSettings;
use medibills_types::config::{
    ConfigError, DatabaseConfig, Environment, RateLimitConfig, SessionConfig,
};

/// Secret used when `SESSION_SECRET` is unset outside production.
pub const DEV_SESSION_SECRET: &str = "medibills-development-session-secret-change-me";

/// Shortest session secret accepted in production.
pub const MIN_PRODUCTION_SECRET_BYTES: usize = 32;

/// MediBills API server.
#[derive(Debug, Parser)]
#[command(name = "medibills", version, about = "Personal medical bill tracking API")]
pub struct Cli {
    /// What to do; defaults to `serve`.
    #[command(subcommand)]
    pub command: Option<CliCommand>,

    #[command(flatten)]
    pub config: Config,
}

/// Top-level subcommands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Subcommand)]
pub enum CliCommand {
    /// Run the HTTP server.
    Serve,
    /// Create the schema and exit.
    Migrate,
    /// Create the demo account if it does not exist.
    Seed,
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// JSON when stdout is not a terminal, text otherwise.
    #[default]
    Auto,
    /// JSON lines for log aggregation.
    Json,
    /// Human-readable text.
    Text,
}

/// Server settings.
#[derive(Debug, Clone, Args)]
pub struct Config {
    /// Address the HTTP server binds to.
    #[arg(long = "listen", env = "MEDIBILLS_LISTEN", default_value = "0.0.0.0:3001")]
    pub listen_addr: SocketAddr,

    /// SQLite connection URL.
    #[arg(long, env = "DATABASE_URL", default_value = "sqlite:./database.sqlite")]
    pub database_url: String,

    /// Maximum pooled database connections.
    #[arg(long, env = "MEDIBILLS_DB_MAX_CONNECTIONS", default_value_t = 5)]
    pub db_max_connections: u32,

    /// Key for session token digests. Required in production.
    #[arg(long, env = "SESSION_SECRET", hide_env_values = true)]
    pub session_secret: Option<String>,

    /// Rolling session idle timeout (e.g. `24h`).
    #[arg(long, env = "MEDIBILLS_SESSION_IDLE", default_value = "24h", value_parser = humantime::parse_duration)]
    pub session_idle: Duration,

    /// Hard session lifetime cap (e.g. `7d`).
    #[arg(long, env = "MEDIBILLS_SESSION_ABSOLUTE", default_value = "7d", value_parser = humantime::parse_duration)]
    pub session_absolute: Duration,

    /// Rate limit window in milliseconds.
    #[arg(long, env = "RATE_LIMIT_WINDOW_MS", default_value_t = 900_000)]
    pub rate_limit_window_ms: u64,

    /// Requests allowed per client per window.
    #[arg(long, env = "RATE_LIMIT_MAX_REQUESTS", default_value_t = 100)]
    pub rate_limit_max_requests: u64,

    /// Deployment environment: development, production, or test.
    #[arg(long, env = "MEDIBILLS_ENV", default_value = "development")]
    pub environment: Environment,

    /// Comma-separated origins allowed to send credentialed requests.
    #[arg(
        long,
        env = "MEDIBILLS_ALLOWED_ORIGINS",
        value_delimiter = ',',
        default_value = "http://localhost:3000,http://127.0.0.1:3000"
    )]
    pub allowed_origins: Vec<String>,

    /// Log output format.
    #[arg(long, env = "MEDIBILLS_LOG_FORMAT", value_enum, default_value_t = LogFormat::Auto)]
    pub log_format: LogFormat,

    /// Address for the Prometheus `/metrics` endpoint. Disabled when unset.
    #[arg(long, env = "MEDIBILLS_METRICS_ADDR")]
    pub metrics_addr: Option<SocketAddr>,
}

impl Config {
    /// Connection pool settings.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the URL is not SQLite or the pool size is zero.
    pub fn database(&self) -> Result<DatabaseConfig, ConfigError> {
        DatabaseConfig::builder()
            .url(self.database_url.clone())
            .max_connections(self.db_max_connections)
            .build()
    }

    /// Session lifetimes. Cookies are marked `Secure` in production.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if a timeout is zero or the absolute cap is
    /// shorter than the idle window.
    pub fn session(&self) -> Result<SessionConfig, ConfigError> {
        SessionConfig::builder()
            .idle_timeout(self.session_idle)
            .absolute_timeout(self.session_absolute)
            .secure_cookies(self.environment.is_production())
            .build()
    }

    /// Per-client request budget.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the window or budget is zero.
    pub fn rate_limit(&self) -> Result<RateLimitConfig, ConfigError> {
        RateLimitConfig::builder()
            .window(Duration::from_millis(self.rate_limit_window_ms))
            .max_requests(self.rate_limit_max_requests)
            .build()
    }

    /// Resolves the session secret.
    ///
    /// Outside production a missing secret falls back to
    /// [`DEV_SESSION_SECRET`]. In production the secret must be set and at
    /// least [`MIN_PRODUCTION_SECRET_BYTES`] long.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] for a missing, empty, or short production secret.
    pub fn session_secret(&self) -> Result<Vec<u8>, ConfigError> {
        let secret = match self.session_secret.as_deref() {
            Some(secret) if !secret.is_empty() => secret,
            _ if self.environment.is_production() => {
                return Err(ConfigError::Validation {
                    message: "SESSION_SECRET is required in production".to_string(),
                });
            },
            _ => {
                tracing::warn!(
                    "SESSION_SECRET is not set; using the development fallback. \
                     Sessions will not survive a secret change."
                );
                DEV_SESSION_SECRET
            },
        };

        if self.environment.is_production() && secret.len() < MIN_PRODUCTION_SECRET_BYTES {
            return Err(ConfigError::Validation {
                message: format!(
                    "SESSION_SECRET must be at least {MIN_PRODUCTION_SECRET_BYTES} bytes in production"
                ),
            });
        }
        Ok(secret.as_bytes().to_vec())
    }

    /// HTTP-layer settings for [`medibills_api::AppState`].
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if a section fails validation.
    pub fn api_settings(&self) -> Result<ApiSettings, ConfigError> {
        let allowed_origins = self
            .allowed_origins
            .iter()
            .map(|origin| origin.trim().to_string())
            .filter(|origin| !origin.is_empty())
            .collect();

        Ok(ApiSettings::builder()
            .environment(self.environment)
            .session(self.session()?)
            .rate_limit(self.rate_limit()?)
            .allowed_origins(allowed_origins)
            .build())
    }

    /// Whether the server only accepts loopback connections.
    pub fn is_localhost_only(&self) -> bool {
        self.listen_addr.ip().is_loopback()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        let argv = std::iter::once("medibills").chain(args.iter().copied());
        Cli::try_parse_from(argv).expect("valid arguments")
    }

    #[test]
    fn test_defaults() {
        let cli = parse(&[]);
        assert!(cli.command.is_none());
        let config = cli.config;
        assert_eq!(config.listen_addr, "0.0.0.0:3001".parse().unwrap());
        assert_eq!(config.database_url, "sqlite:./database.sqlite");
        assert_eq!(config.session_idle, Duration::from_secs(24 * 60 * 60));
        assert_eq!(config.session_absolute, Duration::from_secs(7 * 24 * 60 * 60));
        assert_eq!(config.environment, Environment::Development);
        assert_eq!(config.allowed_origins, vec![
            "http://localhost:3000".to_string(),
            "http://127.0.0.1:3000".to_string()
        ]);
        assert_eq!(config.log_format, LogFormat::Auto);
        assert!(config.metrics_addr.is_none());
    }

    #[test]
    fn test_subcommands() {
        assert_eq!(parse(&["serve"]).command, Some(CliCommand::Serve));
        assert_eq!(parse(&["migrate"]).command, Some(CliCommand::Migrate));
        assert_eq!(parse(&["seed"]).command, Some(CliCommand::Seed));
    }

    #[test]
    fn test_sections_from_flags() {
        let config = parse(&[
            "--database-url",
            "sqlite::memory:",
            "--db-max-connections",
            "2",
            "--rate-limit-window-ms",
            "60000",
            "--rate-limit-max-requests",
            "10",
            "--session-idle",
            "30m",
            "--session-absolute",
            "1day",
        ])
        .config;

        assert_eq!(config.database().unwrap().max_connections, 2);
        let rate_limit = config.rate_limit().unwrap();
        assert_eq!(rate_limit.window, Duration::from_secs(60));
        assert_eq!(rate_limit.max_requests, 10);
        let session = config.session().unwrap();
        assert_eq!(session.idle_timeout, Duration::from_secs(30 * 60));
        assert!(!session.secure_cookies);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let argv = ["medibills", "--environment", "staging"];
        assert!(Cli::try_parse_from(argv).is_err());

        let config = parse(&["--rate-limit-max-requests", "0"]).config;
        assert!(config.rate_limit().is_err());

        let config = parse(&["--session-idle", "2d", "--session-absolute", "1d"]).config;
        assert!(config.session().is_err());
        assert!(config.api_settings().is_err());
    }

    #[test]
    fn test_origins_split_and_trimmed() {
        let config = parse(&["--allowed-origins", "https://a.example, https://b.example,"]).config;
        let settings = config.api_settings().unwrap();
        assert_eq!(settings.allowed_origins, vec![
            "https://a.example".to_string(),
            "https://b.example".to_string()
        ]);
    }

    #[test]
    fn test_development_secret_fallback() {
        let config = parse(&[]).config;
        assert_eq!(config.session_secret().unwrap(), DEV_SESSION_SECRET.as_bytes());
    }

    #[test]
    fn test_production_requires_long_secret() {
        let config = parse(&["--environment", "production"]).config;
        assert!(config.session_secret().is_err());

        let config = parse(&["--environment", "production", "--session-secret", "short"]).config;
        let err = config.session_secret().unwrap_err();
        assert!(err.to_string().contains("at least 32 bytes"));

        let secret = "a".repeat(MIN_PRODUCTION_SECRET_BYTES);
        let config = parse(&["--environment", "production", "--session-secret", &secret]).config;
        assert_eq!(config.session_secret().unwrap().len(), MIN_PRODUCTION_SECRET_BYTES);
        assert!(config.session().unwrap().secure_cookies);
    }

    #[test]
    fn test_localhost_detection() {
        assert!(parse(&["--listen", "127.0.0.1:3001"]).config.is_localhost_only());
        assert!(!parse(&[]).config.is_localhost_only());
    }
}
