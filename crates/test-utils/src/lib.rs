//! Shared test utilities for MediBills crates.
//!
//! This crate provides common test helpers to reduce boilerplate across test modules:
//!
//! - [`TestDir`] - Managed temporary directory with a SQLite URL helper
//! - [`test_database_config`] - Database configuration pointing into a [`TestDir`]
//! - [`test_rate_limit_config`] - Rate limit configuration with a custom budget
//! - [`strategies`] - Proptest generators for valid domain values

#![deny(unsafe_code)]

mod test_dir;
pub use test_dir::TestDir;

mod config;
pub use config::{
    TEST_SESSION_SECRET, test_database_config, test_rate_limit_config, test_session_config,
};

pub mod strategies;

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use std::time::Duration;

    use super::*;

    // ============================================
    // TestDir tests
    // ============================================

    #[test]
    fn test_dir_creates_temp_directory() {
        let dir = TestDir::new();
        assert!(dir.path().exists(), "temp directory should exist");
        assert!(dir.path().is_dir(), "should be a directory");
    }

    #[test]
    fn test_dir_join_creates_subdirectory_path() {
        let dir = TestDir::new();
        let subpath = dir.join("subdir/nested");
        assert!(subpath.starts_with(dir.path()));
        assert!(subpath.ends_with("subdir/nested"));
    }

    #[test]
    fn test_dir_sqlite_url_points_inside_directory() {
        let dir = TestDir::new();
        let url = dir.sqlite_url("medibills.sqlite");
        assert!(url.starts_with("sqlite:"));
        assert!(url.ends_with("medibills.sqlite"));
        assert!(url.contains(&dir.path().display().to_string()));
    }

    #[test]
    fn test_dir_cleanup_on_drop() {
        let path = {
            let dir = TestDir::new();
            let p = dir.path().to_path_buf();
            std::fs::write(p.join("file.txt"), "data").expect("write file");
            assert!(p.exists());
            p
        };
        assert!(!path.exists(), "temp directory should be cleaned up on drop");
    }

    // ============================================
    // Config helper tests
    // ============================================

    #[test]
    fn test_database_config_uses_test_dir() {
        let dir = TestDir::new();
        let config = test_database_config(&dir);
        assert_eq!(config.url, dir.sqlite_url("medibills-test.sqlite"));
        assert!(config.max_connections > 0);
    }

    #[test]
    fn test_rate_limit_config_uses_budget() {
        let config = test_rate_limit_config(3);
        assert_eq!(config.max_requests, 3);
        assert_eq!(config.window, Duration::from_secs(60));
    }

    #[test]
    fn test_session_secret_is_long_enough() {
        assert!(TEST_SESSION_SECRET.len() >= 32);
        assert!(test_session_config().validate().is_ok());
    }
}
