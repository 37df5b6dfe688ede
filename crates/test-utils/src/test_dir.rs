//! Temporary directory management for tests.
//!
//! [`TestDir`] wraps [`tempfile::TempDir`] and knows how to point a SQLite
//! connection string at a file inside itself.

// Test utilities are expected to panic on failure - that's their purpose
#![allow(clippy::expect_used)]

use std::path::{Path, PathBuf};

use tempfile::TempDir;

/// A managed temporary directory for tests.
///
/// The directory, and any database files in it, are removed when this struct
/// is dropped. Keep it alive for as long as the database is open.
///
/// # Example
///
/// ```
/// use medibills_test_utils::TestDir;
///
/// let dir = TestDir::new();
/// let url = dir.sqlite_url("test.sqlite");
/// assert!(url.starts_with("sqlite:"));
/// ```
pub struct TestDir {
    inner: TempDir,
}

impl TestDir {
    /// Create a new temporary directory.
    ///
    /// # Panics
    ///
    /// Panics if the temporary directory cannot be created.
    #[must_use]
    pub fn new() -> Self {
        let inner = TempDir::new().expect("failed to create temp directory");
        Self { inner }
    }

    /// Returns the path to the temporary directory.
    #[must_use]
    pub fn path(&self) -> &Path {
        self.inner.path()
    }

    /// Join a relative path to the temporary directory.
    #[must_use]
    pub fn join<P: AsRef<Path>>(&self, path: P) -> PathBuf {
        self.inner.path().join(path)
    }

    /// `sqlite:` connection string for `file_name` inside this directory.
    #[must_use]
    pub fn sqlite_url(&self, file_name: &str) -> String {
        format!("sqlite:{}", self.join(file_name).display())
    }
}

impl Default for TestDir {
    fn default() -> Self {
        Self::new()
    }
}
