// ABOUTME: Error types for siteapi including the ErrorCode enum and the Error struct.
// ABOUTME: Provides categorized errors with convenience constructors and boolean helpers.

use std::fmt;

/// Error codes representing the categories of pipeline failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    InvalidUrl,
    InvalidRoute,
    Fetch,
    Timeout,
    Extract,
    Storage,
    Cache,
    Config,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorCode::InvalidUrl => "invalid URL",
            ErrorCode::InvalidRoute => "invalid route",
            ErrorCode::Fetch => "fetch error",
            ErrorCode::Timeout => "timeout",
            ErrorCode::Extract => "extraction error",
            ErrorCode::Storage => "storage error",
            ErrorCode::Cache => "cache error",
            ErrorCode::Config => "configuration error",
        };
        write!(f, "{}", s)
    }
}

/// The error type shared by every stage of the resolution pipeline.
///
/// `path` is the request path (or URL, for fetch errors) the failure is about
/// and `op` names the operation that failed.
#[derive(Debug, thiserror::Error)]
pub struct Error {
    pub code: ErrorCode,
    pub path: String,
    pub op: String,
    #[source]
    pub source: Option<anyhow::Error>,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "siteapi: {} {}: {}", self.op, self.path, self.code)?;
        if let Some(ref src) = self.source {
            write!(f, ": {}", src)?;
        }
        Ok(())
    }
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    fn with_code(
        code: ErrorCode,
        path: impl Into<String>,
        op: impl Into<String>,
        source: Option<anyhow::Error>,
    ) -> Self {
        Self {
            code,
            path: path.into(),
            op: op.into(),
            source,
        }
    }

    /// Create an InvalidUrl error.
    pub fn invalid_url(
        path: impl Into<String>,
        op: impl Into<String>,
        source: Option<anyhow::Error>,
    ) -> Self {
        Self::with_code(ErrorCode::InvalidUrl, path, op, source)
    }

    /// Create an InvalidRoute error (route pattern that does not compile).
    pub fn invalid_route(
        pattern: impl Into<String>,
        op: impl Into<String>,
        source: Option<anyhow::Error>,
    ) -> Self {
        Self::with_code(ErrorCode::InvalidRoute, pattern, op, source)
    }

    /// Create a Fetch error.
    pub fn fetch(
        path: impl Into<String>,
        op: impl Into<String>,
        source: Option<anyhow::Error>,
    ) -> Self {
        Self::with_code(ErrorCode::Fetch, path, op, source)
    }

    /// Create a Timeout error.
    pub fn timeout(
        path: impl Into<String>,
        op: impl Into<String>,
        source: Option<anyhow::Error>,
    ) -> Self {
        Self::with_code(ErrorCode::Timeout, path, op, source)
    }

    /// Create an Extract error.
    pub fn extract(
        path: impl Into<String>,
        op: impl Into<String>,
        source: Option<anyhow::Error>,
    ) -> Self {
        Self::with_code(ErrorCode::Extract, path, op, source)
    }

    /// Create a Storage error.
    pub fn storage(
        path: impl Into<String>,
        op: impl Into<String>,
        source: Option<anyhow::Error>,
    ) -> Self {
        Self::with_code(ErrorCode::Storage, path, op, source)
    }

    /// Create a Cache error.
    pub fn cache(
        path: impl Into<String>,
        op: impl Into<String>,
        source: Option<anyhow::Error>,
    ) -> Self {
        Self::with_code(ErrorCode::Cache, path, op, source)
    }

    /// Create a Config error.
    pub fn config(op: impl Into<String>, source: Option<anyhow::Error>) -> Self {
        Self::with_code(ErrorCode::Config, String::new(), op, source)
    }

    /// Returns true if this is a Fetch error.
    pub fn is_fetch(&self) -> bool {
        self.code == ErrorCode::Fetch
    }

    /// Returns true if this is a Timeout error.
    pub fn is_timeout(&self) -> bool {
        self.code == ErrorCode::Timeout
    }

    /// Returns true if this is an Extract error.
    pub fn is_extract(&self) -> bool {
        self.code == ErrorCode::Extract
    }

    /// Returns true if this is an InvalidUrl error.
    pub fn is_invalid_url(&self) -> bool {
        self.code == ErrorCode::InvalidUrl
    }

    /// Returns true if this is an InvalidRoute error.
    pub fn is_invalid_route(&self) -> bool {
        self.code == ErrorCode::InvalidRoute
    }

    /// Returns true if this is a Storage error.
    pub fn is_storage(&self) -> bool {
        self.code == ErrorCode::Storage
    }

    /// Returns true if this is a Cache error.
    pub fn is_cache(&self) -> bool {
        self.code == ErrorCode::Cache
    }

    /// Returns true if this is a Config error.
    pub fn is_config(&self) -> bool {
        self.code == ErrorCode::Config
    }
}
