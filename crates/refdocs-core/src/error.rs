//! Error types and handling for refdocs-core operations.
//!
//! Errors are grouped by where they come from in the ingestion pipeline so the
//! scheduler can decide how to react without inspecting messages:
//!
//! - **Upstream errors**: registry, branch listing and contents requests
//!   ([`Error::Network`], [`Error::Upstream`]). These trigger fallbacks.
//! - **Index errors**: Tantivy failures while building or querying.
//! - **Storage errors**: snapshot persistence. Logged, never roll back memory.
//! - **Configuration errors**: invalid route tables. Fatal at startup only.
//!
//! ```rust
//! use refdocs_core::Error;
//!
//! let err = Error::Upstream {
//!     service: "contents".to_string(),
//!     status: 503,
//!     message: "service unavailable".to_string(),
//! };
//! assert!(err.is_recoverable());
//! assert_eq!(err.category(), "upstream");
//! ```

use thiserror::Error;

/// The main error type for refdocs-core operations.
///
/// Every fallible public function returns `Result<T, Error>`. Per-document
/// failures are reported through this type but are never allowed to abort a
/// whole refresh cycle; see [`crate::pipeline`].
#[derive(Error, Debug)]
pub enum Error {
    /// I/O operation failed.
    ///
    /// Covers snapshot reads and writes and configuration file access.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Transport-level failure talking to a remote service.
    ///
    /// The underlying `reqwest::Error` is preserved so timeouts and connection
    /// failures can be told apart from request construction errors.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// A remote service answered with a non-success status.
    #[error("Upstream {service} returned {status}: {message}")]
    Upstream {
        /// Which remote API failed (`registry`, `branches`, `contents`).
        service: String,
        /// HTTP status code.
        status: u16,
        /// Response body or reason phrase.
        message: String,
    },

    /// Remote payload or document content could not be interpreted.
    #[error("Parse error: {0}")]
    Parse(String),

    /// Search index operation failed.
    #[error("Index error: {0}")]
    Index(String),

    /// Snapshot persistence failed.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Configuration is invalid or inaccessible.
    ///
    /// Raised by [`crate::Config::validate`] and treated as fatal at startup.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Requested route or document does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Serialization or deserialization failed.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic error for uncategorized failures.
    #[error("{0}")]
    Other(String),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(err.to_string())
    }
}

impl From<tantivy::TantivyError> for Error {
    fn from(err: tantivy::TantivyError) -> Self {
        Self::Index(err.to_string())
    }
}

impl Error {
    /// Check if the error might go away on the next attempt.
    ///
    /// The scheduler never retries inside a cycle; this is used to pick a log
    /// level and to let callers of the one-shot CLI decide whether to retry.
    ///
    /// ```rust
    /// use refdocs_core::Error;
    /// use std::io;
    ///
    /// assert!(Error::Io(io::Error::new(io::ErrorKind::TimedOut, "timeout")).is_recoverable());
    /// assert!(!Error::Config("duplicate permalink".to_string()).is_recoverable());
    /// ```
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Network(e) => e.is_timeout() || e.is_connect(),
            Self::Upstream { status, .. } => *status >= 500 || *status == 429,
            Self::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::TimedOut | std::io::ErrorKind::Interrupted
            ),
            _ => false,
        }
    }

    /// Get the error category as a stable string identifier for structured logs.
    #[must_use]
    pub const fn category(&self) -> &'static str {
        match self {
            Self::Io(_) => "io",
            Self::Network(_) => "network",
            Self::Upstream { .. } => "upstream",
            Self::Parse(_) => "parse",
            Self::Index(_) => "index",
            Self::Storage(_) => "storage",
            Self::Config(_) => "config",
            Self::NotFound(_) => "not_found",
            Self::Serialization(_) => "serialization",
            Self::Other(_) => "other",
        }
    }
}

/// Convenience type alias for `std::result::Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
#[allow(clippy::panic, clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_error_display_formatting() {
        let errors = vec![
            Error::Parse("bad base64".to_string()),
            Error::Index("commit failed".to_string()),
            Error::Storage("disk full".to_string()),
            Error::Config("duplicate permalink".to_string()),
            Error::NotFound("/missing.html".to_string()),
            Error::Other("unknown".to_string()),
        ];

        for error in errors {
            let rendered = error.to_string();
            match &error {
                Error::Parse(msg) => assert_eq!(rendered, format!("Parse error: {msg}")),
                Error::Index(msg) => assert_eq!(rendered, format!("Index error: {msg}")),
                Error::Storage(msg) => assert_eq!(rendered, format!("Storage error: {msg}")),
                Error::Config(msg) => {
                    assert_eq!(rendered, format!("Configuration error: {msg}"));
                },
                Error::NotFound(msg) => assert_eq!(rendered, format!("Not found: {msg}")),
                Error::Other(msg) => assert_eq!(&rendered, msg),
                _ => panic!("unexpected variant"),
            }
        }
    }

    #[test]
    fn test_upstream_error_display() {
        let err = Error::Upstream {
            service: "branches".to_string(),
            status: 404,
            message: "Not Found".to_string(),
        };
        assert_eq!(err.to_string(), "Upstream branches returned 404: Not Found");
    }

    #[test]
    fn test_error_categories() {
        assert_eq!(Error::Io(io::Error::other("x")).category(), "io");
        assert_eq!(Error::Parse(String::new()).category(), "parse");
        assert_eq!(Error::Index(String::new()).category(), "index");
        assert_eq!(Error::Storage(String::new()).category(), "storage");
        assert_eq!(Error::Config(String::new()).category(), "config");
        assert_eq!(Error::NotFound(String::new()).category(), "not_found");
        assert_eq!(Error::Serialization(String::new()).category(), "serialization");
        assert_eq!(Error::Other(String::new()).category(), "other");
    }

    #[test]
    fn test_error_recoverability() {
        let recoverable = vec![
            Error::Io(io::Error::new(io::ErrorKind::TimedOut, "timeout")),
            Error::Io(io::Error::new(io::ErrorKind::Interrupted, "interrupted")),
            Error::Upstream {
                service: "contents".to_string(),
                status: 502,
                message: "bad gateway".to_string(),
            },
            Error::Upstream {
                service: "contents".to_string(),
                status: 429,
                message: "rate limited".to_string(),
            },
        ];
        for err in recoverable {
            assert!(err.is_recoverable(), "{err} should be recoverable");
        }

        let permanent = vec![
            Error::Io(io::Error::new(io::ErrorKind::PermissionDenied, "denied")),
            Error::Upstream {
                service: "contents".to_string(),
                status: 401,
                message: "bad credentials".to_string(),
            },
            Error::Config("missing".to_string()),
            Error::Parse("bad".to_string()),
        ];
        for err in permanent {
            assert!(!err.is_recoverable(), "{err} should not be recoverable");
        }
    }

    #[test]
    fn test_serde_json_conversion() {
        let parse_failure = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let err: Error = parse_failure.into();
        assert_eq!(err.category(), "serialization");
    }
}
