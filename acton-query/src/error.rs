//! Error types for the query engine
//!
//! Pagination input is advisory, so almost every malformed parameter degrades
//! to a default instead of producing an error. The variants here cover the few
//! places where a caller can observe a failure directly: decoding a cursor by
//! hand, loading configuration, and installing the tracing subscriber.

use thiserror::Error;

/// Result type alias using the query engine error
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the query engine
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration could not be loaded or extracted
    #[error("Configuration error: {0}")]
    Config(Box<figment::Error>),

    /// Cursor token is not base64url or does not decode to a cursor payload
    #[error("Invalid cursor: {0}")]
    InvalidCursor(String),

    /// Tracing subscriber could not be installed
    #[error("Observability error: {0}")]
    Observability(String),
}

impl Error {
    /// Whether this error came from decoding a cursor token
    #[must_use]
    pub fn is_invalid_cursor(&self) -> bool {
        matches!(self, Self::InvalidCursor(_))
    }
}

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Error::Config(Box::new(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_cursor_display() {
        let err = Error::InvalidCursor("bad padding".to_string());
        assert_eq!(err.to_string(), "Invalid cursor: bad padding");
        assert!(err.is_invalid_cursor());
    }

    #[test]
    fn test_config_error_from_figment() {
        let err: Error = figment::Error::from("missing field".to_string()).into();
        assert!(matches!(err, Error::Config(_)));
        assert!(!err.is_invalid_cursor());
    }
}
