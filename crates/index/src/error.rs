//! Error types for the grove index engine.

use std::io;

use snafu::Snafu;

/// Result type alias for grove operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during index operations.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    /// I/O error from the underlying reader or writer during persistence.
    #[snafu(display("I/O error: {source}"))]
    Io {
        /// The underlying I/O error.
        source: io::Error,
    },

    /// Persisted document is malformed or does not match the expected format.
    #[snafu(display("Corrupted document: {reason}"))]
    Corrupted {
        /// Description of what was malformed.
        reason: String,
    },

    /// Insert of a key that is already present.
    #[snafu(display("Key already exists: {key}"))]
    KeyExists {
        /// The duplicate key.
        key: String,
    },

    /// Lookup, update or removal of a key that is not present.
    #[snafu(display("Key not found: {key}"))]
    KeyNotFound {
        /// The missing key.
        key: String,
    },
}

// Provide automatic conversion from io::Error to Error::Io for ergonomic ? usage
impl From<io::Error> for Error {
    fn from(source: io::Error) -> Self {
        Error::Io { source }
    }
}

// serde_json reports both transport failures and malformed input through one
// error type; split them back into the Io/Corrupted taxonomy.
impl From<serde_json::Error> for Error {
    fn from(source: serde_json::Error) -> Self {
        if source.classify() == serde_json::error::Category::Io {
            Error::Io { source: io::Error::other(source) }
        } else {
            Error::Corrupted { reason: source.to_string() }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_io() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let err = Error::from(io_err);
        let display = format!("{err}");
        assert!(display.starts_with("I/O error:"), "got: {display}");
    }

    #[test]
    fn test_error_display_corrupted() {
        let err = Error::Corrupted { reason: "unexpected end of input".to_string() };
        assert_eq!(format!("{err}"), "Corrupted document: unexpected end of input");
    }

    #[test]
    fn test_error_display_key_exists() {
        let err = Error::KeyExists { key: "alpha".to_string() };
        assert_eq!(format!("{err}"), "Key already exists: alpha");
    }

    #[test]
    fn test_error_display_key_not_found() {
        let err = Error::KeyNotFound { key: "beta".to_string() };
        assert_eq!(format!("{err}"), "Key not found: beta");
    }

    #[test]
    fn test_from_io_error() {
        let io_err = io::Error::new(io::ErrorKind::PermissionDenied, "access denied");
        let err: Error = io_err.into();
        match err {
            Error::Io { source } => assert_eq!(source.kind(), io::ErrorKind::PermissionDenied),
            _ => panic!("Expected Io variant"),
        }
    }

    #[test]
    fn test_from_serde_json_syntax_error() {
        let parse_err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let err: Error = parse_err.into();
        match err {
            Error::Corrupted { .. } => {},
            other => panic!("Expected Corrupted variant, got {other:?}"),
        }
    }

    #[test]
    fn test_error_source_chain() {
        use std::error::Error as StdError;

        let io_err = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let err = Error::from(io_err);

        // snafu should preserve the source chain
        assert!(err.source().is_some(), "Error::Io should have a source");
    }
}
