//! Error handling
//!
//! Every failure that prevents an operation from being attempted is a
//! [`BasementError`]. Outcomes the store reports as a normal "no" (an `add`
//! on an existing key, a `replace` on a missing key, a CAS mismatch, a key
//! that does not exist) are not errors and never show up here.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by the client, the transcoders and the stores
#[derive(Error, Debug)]
pub enum BasementError {
    /// Malformed or contradictory caller input
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Transcoder registration or configuration is unusable
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// The store does not know the requested design document or view
    #[error("Unknown view '{view}' in design document '{design}'")]
    InvalidView { design: String, view: String },

    /// The store could not be reached or refused the connection
    #[error("Failed to connect to '{host}': {reason}")]
    ConnectionFailure { host: String, reason: String },

    /// An operation needed the store but no connection was established
    #[error("Not connected. Call connect() first or enable 'connect' in the configuration.")]
    NotConnected,

    /// A payload could not be encoded or a stored value could not be decoded
    #[error("Transcoder '{transcoder}' failed: {details}")]
    Transcode { transcoder: String, details: String },

    /// A local store snapshot could not be read or parsed
    #[error("Invalid snapshot at '{path}': {details}")]
    Snapshot { path: PathBuf, details: String },

    /// Generic I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl BasementError {
    /// Shorthand for [`BasementError::InvalidArgument`]
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        BasementError::InvalidArgument(msg.into())
    }

    /// Shorthand for [`BasementError::Transcode`]
    pub fn transcode(transcoder: &str, details: impl ToString) -> Self {
        BasementError::Transcode {
            transcoder: transcoder.to_string(),
            details: details.to_string(),
        }
    }

    /// Whether the caller can fix this error by changing its input
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            BasementError::InvalidArgument(_)
                | BasementError::InvalidConfiguration(_)
                | BasementError::InvalidView { .. }
        )
    }

    /// Get a recovery suggestion for this error
    pub fn recovery_suggestion(&self) -> Option<&'static str> {
        match self {
            BasementError::InvalidView { .. } => {
                Some("Check the design document and view names, and that the view is published.")
            }
            BasementError::ConnectionFailure { .. } => {
                Some("Check that the host is reachable and the bucket credentials are correct.")
            }
            BasementError::NotConnected => Some("Call connect() before issuing operations."),
            BasementError::Transcode { .. } => {
                Some("Make sure the value was written with the same transcoder used to read it.")
            }
            BasementError::Snapshot { .. } => {
                Some("Move the snapshot file aside to start with an empty store.")
            }
            _ => None,
        }
    }
}

/// Result type for basement operations
pub type Result<T> = std::result::Result<T, BasementError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_view_display() {
        let err = BasementError::InvalidView {
            design: "users".to_string(),
            view: "by_name".to_string(),
        };

        let msg = err.to_string();
        assert!(msg.contains("users"));
        assert!(msg.contains("by_name"));
        assert!(err.is_caller_error());
        assert!(err.recovery_suggestion().is_some());
    }

    #[test]
    fn test_connection_failure_is_not_caller_error() {
        let err = BasementError::ConnectionFailure {
            host: "1.2.3.4".to_string(),
            reason: "timed out".to_string(),
        };

        assert!(!err.is_caller_error());
        assert!(err.to_string().contains("1.2.3.4"));
        assert!(err.recovery_suggestion().is_some());
    }

    #[test]
    fn test_io_conversion() {
        let io_err = io::Error::new(io::ErrorKind::PermissionDenied, "denied");
        let err: BasementError = io_err.into();

        assert!(matches!(err, BasementError::Io(_)));
        assert!(err.recovery_suggestion().is_none());
    }

    #[test]
    fn test_invalid_argument_helper() {
        let err = BasementError::invalid_argument("No key given");
        assert_eq!(err.to_string(), "Invalid argument: No key given");
    }
}
