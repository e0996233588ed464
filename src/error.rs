//! Error handling for rotate_rs
//!
//! This module provides the error type and result alias shared by the
//! filename codec, the directory scanner and the rotation engine.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while operating a rotating file
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid or incomplete configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Errors related to I/O operations
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Errors related to (de)serializing a configuration
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A directory could not be read while scanning
    #[error("Scan error for {path:?}: {message}")]
    Scan {
        path: PathBuf,
        message: String,
    },

    /// Bucket time could not be computed or represented
    #[error("Timestamp error: {0}")]
    Timestamp(String),

    /// The sink has been closed
    #[error("Rotating file is closed")]
    Closed,

    /// A rotation could not open its next file and the sink is degraded
    #[error("Rotation failed: {0}")]
    RotationFailed(String),
}

/// Result type for rotate_rs operations
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create a new configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a new scan error
    pub fn scan(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Scan {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a new timestamp error
    pub fn timestamp(message: impl Into<String>) -> Self {
        Self::Timestamp(message.into())
    }

    /// Create a new rotation failure error
    pub fn rotation_failed(message: impl Into<String>) -> Self {
        Self::RotationFailed(message.into())
    }

    /// Check if this is an I/O error
    pub fn is_io_error(&self) -> bool {
        matches!(self, Self::Io(_))
    }

    /// Check if this is a configuration error
    pub fn is_config_error(&self) -> bool {
        matches!(self, Self::Config(_))
    }

    /// Check if the sink was closed
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Closed)
    }

    /// Check if the sink is degraded after a failed rotation
    pub fn is_rotation_failure(&self) -> bool {
        matches!(self, Self::RotationFailed(_))
    }

    /// Get a user-friendly suggestion for resolving the error
    pub fn suggestion(&self) -> Option<String> {
        match self {
            Self::Config(_) => Some("Directory, layout and extension must all be non-empty".to_string()),
            Self::Io(err) if err.kind() == io::ErrorKind::PermissionDenied => {
                Some("Verify permissions on the rotation directory".to_string())
            }
            Self::Closed => Some("The sink was closed; create a new one to keep writing".to_string()),
            Self::RotationFailed(_) => {
                Some("Check that the rotation directory still exists and is writable".to_string())
            }
            _ => None,
        }
    }
}

impl From<Error> for io::Error {
    fn from(err: Error) -> Self {
        match err {
            Error::Io(err) => err,
            Error::Closed => io::Error::new(io::ErrorKind::BrokenPipe, err),
            other => io::Error::new(io::ErrorKind::Other, other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = Error::config("dir is empty");
        assert!(matches!(err, Error::Config(_)));
        assert!(err.is_config_error());

        let err = Error::scan("/var/log/app", "permission denied");
        assert!(matches!(err, Error::Scan { ref path, .. } if path == &PathBuf::from("/var/log/app")));
    }

    #[test]
    fn test_error_conversion() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "File not found");
        let err = Error::from(io_err);
        assert!(err.is_io_error());

        // Round trip back into io::Error keeps the original kind
        let io_err: io::Error = err.into();
        assert_eq!(io_err.kind(), io::ErrorKind::NotFound);

        let io_err: io::Error = Error::Closed.into();
        assert_eq!(io_err.kind(), io::ErrorKind::BrokenPipe);
    }

    #[test]
    fn test_error_suggestion() {
        assert!(Error::Closed.suggestion().unwrap().contains("closed"));
        assert!(Error::rotation_failed("boom").suggestion().unwrap().contains("writable"));
        assert!(Error::timestamp("x").suggestion().is_none());
        assert_eq!(Error::Closed.to_string(), "Rotating file is closed");
    }
}
