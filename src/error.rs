//! Error types returned at the upload pipeline boundary.
//!
//! Every failure the library can produce is an [`UploadError`]. Callers that
//! only care about the category (for example to pick an API status code) use
//! [`UploadError::kind`] and [`UploadError::code`].

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::constants::{STATUS_ERROR, STATUS_VALIDATE_PARAM};
use crate::security::safe_error_message;

/// Failure produced by the sniff / compress / connect / upload steps.
#[derive(Debug, Error)]
pub enum UploadError {
    /// Session or sub-channel setup failed
    #[error("connection error: {0}")]
    Connection(String),

    /// A path segment could not be created or is not a directory
    #[error("directory error at {path}: {message}")]
    Directory { path: String, message: String },

    /// put/get/remove failed on an open session
    #[error("transfer error: {0}")]
    Transfer(String),

    /// Image decode or encode failed
    #[error("compression error: {0}")]
    Compression(String),

    /// Caller input rejected before any remote work
    #[error("validation error: {0}")]
    Validation(String),

    /// Missing or malformed configuration
    #[error("configuration error: {0}")]
    Config(String),

    /// Reading the caller's stream failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Fieldless category of an [`UploadError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Connection,
    Directory,
    Transfer,
    Compression,
    Validation,
    Config,
    Io,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Connection => "connection",
            ErrorKind::Directory => "directory",
            ErrorKind::Transfer => "transfer",
            ErrorKind::Compression => "compression",
            ErrorKind::Validation => "validation",
            ErrorKind::Config => "config",
            ErrorKind::Io => "io",
        };
        f.write_str(name)
    }
}

impl UploadError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            UploadError::Connection(_) => ErrorKind::Connection,
            UploadError::Directory { .. } => ErrorKind::Directory,
            UploadError::Transfer(_) => ErrorKind::Transfer,
            UploadError::Compression(_) => ErrorKind::Compression,
            UploadError::Validation(_) => ErrorKind::Validation,
            UploadError::Config(_) => ErrorKind::Config,
            UploadError::Io(_) => ErrorKind::Io,
        }
    }

    /// Machine-readable status code for response envelopes.
    ///
    /// Validation failures use the parameter-validation code (100); everything
    /// else is reported as a generic operation failure (500).
    pub fn code(&self) -> u16 {
        match self.kind() {
            ErrorKind::Validation => STATUS_VALIDATE_PARAM,
            _ => STATUS_ERROR,
        }
    }

    /// Build a connection error, scrubbing credentials from the cause.
    pub fn connection(context: &str, cause: &impl fmt::Display) -> Self {
        UploadError::Connection(safe_error_message(context, cause))
    }

    /// Build a transfer error, scrubbing credentials from the cause.
    pub fn transfer(context: &str, cause: &impl fmt::Display) -> Self {
        UploadError::Transfer(safe_error_message(context, cause))
    }

    pub fn directory(path: &str, message: impl Into<String>) -> Self {
        UploadError::Directory {
            path: path.to_string(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, UploadError>;

/// Fail with a validation error unless `value` has non-whitespace content.
pub fn ensure_not_blank(value: &str, what: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(UploadError::Validation(format!("{} must not be empty", what)));
    }
    Ok(())
}

/// Fail with a validation error carrying `message` unless `condition` holds.
pub fn ensure_that(condition: bool, message: impl Into<String>) -> Result<()> {
    if condition {
        Ok(())
    } else {
        Err(UploadError::Validation(message.into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_maps_to_parameter_code() {
        let err = UploadError::Validation("file name must not be empty".into());
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(err.code(), 100);
    }

    #[test]
    fn test_transport_errors_map_to_generic_failure() {
        let errors = vec![
            UploadError::Connection("refused".into()),
            UploadError::directory("/data/a", "permission denied"),
            UploadError::Transfer("broken pipe".into()),
            UploadError::Compression("bad header".into()),
        ];

        for err in errors {
            assert_eq!(err.code(), 500, "unexpected code for {}", err);
        }
    }

    #[test]
    fn test_connection_error_scrubs_password() {
        let err = UploadError::connection("login failed", &"password=hunter2 rejected");
        let text = err.to_string();
        assert!(!text.contains("hunter2"));
        assert!(text.contains("<REDACTED_PASSWORD>"));
    }

    #[test]
    fn test_ensure_helpers() {
        assert!(ensure_not_blank("avatars", "logical path").is_ok());
        let err = ensure_not_blank("   ", "file name").unwrap_err();
        assert_eq!(err.to_string(), "validation error: file name must not be empty");

        assert!(ensure_that(true, "unused").is_ok());
        assert_eq!(ensure_that(false, "nope").unwrap_err().kind(), ErrorKind::Validation);
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "stream ended");
        let err: UploadError = io.into();
        assert_eq!(err.kind(), ErrorKind::Io);
    }
}
