use std::fmt;

use thiserror::Error;

/// Error code and message reported by the native engine, passed through untranslated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeError {
    /// SQLite extended result code, when the engine produced one.
    pub code: Option<i32>,
    /// Engine message (or the driver's description when the engine gave none).
    pub message: String,
}

impl NativeError {
    #[must_use]
    pub fn new(code: Option<i32>, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for NativeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.code {
            Some(code) => write!(f, "{} (code {code})", self.message),
            None => f.write_str(&self.message),
        }
    }
}

impl std::error::Error for NativeError {}

impl From<&rusqlite::Error> for NativeError {
    fn from(err: &rusqlite::Error) -> Self {
        match err {
            rusqlite::Error::SqliteFailure(ffi_err, message) => NativeError::new(
                Some(ffi_err.extended_code),
                message.clone().unwrap_or_else(|| ffi_err.to_string()),
            ),
            other => NativeError::new(None, other.to_string()),
        }
    }
}

/// Errors surfaced by every public operation.
///
/// The type is `Clone` so the callback channel and the deferred value of one call
/// can both report the same failure.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SqliteBridgeError {
    #[error("database is not open")]
    NotOpen,

    #[error("database is already closed")]
    AlreadyClosed,

    #[error("failed to open database `{name}`: {source}")]
    Open { name: String, source: NativeError },

    #[error("failed to prepare statement: {0}")]
    Prepare(NativeError),

    #[error("failed to bind parameters: {0}")]
    Bind(NativeError),

    #[error("statement execution failed: {0}")]
    Statement(NativeError),

    #[error("missing required callback: {0}")]
    CallbackContract(&'static str),

    #[error("row callback aborted iteration: {0}")]
    RowCallback(String),

    #[error("plugin `{name}` failed: {message}")]
    Plugin { name: String, message: String },

    #[error("SQLite worker error: {0}")]
    Worker(String),

    #[error("no Tokio runtime available: {0}")]
    Runtime(String),
}

impl SqliteBridgeError {
    /// Native error details, for the variants that carry them.
    #[must_use]
    pub fn native(&self) -> Option<&NativeError> {
        match self {
            Self::Open { source, .. } => Some(source),
            Self::Prepare(native) | Self::Bind(native) | Self::Statement(native) => Some(native),
            _ => None,
        }
    }

    /// Failure raised by a plugin init hook.
    pub fn plugin(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Plugin {
            name: name.into(),
            message: message.into(),
        }
    }

    pub(crate) fn prepare(err: &rusqlite::Error) -> Self {
        Self::Prepare(NativeError::from(err))
    }

    pub(crate) fn bind(err: &rusqlite::Error) -> Self {
        Self::Bind(NativeError::from(err))
    }

    pub(crate) fn statement(err: &rusqlite::Error) -> Self {
        Self::Statement(NativeError::from(err))
    }

    pub(crate) fn worker(message: impl Into<String>) -> Self {
        Self::Worker(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn native_error_keeps_engine_code_and_message() {
        let err = rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error {
                code: rusqlite::ErrorCode::ConstraintViolation,
                extended_code: 2067,
            },
            Some("UNIQUE constraint failed: t.x".into()),
        );
        let native = NativeError::from(&err);
        assert_eq!(native.code, Some(2067));
        assert_eq!(native.message, "UNIQUE constraint failed: t.x");
        assert_eq!(native.to_string(), "UNIQUE constraint failed: t.x (code 2067)");
    }

    #[test]
    fn driver_errors_have_no_code() {
        let err = rusqlite::Error::InvalidParameterCount(1, 2);
        let wrapped = SqliteBridgeError::bind(&err);
        let native = wrapped.native().cloned().unwrap_or_else(|| NativeError::new(None, ""));
        assert_eq!(native.code, None);
        assert!(!native.message.is_empty());
        assert!(SqliteBridgeError::NotOpen.native().is_none());
    }
}
