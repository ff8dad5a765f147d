//! Error types for stockroom-core

use thiserror::Error;

use crate::remote::RemoteError;

/// Result type alias using stockroom-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in stockroom-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Local storage medium is inaccessible (fatal for the current call only)
    #[error("Local storage unavailable: {0}")]
    StorageUnavailable(String),

    /// Remote failure expected to resolve on retry (network, timeout, 5xx)
    #[error("Transient remote failure: {0}")]
    Transient(String),

    /// Remote rejection that will recur without different input
    #[error("Rejected by remote catalog: {0}")]
    Permanent(String),

    /// Remote authentication failed; handled by the session layer
    #[error("Remote authentication failed: {0}")]
    Unauthorized(String),

    /// Generated temporary identifier collides with an existing record
    #[error("Identifier conflict: {0}")]
    IdentifierConflict(String),

    /// Product or failure not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Returns true if retrying the same request later may succeed.
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }

    /// Returns true if the remote system rejected the request for good.
    pub const fn is_permanent(&self) -> bool {
        matches!(self, Self::Permanent(_))
    }
}

impl From<libsql::Error> for Error {
    fn from(error: libsql::Error) -> Self {
        Self::StorageUnavailable(error.to_string())
    }
}

impl From<RemoteError> for Error {
    fn from(error: RemoteError) -> Self {
        match error {
            RemoteError::Transient(message) => Self::Transient(message),
            RemoteError::Permanent { status, message } => match status {
                Some(status) => Self::Permanent(format!("{message} (HTTP {status})")),
                None => Self::Permanent(message),
            },
            RemoteError::Unauthorized(message) => Self::Unauthorized(message),
        }
    }
}
