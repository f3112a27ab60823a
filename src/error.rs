//! Errors raised while synchronizing folder lists, share attributes and object history.

use std::result;

use thiserror::Error;

use crate::types::FolderType;

/// A convenience wrapper around `Result` for `kolab_storage::Error`.
pub type Result<T> = result::Result<T, Error>;

/// A set of errors that can occur in the storage layer.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The backend failed to list folders or to read or write an annotation.
    #[error(transparent)]
    Backend(#[from] BackendError),
    /// A caller asked for something the folder semantics forbid.
    #[error(transparent)]
    Policy(#[from] PolicyViolation),
    /// A folder could not be attributed to an application or share.
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    /// A cached value could not be converted to or from JSON.
    #[error("unable to (de)serialize cached data: {0}")]
    Serialization(#[from] serde_json::Error),
    /// A share parameter blob was not valid base64.
    #[error("invalid share parameter encoding: {0}")]
    Encoding(#[from] base64::DecodeError),
}

impl Error {
    /// Whether this error was raised by the backend rather than by this layer.
    pub fn is_backend(&self) -> bool {
        matches!(self, Error::Backend(_))
    }
}

/// Failures reported by the backend driver.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum BackendError {
    /// The named folder does not exist on the backend.
    #[error("folder {0} does not exist")]
    MissingFolder(String),
    /// The named folder already exists on the backend.
    #[error("folder {0} already exists")]
    FolderExists(String),
    /// The backend refused or failed the request.
    #[error("backend request {operation} failed: {reason}")]
    Failed {
        /// The driver operation that failed.
        operation: String,
        /// Message reported by the backend.
        reason: String,
    },
    /// An `io::Error` that occurred while talking to the backend.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Operations rejected because they would break folder semantics.
///
/// The cache is never modified when one of these is returned.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PolicyViolation {
    /// Only folders in the personal namespace may become a default folder.
    #[error("folder {0} is outside the personal namespace and cannot be a default folder")]
    NotPersonal(String),
    /// A default folder needs a folder type annotation.
    #[error("folder {0} has no folder type and cannot be a default folder")]
    Untyped(String),
}

/// Missing mappings that prevent attributing objects to a history scope.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigurationError {
    /// No application is configured for the folder type.
    #[error("no application handles folders of type {0}")]
    NoApplication(FolderType),
    /// The folder parameters carry no share name.
    #[error("folder {0} has no share name")]
    NoShareName(String),
}
