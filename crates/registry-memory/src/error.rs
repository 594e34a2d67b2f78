//! Error types for the in-memory registry.

use roster_registry::{RegistryError, RegistryErrorKind};
use thiserror::Error;

/// Error type for the in-memory registry.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum Error {
    /// The backend could not be reached.
    #[error("Registry unavailable: {0}")]
    Unavailable(String),

    /// The backend did not answer in time.
    #[error("Registry request timed out")]
    Timeout,

    /// The backend answered with a server-side failure.
    #[error("Registry server error: {0}")]
    Server(String),

    /// The request was rejected as malformed.
    #[error("Registry rejected request: {0}")]
    Rejected(String),

    /// The request was not authorized.
    #[error("Registry denied access")]
    Unauthorized,

    /// The referenced service instance does not exist.
    #[error("Service not found: {0}")]
    NotFound(String),
}

impl RegistryError for Error {
    fn kind(&self) -> RegistryErrorKind {
        match self {
            Self::Unavailable(_) | Self::Timeout | Self::Server(_) => RegistryErrorKind::Transient,
            Self::Rejected(_) | Self::Unauthorized | Self::NotFound(_) => {
                RegistryErrorKind::Terminal
            }
        }
    }
}
