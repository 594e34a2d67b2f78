use roster_bootable::BootableError;
use thiserror::Error;

/// The result type for this crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in this crate.
#[derive(Debug, Error)]
pub enum Error {
    /// The lifecycle controller was started twice.
    #[error("lifecycle already started")]
    AlreadyStarted,

    /// The operation was cancelled before it could complete.
    #[error("operation cancelled")]
    Cancelled,

    /// Invalid or missing configuration.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Deregistration failed. Never fatal.
    #[error("deregistration failed: {0}")]
    Deregistration(String),

    /// Every allowed registration attempt failed with a transient error.
    #[error("registration failed after {attempts} attempts: {last_cause}")]
    ExhaustedRegistration {
        /// Attempts made.
        attempts: u32,
        /// Cause of the final failure.
        last_cause: String,
    },

    /// The registry rejected the registration in a way retrying cannot fix.
    #[error("registration rejected on attempt {attempt}: {cause}")]
    TerminalRegistry {
        /// Attempt on which the rejection happened.
        attempt: u32,
        /// Rejection reason.
        cause: String,
    },
}

impl BootableError for Error {}
