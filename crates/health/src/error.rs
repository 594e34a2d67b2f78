use thiserror::Error;

/// Faults raised while gathering process vitals.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum VitalsError {
    /// The current process id could not be determined.
    #[error("current process id unavailable: {0}")]
    ProcessUnknown(&'static str),

    /// The operating system returned no data for this process.
    #[error("no process information for pid {0}")]
    ProcessMissing(u32),

    /// Any other collection fault.
    #[error("{0}")]
    Other(String),
}
