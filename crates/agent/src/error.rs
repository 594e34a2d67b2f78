use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Could not bind the health listener.
    #[error("failed to bind health listener: {0}")]
    Bind(#[source] std::io::Error),

    /// Registration lifecycle error.
    #[error(transparent)]
    Registration(#[from] roster_registration::Error),

    /// The health server exited with an error.
    #[error("health server error: {0}")]
    Server(#[source] std::io::Error),

    /// Could not set global default subscriber.
    #[error("could not set global default subscriber: {0}")]
    SetTracing(#[from] tracing::dispatcher::SetGlobalDefaultError),
}
