//! Error types for the binding runtime.

use thiserror::Error;

/// Errors raised while binding, updating or persisting.
#[derive(Error, Debug)]
pub enum Error {
    /// A property key outside the known schema was set on a component.
    /// This is a programming error in the generated observer code.
    #[error("Unknown property '{0}' for Component")]
    UnknownProperty(String),

    /// The calling thread has no mounted runtime.
    #[error("Runtime is not mounted on this thread")]
    NotMounted,

    /// A runtime is already mounted on this thread.
    #[error("Runtime is already mounted on this thread")]
    AlreadyMounted,

    /// The view handle no longer refers to a bound view.
    #[error("Unknown view: {0}")]
    UnknownView(String),

    /// Reading or writing persisted state failed.
    #[error("Persistence error: {0}")]
    Persistence(#[from] std::io::Error),

    /// State could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A worker or driver thread could not be started.
    #[error("Failed to spawn thread: {0}")]
    Spawn(#[source] std::io::Error),

    /// The UI thread went away while a request was in flight.
    #[error("Channel error: {0}")]
    Channel(String),
}

/// Result type for runtime operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Convert flume send errors to our error type.
impl<T> From<flume::SendError<T>> for Error {
    fn from(err: flume::SendError<T>) -> Self {
        Error::Channel(format!("send failed: {}", err))
    }
}

impl From<flume::RecvError> for Error {
    fn from(err: flume::RecvError) -> Self {
        Error::Channel(format!("receive failed: {}", err))
    }
}
