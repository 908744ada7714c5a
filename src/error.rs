//! Error types for queue hand-offs, packet drops and router startup.

use thiserror::Error;

/// Failed push into a [`BoundedQueue`](crate::queue::BoundedQueue).
///
/// The rejected item is handed back so the caller keeps ownership and can release it.
#[derive(Debug, Error)]
pub enum QueueError<T> {
    #[error("queue is full")]
    Full(T),
}

impl<T> QueueError<T> {
    /// Recover the item that could not be enqueued.
    pub fn into_inner(self) -> T {
        match self {
            QueueError::Full(item) => item,
        }
    }
}

/// Reason a packet left the pipeline without being handed to an output port.
///
/// Every variant maps to exactly one rejection counter in
/// [`RouterCounters`](crate::metrics::RouterCounters).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum DropReason {
    #[error("source address in a rejected band")]
    InvalidSource,
    #[error("classifier inbox full")]
    InputFull,
    #[error("priority lane full")]
    ClassifierFull,
    #[error("output port inbox full")]
    OutputFull,
}

/// Errors raised while configuring or starting the router.
#[derive(Debug, Error)]
pub enum RouterError {
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("failed to read configuration file: {0}")]
    ConfigIo(#[from] std::io::Error),
    #[error("failed to parse configuration file: {0}")]
    ConfigParse(#[from] serde_json::Error),
    #[error("failed to spawn worker {name}: {source}")]
    Spawn {
        name: String,
        #[source]
        source: std::io::Error,
    },
    #[error("router already started")]
    AlreadyStarted,
}
