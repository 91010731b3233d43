use thiserror::Error;

/// Why an event was not accepted by [`crate::Hub::submit`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SubmitError {
    /// The inbound queue is full. Transient: the hub is behind or its pending
    /// buffer is at capacity until the next flush.
    #[error("hub inbound queue is full")]
    Full,

    /// The hub task has stopped.
    #[error("hub is closed")]
    Closed,
}
