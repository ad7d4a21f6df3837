use std::io;

use thiserror::Error;

/// Errors that can be returned when closing a [`Sender`](crate::Sender).
#[derive(Debug, Error)]
pub enum Error {
    /// The underlying output could not be closed cleanly.
    #[error("i/o error while closing sender: {0}")]
    Io(#[from] io::Error),

    /// The background worker panicked before it could drain its buffer.
    #[error("background worker panicked before shutdown completed")]
    WorkerPanicked,

    /// Any other failure reported by a sender implementation.
    #[error("{0}")]
    Other(String),
}
