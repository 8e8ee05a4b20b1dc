//! Network error types

use std::io;

use crate::protocol::ApiError;

/// Network result type
pub type Result<T> = std::result::Result<T, Error>;

/// Network errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Protocol error: {0}")]
    Protocol(String),

    /// The server answered with a typed error
    #[error("Request failed: {0}")]
    Api(#[from] ApiError),

    #[error("Reply {got} does not answer request {expected}")]
    ReplyMismatch { expected: u64, got: u64 },
}
