//! Error types shared by every framelink primitive

use std::io;
use thiserror::Error;

/// Result type for framelink operations
pub type Result<T> = std::result::Result<T, NetError>;

/// The closed set of errors surfaced by framelink handlers.
///
/// Success is expressed as `Ok(..)`; everything else is one of the variants
/// below. The library never retries on its own and never lets an error cross
/// an API boundary as a panic: user codec failures are caught at the codec
/// seam and mapped to [`NetError::Encoding`] / [`NetError::Decoding`].
#[derive(Error, Debug)]
pub enum NetError {
    /// The underlying transport reported an error (connection refused,
    /// short send, reset by peer, ...). Carries the low-level code when the
    /// transport produced one.
    #[error("transport operation failed")]
    FailedOperation(#[source] Option<io::Error>),

    /// The operation was cancelled or timed out: its I/O handle was closed
    /// before the operation could complete.
    #[error("operation aborted")]
    Aborted,

    /// The user-supplied encoder rejected the outgoing message.
    #[error("message encoding failed")]
    Encoding,

    /// The user-supplied decoder rejected the incoming payload.
    #[error("message decoding failed")]
    Decoding,

    /// Frame header unreadable, payload truncated, or payload larger than
    /// the endpoint's configured capacity.
    #[error("invalid frame")]
    InvalidFrame,
}

impl NetError {
    /// Create a transport failure without an underlying code (e.g. a short
    /// write the transport itself did not flag).
    pub fn failed() -> Self {
        NetError::FailedOperation(None)
    }

    /// True if the operation was cancelled or timed out.
    pub fn is_aborted(&self) -> bool {
        matches!(self, NetError::Aborted)
    }

    /// True for malformed or oversized frames.
    pub fn is_invalid_frame(&self) -> bool {
        matches!(self, NetError::InvalidFrame)
    }

    /// True if the underlying transport refused or dropped the connection.
    pub fn is_connection_error(&self) -> bool {
        match self {
            NetError::FailedOperation(Some(e)) => matches!(
                e.kind(),
                io::ErrorKind::BrokenPipe
                    | io::ErrorKind::ConnectionAborted
                    | io::ErrorKind::ConnectionRefused
                    | io::ErrorKind::ConnectionReset
                    | io::ErrorKind::UnexpectedEof
            ),
            _ => false,
        }
    }

    /// The transport code attached to a [`NetError::FailedOperation`], if any.
    pub fn io_cause(&self) -> Option<&io::Error> {
        match self {
            NetError::FailedOperation(cause) => cause.as_ref(),
            _ => None,
        }
    }
}

impl From<io::Error> for NetError {
    fn from(e: io::Error) -> Self {
        NetError::FailedOperation(Some(e))
    }
}
