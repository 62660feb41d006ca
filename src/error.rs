//! Error taxonomy for the transport.

use thiserror::Error;

/// The outcome of any fallible operation in the transport.
///
/// `BadFormat`/`NotImplemented` drop the current packet or frame without
/// tearing down the session; `Internal` aborts the session with a
/// `CONNECTION_CLOSE`; `Closed`/`Conflict` are surfaced directly to the
/// caller.
#[derive(Debug, Error)]
pub enum QuicError {
    #[error("bad format: {0}")]
    BadFormat(&'static str),

    #[error("not implemented: {0}")]
    NotImplemented(&'static str),

    #[error("internal error: {0}")]
    Internal(String),

    #[error("operation attempted on a closed endpoint")]
    Closed,

    #[error("connection id conflict")]
    Conflict,

    #[error("varint value exceeds maximum")]
    VarIntRange,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type QuicResult<T> = Result<T, QuicError>;

impl<T> From<tokio::sync::mpsc::error::SendError<T>> for QuicError {
    fn from(err: tokio::sync::mpsc::error::SendError<T>) -> Self {
        QuicError::Internal(err.to_string())
    }
}

/// Turns a boolean invariant check into a `BadFormat` error at the parse
/// boundary.
#[inline]
pub fn require(cond: bool, msg: &'static str) -> QuicResult<()> {
    if !cond {
        return Err(QuicError::BadFormat(msg));
    }
    Ok(())
}
