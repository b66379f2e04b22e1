use std::io;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, CodecError>;

/// Errors surfaced by the decoding pipeline and the relation collector.
///
/// Every error aborts the pipeline; decode errors are deterministic, so
/// there are no retries.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The input ended in the middle of a frame, header or payload.
    #[error("truncated input: {0}")]
    Truncated(&'static str),

    /// The input violates the PBF container or block invariants.
    #[error("corrupt data: {0}")]
    Corrupt(String),

    /// The input requires a capability this implementation does not have.
    #[error("unsupported: {0}")]
    Unsupported(String),

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl From<prost::DecodeError> for CodecError {
    fn from(value: prost::DecodeError) -> Self {
        CodecError::Corrupt(value.to_string())
    }
}
