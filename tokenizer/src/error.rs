//! Error types for training, encoding, decoding and persistence.

use thiserror::Error;

/// Errors surfaced by the tokenizer engine.
///
/// Each failure kind is a separate variant so callers can branch on it.
/// Only vocabulary parsing recovers locally (bad lines are skipped with a
/// warning); every other variant aborts the operation that raised it.
#[derive(Error, Debug)]
pub enum TokenizerError {
    /// A caller-supplied argument is out of its valid range.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A byte string has no ID in the vocabulary.
    #[error("unknown symbol: {0:02X?}")]
    UnknownSymbol(Vec<u8>),

    /// A symbol ID is outside `0..len`.
    #[error("invalid symbol id {id} (vocabulary has {len} symbols)")]
    InvalidId { id: u32, len: usize },

    /// Decoded bytes are not well-formed UTF-8.
    #[error("decoded bytes are not valid UTF-8: {0}")]
    InvalidEncoding(#[from] std::str::Utf8Error),

    /// The underlying source or sink failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The merge-rule snapshot could not be written or parsed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, TokenizerError>;
