//! Error types shared by the decoder and the record layer.

use thiserror::Error;

use crate::decoder::MalformedLine;

/// A result type using `CoreError`.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Errors produced while turning wire data into records.
///
/// None of these are fatal to a session: the decoder reports them per line
/// and keeps going.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A line could not be parsed as JSON.
    #[error(transparent)]
    Malformed(#[from] MalformedLine),

    /// A JSON value was parsed but is not a record object.
    #[error("not a record: {0}")]
    NotARecord(String),
}
