//! Error types for the tally wire protocol

use thiserror::Error;

/// Result type alias for protocol operations
pub type Result<T> = std::result::Result<T, Error>;

/// Protocol error types
#[derive(Error, Debug)]
pub enum Error {
    /// Payload is not a JSON object of a known shape
    #[error("decode error: {0}")]
    DecodeError(String),

    /// Message could not be serialized
    #[error("encode error: {0}")]
    EncodeError(String),

    /// A required field is absent or empty
    #[error("missing field: {0}")]
    MissingField(&'static str),

    /// A field is present but carries an unusable value
    #[error("invalid {field}: {reason}")]
    InvalidField { field: &'static str, reason: String },

    /// Hub address text could not be parsed
    #[error("invalid hub address: {0}")]
    InvalidAddress(String),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::DecodeError(e.to_string())
    }
}
