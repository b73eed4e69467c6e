//! Error types for the history decoder.

use thiserror::Error;

/// Result type alias for decoder operations
pub type Result<T> = std::result::Result<T, HistoryError>;

/// Errors that can occur while decoding a transaction history.
///
/// The first three variants are the pipeline's failure kinds. They let a caller
/// tell a bad response (re-fetch) from a key problem (fix configuration) from a
/// changed service contract.
#[derive(Error, Debug)]
pub enum HistoryError {
    /// Envelope too short to hold an IV, or the response carried no envelope
    #[error("Malformed envelope: {0}")]
    MalformedEnvelope(EnvelopeDefect),

    /// Wrong key, corrupted ciphertext or bad padding
    #[error("Decryption failed: {0}")]
    DecryptionFailure(String),

    /// Plaintext recovered but not shaped like a history payload
    #[error("Schema violation: {0}")]
    SchemaViolation(String),

    /// No decryption key configured
    #[error("Missing decryption key. Set ECARD_AES_KEY or ECARD_AES_KEY_HEX")]
    MissingKey,

    /// Configured key has the wrong length or encoding
    #[error("Invalid decryption key: {0}")]
    InvalidKey(String),

    /// Failed to read input or write output
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV writing error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Missing input file argument
    #[error("Missing input file argument. Usage: ecard-history <response.json | ->")]
    MissingArgument,
}

/// What was wrong with an envelope or the response that should carry it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EnvelopeDefect {
    /// Fewer characters than the IV needs
    #[error("expected at least 16 characters, got {0}")]
    TooShort(usize),

    /// The response body had no string `data` field
    #[error("response has no envelope ({0})")]
    NoEnvelope(String),
}
