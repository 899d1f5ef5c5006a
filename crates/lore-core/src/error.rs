use core::result::Result as CoreResult;
use std::io::Error as IoError;

use thiserror::Error;
use toml::de::Error as TomlError;

/// Result type for retrieval operations.
pub type Result<T> = CoreResult<T, Error>;

/// Errors that can occur anywhere in the retrieval pipeline.
#[derive(Debug, Error)]
pub enum Error {
    /// An I/O operation failed.
    #[error("IO error: {0}")]
    Io(#[from] IoError),

    /// TOML deserialization failed.
    #[error("TOML deserialization error: {0}")]
    Toml(#[from] TomlError),

    /// Configuration is invalid or missing.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Content handed to a chunker could not be parsed.
    #[error("Invalid content: {0}")]
    InvalidContent(String),

    /// The embedding provider was unreachable or answered with a failure.
    #[error("Provider error: {0}")]
    Provider(String),

    /// A persisted snapshot is truncated or malformed.
    #[error("Corrupted vector store: {0}")]
    CorruptedStore(String),

    /// An embedding does not have the dimension the index was built for.
    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Dimension configured on the index
        expected: usize,
        /// Dimension of the rejected vector
        actual: usize,
    },

    /// A value cannot be represented in the snapshot format.
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// A general error not covered by other variants.
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Determines whether this error may succeed if retried by the caller.
    ///
    /// Nothing inside the pipeline retries; this only classifies the failure.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Provider(_))
    }
}
