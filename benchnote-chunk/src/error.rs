//! Error types for the chunking system

/// Result type for chunking operations.
pub type Result<T> = std::result::Result<T, ChunkError>;

/// Error type for chunk configuration and splitting failures.
///
/// Configuration problems surface at [`Chunker::new`](crate::Chunker::new)
/// time rather than during splitting, so a successfully constructed chunker
/// can only fail on empty input.
#[derive(Debug, thiserror::Error)]
pub enum ChunkError {
    /// Input text was empty (or whitespace-only) after trimming.
    #[error("input text is empty after trimming whitespace")]
    EmptyInput,

    /// Chunking parameters are out of range or inconsistent.
    #[error("invalid chunking configuration: {message}")]
    InvalidConfig { message: String },

    /// The configured tokenizer identifier does not name a known encoding.
    #[error("unknown tokenizer: {name}")]
    UnknownTokenizer { name: String },
}

impl ChunkError {
    /// Create an invalid configuration error with a custom message.
    pub fn invalid_config<S: Into<String>>(message: S) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }
}
