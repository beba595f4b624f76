//! Error types for memory operations.

/// Errors returned by the vector store and helpers.
#[derive(Debug, thiserror::Error)]
pub enum MemoryError {
    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// Serialization error.
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    /// Regex compilation error.
    #[error("regex error: {0}")]
    Regex(String),
    /// Snapshot exists but cannot be used to rebuild the index.
    #[error("memory store corrupt: {0}")]
    StoreCorrupt(String),
    /// Embedding width differs from the index dimensionality.
    #[error("embedding dimension mismatch (expected={expected}, actual={actual})")]
    DimensionMismatch { expected: usize, actual: usize },
    /// Embedding contains values the index cannot rank.
    #[error("invalid embedding: {0}")]
    InvalidEmbedding(String),
    /// Embedding provider failed or timed out.
    #[error("embedding error: {0}")]
    Embedding(String),
}
