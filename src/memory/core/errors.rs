//! Error types for the recall subsystem.

use thiserror::Error;

use crate::memory::core::space::VectorSpace;

/// Recall subsystem error type.
#[derive(Debug, Error)]
pub enum MemoryError {
    /// Invalid configuration or unsupported values.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// A memory record violates the store schema (missing or mis-sized vectors, bad fields).
    #[error("invalid memory record: {0}")]
    InvalidRecord(String),
    /// The owner partition key is malformed; always a caller or configuration bug.
    #[error("invalid owner partition: {0}")]
    InvalidOwnerPartition(String),
    /// The classifier could not score the query and fell back to neutral weights.
    #[error("classification degraded: {0}")]
    ClassificationDegraded(String),
    /// A single dimension search exceeded its timeout.
    #[error("{space} search timed out after {timeout_ms} ms")]
    DimensionSearchTimeout {
        /// Vector space that timed out.
        space: VectorSpace,
        /// Configured timeout.
        timeout_ms: u64,
    },
    /// A single dimension search failed.
    #[error("{space} search failed: {reason}")]
    DimensionSearchFailed {
        /// Vector space that failed.
        space: VectorSpace,
        /// Underlying failure, rendered.
        reason: String,
    },
    /// Every weighted dimension failed or timed out.
    #[error("all weighted dimensions failed: {0}")]
    AllDimensionsFailed(String),
    /// The whole retrieval exceeded its overall deadline.
    #[error("retrieval timed out after {0} ms")]
    RetrievalTimeout(u64),
    /// `SQLite` storage error (sync).
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// `SQLite` storage error (async).
    #[error("tokio-rusqlite error: {0}")]
    TokioSqlite(#[from] tokio_rusqlite::Error),
    /// Embedding error.
    #[error("embedding error: {0}")]
    Embedding(#[from] rig::embeddings::EmbeddingError),
    /// HTTP client error from Rig.
    #[error("http client error: {0}")]
    HttpClient(#[from] rig::http_client::Error),
    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    /// Lexicon pattern failed to compile.
    #[error("regex error: {0}")]
    Regex(#[from] regex::Error),
    /// URL parse error.
    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),
    /// I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience result alias for recall operations.
pub type MemoryResult<T> = Result<T, MemoryError>;
