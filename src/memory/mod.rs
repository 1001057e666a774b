//! Recall subsystem for conversational memory.
//!
//! Organized into:
//! - `core`: configuration, errors, identifiers, records and vector spaces
//! - `classify`: cue lexicon, query classifier and temporal override detection
//! - `embedding`: per-space query embedders (Ollama, offline hashing)
//! - `storage`: store contracts plus in-memory and `SQLite` backends
//! - `retrieval`: strategy selection, concurrent search and result fusion
//! - `engine`: orchestration of one retrieval call
//! - `adapters`: tracing setup

pub mod adapters;
pub mod classify;
pub mod core;
pub mod embedding;
pub mod engine;
pub mod retrieval;
pub mod storage;

// Re-export commonly used types for convenience
pub use adapters::init_tracing;
pub use classify::{
    AxisScores, ClassifierLexicon, CompiledLexicon, CueRule, QueryAxis, QueryCategory,
    QueryClassification, QueryClassifier, TemporalIntent, TemporalPatterns, TemporalQueryDetector,
};
pub use core::{
    ClassifierConfig, EmbeddingConfig, EmbeddingSet, EmotionMetadata, FusionConfig, MemoryError,
    MemoryRecord, MemoryResult, OwnerKey, RecallConfig, RecordId, SearchConfig, StorageConfig,
    VectorSpace,
};
pub use embedding::{EmbedFuture, HashingEmbedder, OllamaEmbedder, QueryEmbedder};
pub use engine::{RecallBackends, RetrievalEngine};
pub use retrieval::{
    DimensionDiagnostic, DimensionOutcome, DimensionStatus, MultiVectorSearchExecutor,
    PerDimensionResults, RankedRecord, RankedResult, ResultFusionRanker, ScoreComponents,
    SearchStrategy, StrategyName, VectorStrategySelector,
};
pub use storage::{
    InMemoryMemoryStore, MemoryRecordLookup, SpaceHit, SqliteMemoryStore, StoreFuture, TimeHit,
    TimeOrder, VectorStore, cosine_similarity, init_sqlite_vec_extension,
};
