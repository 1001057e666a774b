//! Query classification and multi-vector fusion retrieval for conversational memory.

// Hard bans
#![deny(unsafe_code)] // only the sqlite-vec loader opts out, locally
#![deny(missing_docs)]
#![deny(non_camel_case_types)]
#![deny(non_snake_case)]
#![deny(non_upper_case_globals)]
#![deny(nonstandard_style)]
#![deny(unused_must_use)]
#![forbid(unsafe_op_in_unsafe_fn)]
#![warn(unused_imports)]
#![warn(unused_variables)]

// Clippy discipline
#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![deny(clippy::nursery)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(clippy::print_stdout)]
#![deny(clippy::todo)]
#![deny(clippy::unimplemented)]
#![deny(clippy::unwrap_in_result)]
#![deny(clippy::module_inception)]
#![deny(clippy::redundant_clone)]
#![deny(clippy::shadow_unrelated)]
#![deny(clippy::too_many_arguments)]
#![deny(clippy::cognitive_complexity)]
#![deny(overflowing_literals)]
#![allow(clippy::module_name_repetitions)]

/// Memory recall: classification, multi-vector search, fusion and the stores behind them.
pub mod memory;

pub use memory::{
    ClassifierLexicon, HashingEmbedder, InMemoryMemoryStore, MemoryError, MemoryRecord,
    MemoryRecordLookup, MemoryResult, OwnerKey, QueryClassification, QueryClassifier,
    QueryEmbedder, RankedResult, RecallBackends, RecallConfig, RecordId, RetrievalEngine,
    SearchStrategy, SqliteMemoryStore, StrategyName, TemporalIntent, TemporalQueryDetector,
    VectorSpace, VectorStore, init_tracing,
};
