//! Strategy selection, multi-space search and result fusion.

pub mod executor;
pub mod fusion;
pub mod strategy;

pub use executor::{DimensionOutcome, DimensionStatus, MultiVectorSearchExecutor, PerDimensionResults};
pub use fusion::{DimensionDiagnostic, RankedRecord, RankedResult, ResultFusionRanker, ScoreComponents};
pub use strategy::{SearchStrategy, StrategyName, VectorStrategySelector};
