//! Core recall types and identifiers.

pub mod config;
pub mod errors;
pub mod ids;
pub mod record;
pub mod space;

pub use config::{
    ClassifierConfig, EmbeddingConfig, FusionConfig, RecallConfig, SearchConfig, StorageConfig,
};
pub use errors::{MemoryError, MemoryResult};
pub use ids::{OwnerKey, RecordId};
pub use record::{EmbeddingSet, EmotionMetadata, MemoryRecord};
pub use space::VectorSpace;
