//! Query embedding modules.

pub mod embedder;
pub mod hashing;

pub use embedder::{EmbedFuture, OllamaEmbedder, QueryEmbedder};
pub use hashing::HashingEmbedder;
