//! Query embedding for each vector space, via Rig + Ollama.

use std::future::Future;
use std::pin::Pin;

use reqwest::Client as ReqwestClient;
use rig::client::{EmbeddingsClient, Nothing};
use rig::embeddings::EmbeddingModel;
use rig::providers::ollama;

use crate::memory::core::config::EmbeddingConfig;
use crate::memory::core::errors::{MemoryError, MemoryResult};
use crate::memory::core::space::VectorSpace;

/// Boxed future type for embedder operations.
pub type EmbedFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Turns query text into a vector comparable with one space's stored embeddings.
pub trait QueryEmbedder: Send + Sync {
    /// Embed `text` for `space`.
    ///
    /// # Errors
    /// Returns an error if the embedding request fails.
    fn embed_query<'a>(
        &'a self,
        space: VectorSpace,
        text: &'a str,
    ) -> EmbedFuture<'a, MemoryResult<Vec<f32>>>;

    /// Return embedding dimensionality.
    fn ndims(&self) -> usize;
}

type OllamaEmbeddingModel = ollama::EmbeddingModel<ReqwestClient>;

/// Ollama embedder with one model per vector space.
#[derive(Clone)]
pub struct OllamaEmbedder {
    content: OllamaEmbeddingModel,
    emotion: OllamaEmbeddingModel,
    semantic: OllamaEmbeddingModel,
    emotion_prefix: String,
    semantic_prefix: String,
    ndims: usize,
}

impl OllamaEmbedder {
    /// Create a new Ollama embedder from config.
    ///
    /// # Errors
    /// Returns an error if the base URL is invalid or the client cannot be built.
    pub fn new(config: &EmbeddingConfig) -> MemoryResult<Self> {
        let builder = ollama::Client::<ReqwestClient>::builder().api_key(Nothing);
        let builder = if let Some(base_url) = &config.base_url {
            builder.base_url(base_url)
        } else {
            builder
        };
        let client = builder.build().map_err(MemoryError::from)?;
        Ok(Self {
            content: client.embedding_model_with_ndims(config.content_model.clone(), config.ndims),
            emotion: client.embedding_model_with_ndims(config.emotion_model.clone(), config.ndims),
            semantic: client
                .embedding_model_with_ndims(config.semantic_model.clone(), config.ndims),
            emotion_prefix: config.emotion_prefix.clone(),
            semantic_prefix: config.semantic_prefix.clone(),
            ndims: config.ndims,
        })
    }

    fn model_and_input(&self, space: VectorSpace, text: &str) -> (&OllamaEmbeddingModel, String) {
        match space {
            VectorSpace::Content => (&self.content, text.to_string()),
            VectorSpace::Emotion => (&self.emotion, format!("{}{text}", self.emotion_prefix)),
            VectorSpace::Semantic => (&self.semantic, format!("{}{text}", self.semantic_prefix)),
        }
    }
}

impl QueryEmbedder for OllamaEmbedder {
    fn embed_query<'a>(
        &'a self,
        space: VectorSpace,
        text: &'a str,
    ) -> EmbedFuture<'a, MemoryResult<Vec<f32>>> {
        let (model, input) = self.model_and_input(space, text);
        Box::pin(async move {
            let embedding = model
                .embed_text(&input)
                .await
                .map_err(MemoryError::Embedding)?;
            #[allow(clippy::cast_possible_truncation)] // stored vectors are f32
            let vector = embedding.vec.iter().map(|v| *v as f32).collect();
            Ok(vector)
        })
    }

    fn ndims(&self) -> usize {
        self.ndims
    }
}
