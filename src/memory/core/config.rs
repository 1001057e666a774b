//! Configuration for the recall engine.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::memory::core::errors::{MemoryError, MemoryResult};

/// Top-level configuration for recall.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RecallConfig {
    /// Query classification settings.
    pub classifier: ClassifierConfig,
    /// Multi-vector search settings.
    pub search: SearchConfig,
    /// Fusion and boost settings.
    pub fusion: FusionConfig,
    /// Query embedding model settings.
    pub embedding: EmbeddingConfig,
    /// Storage settings.
    pub storage: StorageConfig,
}

impl RecallConfig {
    /// Parse and validate a JSON configuration string.
    ///
    /// # Errors
    /// Returns an error if the JSON is malformed or any value is out of range.
    pub fn from_json_str(raw: &str) -> MemoryResult<Self> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON configuration file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or fails validation.
    pub fn from_json_file(path: impl AsRef<Path>) -> MemoryResult<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    /// Validate configuration invariants.
    ///
    /// # Errors
    /// Returns an error if any values are out of range or invalid.
    pub fn validate(&self) -> MemoryResult<()> {
        self.classifier.validate()?;
        self.search.validate()?;
        self.fusion.validate()?;
        self.embedding.validate()?;

        if self.storage.table.is_empty()
            || !self
                .storage
                .table
                .chars()
                .all(|ch| ch.is_ascii_alphanumeric() || ch == '_')
        {
            return Err(MemoryError::InvalidConfig(
                "storage.table must be a non-empty [A-Za-z0-9_] identifier".to_string(),
            ));
        }

        Ok(())
    }
}

fn unit_interval(name: &str, value: f32) -> MemoryResult<()> {
    if value.is_finite() && (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(MemoryError::InvalidConfig(format!(
            "{name} must be in 0..=1, got {value}"
        )))
    }
}

/// Classifier thresholds. The cue lexicon itself lives in `ClassifierLexicon`.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Minimum confidence for an axis to count as dominant.
    pub dominance_threshold: f32,
    /// Share of the recent-context signal blended into the query's scores.
    pub context_weight: f32,
    /// Residual content signal granted when no other vector axis speaks up.
    pub content_residual: f32,
    /// Queries longer than this are truncated before scoring.
    pub max_query_chars: usize,
    /// Optional JSON lexicon replacing the built-in cue table.
    pub lexicon_path: Option<PathBuf>,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            dominance_threshold: 0.3,
            context_weight: 0.25,
            content_residual: 0.25,
            max_query_chars: 2000,
            lexicon_path: None,
        }
    }
}

impl ClassifierConfig {
    fn validate(&self) -> MemoryResult<()> {
        unit_interval("classifier.dominance_threshold", self.dominance_threshold)?;
        unit_interval("classifier.context_weight", self.context_weight)?;
        unit_interval("classifier.content_residual", self.content_residual)?;
        if self.dominance_threshold == 0.0 {
            return Err(MemoryError::InvalidConfig(
                "classifier.dominance_threshold must be > 0".to_string(),
            ));
        }
        if self.max_query_chars == 0 {
            return Err(MemoryError::InvalidConfig(
                "classifier.max_query_chars must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Multi-vector search settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Per-dimension timeout in milliseconds.
    pub dimension_timeout_ms: u64,
    /// Candidates fetched per dimension as a multiple of the requested limit.
    pub candidate_multiplier: usize,
    /// Lower bound on per-dimension top-K.
    pub min_top_k: usize,
    /// Upper bound on per-dimension top-K.
    pub max_top_k: usize,
    /// Optional deadline for a whole `retrieve` call.
    pub overall_timeout_ms: Option<u64>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            dimension_timeout_ms: 2000,
            candidate_multiplier: 3,
            min_top_k: 10,
            max_top_k: 200,
            overall_timeout_ms: None,
        }
    }
}

impl SearchConfig {
    fn validate(&self) -> MemoryResult<()> {
        if self.dimension_timeout_ms == 0 {
            return Err(MemoryError::InvalidConfig(
                "search.dimension_timeout_ms must be > 0".to_string(),
            ));
        }
        if self.candidate_multiplier == 0 {
            return Err(MemoryError::InvalidConfig(
                "search.candidate_multiplier must be > 0".to_string(),
            ));
        }
        if self.min_top_k == 0 || self.max_top_k < self.min_top_k {
            return Err(MemoryError::InvalidConfig(
                "search.min_top_k must be > 0 and <= search.max_top_k".to_string(),
            ));
        }
        if self.overall_timeout_ms == Some(0) {
            return Err(MemoryError::InvalidConfig(
                "search.overall_timeout_ms must be > 0 when set".to_string(),
            ));
        }
        Ok(())
    }

    /// Per-dimension top-K for a requested result limit.
    #[must_use]
    pub fn top_k_for(&self, limit: usize) -> usize {
        limit
            .saturating_mul(self.candidate_multiplier)
            .clamp(self.min_top_k, self.max_top_k)
    }
}

/// Bounded secondary boosts applied after weighted fusion.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct FusionConfig {
    /// Maximum relative lift from recency (0.05 = at most +5%).
    pub recency_boost_max: f64,
    /// Half-life in seconds for recency decay.
    pub recency_half_life_seconds: u64,
    /// Maximum relative lift from importance and intensity.
    pub importance_boost_max: f64,
    /// Share of the importance signal taken from emotional intensity.
    pub intensity_share: f64,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            recency_boost_max: 0.05,
            recency_half_life_seconds: 60 * 60 * 24 * 7,
            importance_boost_max: 0.05,
            intensity_share: 0.5,
        }
    }
}

impl FusionConfig {
    /// No boosts at all; fused scores are the plain weighted sums.
    #[must_use]
    pub const fn unboosted() -> Self {
        Self {
            recency_boost_max: 0.0,
            recency_half_life_seconds: 60 * 60 * 24 * 7,
            importance_boost_max: 0.0,
            intensity_share: 0.5,
        }
    }

    fn validate(&self) -> MemoryResult<()> {
        for (name, value) in [
            ("fusion.recency_boost_max", self.recency_boost_max),
            ("fusion.importance_boost_max", self.importance_boost_max),
            ("fusion.intensity_share", self.intensity_share),
        ] {
            if !(value.is_finite() && (0.0..=1.0).contains(&value)) {
                return Err(MemoryError::InvalidConfig(format!(
                    "{name} must be in 0..=1, got {value}"
                )));
            }
        }
        if self.recency_half_life_seconds == 0 {
            return Err(MemoryError::InvalidConfig(
                "fusion.recency_half_life_seconds must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Query embedding model settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Ollama model for the content space.
    pub content_model: String,
    /// Ollama model for the emotion space.
    pub emotion_model: String,
    /// Ollama model for the semantic space.
    pub semantic_model: String,
    /// Embedding vector dimensions (frozen for a store's lifetime).
    pub ndims: usize,
    /// Optional custom base URL.
    pub base_url: Option<String>,
    /// Instruction prefix prepended to queries in the emotion space.
    pub emotion_prefix: String,
    /// Instruction prefix prepended to queries in the semantic space.
    pub semantic_prefix: String,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            content_model: "nomic-embed-text".to_string(),
            emotion_model: "nomic-embed-text".to_string(),
            semantic_model: "nomic-embed-text".to_string(),
            ndims: 768,
            base_url: None,
            emotion_prefix: "emotional tone: ".to_string(),
            semantic_prefix: "underlying meaning: ".to_string(),
        }
    }
}

impl EmbeddingConfig {
    fn validate(&self) -> MemoryResult<()> {
        if self.ndims == 0 {
            return Err(MemoryError::InvalidConfig(
                "embedding.ndims must be > 0".to_string(),
            ));
        }
        for (name, model) in [
            ("embedding.content_model", &self.content_model),
            ("embedding.emotion_model", &self.emotion_model),
            ("embedding.semantic_model", &self.semantic_model),
        ] {
            if model.trim().is_empty() {
                return Err(MemoryError::InvalidConfig(format!("{name} must be set")));
            }
        }
        if let Some(base_url) = &self.base_url {
            Url::parse(base_url)?;
        }
        Ok(())
    }
}

/// Storage configuration for the `SQLite` record store.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// `SQLite` database path (`:memory:` for an ephemeral store).
    pub sqlite_path: PathBuf,
    /// Record table name.
    pub table: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            sqlite_path: PathBuf::from("memory.sqlite"),
            table: "memory_records".to_string(),
        }
    }
}
