//! Recall engine orchestration.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::time::timeout;
use tracing::{debug, info};

use crate::memory::classify::classifier::QueryClassifier;
use crate::memory::classify::lexicon::{ClassifierLexicon, CompiledLexicon};
use crate::memory::classify::temporal::{TemporalIntent, TemporalQueryDetector};
use crate::memory::core::config::RecallConfig;
use crate::memory::core::errors::{MemoryError, MemoryResult};
use crate::memory::core::ids::{OwnerKey, RecordId};
use crate::memory::core::record::MemoryRecord;
use crate::memory::embedding::embedder::{OllamaEmbedder, QueryEmbedder};
use crate::memory::retrieval::executor::{MultiVectorSearchExecutor, PerDimensionResults};
use crate::memory::retrieval::fusion::{RankedResult, ResultFusionRanker};
use crate::memory::retrieval::strategy::VectorStrategySelector;
use crate::memory::storage::memory_store::InMemoryMemoryStore;
use crate::memory::storage::sqlite_store::SqliteMemoryStore;
use crate::memory::storage::sqlite_vec_loader::init_sqlite_vec_extension;
use crate::memory::storage::vector_store::{MemoryRecordLookup, VectorStore};

/// Backend dependencies for the recall engine.
pub struct RecallBackends {
    /// Similarity and time-ordered search.
    pub store: Arc<dyn VectorStore>,
    /// Record metadata lookups.
    pub lookup: Arc<dyn MemoryRecordLookup>,
    /// Per-space query embedder.
    pub embedder: Arc<dyn QueryEmbedder>,
}

impl RecallBackends {
    /// Build `SQLite` + Ollama backends from config.
    ///
    /// # Errors
    /// Returns an error if the store or embedder cannot be initialized.
    pub async fn sqlite(config: &RecallConfig) -> MemoryResult<Self> {
        init_sqlite_vec_extension();
        let store = Arc::new(SqliteMemoryStore::new(config).await?);
        let embedder = Arc::new(OllamaEmbedder::new(&config.embedding)?);
        Ok(Self {
            store: store.clone(),
            lookup: store,
            embedder,
        })
    }

    /// Serve both store roles from one in-memory store.
    ///
    /// # Errors
    /// Returns `InvalidConfig` if the store already holds vectors of another
    /// size than the embedder produces.
    pub fn in_memory(
        store: Arc<InMemoryMemoryStore>,
        embedder: Arc<dyn QueryEmbedder>,
    ) -> MemoryResult<Self> {
        if let Some(stored) = store.ndims()
            && stored != embedder.ndims()
        {
            return Err(MemoryError::InvalidConfig(format!(
                "embedder produces {} dims, store schema is {stored}",
                embedder.ndims()
            )));
        }
        Ok(Self {
            store: store.clone(),
            lookup: store,
            embedder,
        })
    }
}

/// Stateless retrieval pipeline: temporal override, classification, strategy
/// selection, concurrent search and fusion.
pub struct RetrievalEngine {
    config: RecallConfig,
    store: Arc<dyn VectorStore>,
    lookup: Arc<dyn MemoryRecordLookup>,
    detector: TemporalQueryDetector,
    classifier: QueryClassifier,
    executor: MultiVectorSearchExecutor,
    ranker: ResultFusionRanker,
}

impl RetrievalEngine {
    /// Create an engine, loading the lexicon named in config (or the built-in one).
    ///
    /// # Errors
    /// Returns an error if configuration is invalid or the lexicon fails to load.
    pub fn new(config: RecallConfig, backends: RecallBackends) -> MemoryResult<Self> {
        let lexicon = match &config.classifier.lexicon_path {
            Some(path) => {
                info!(path = %path.display(), "loading classifier lexicon");
                ClassifierLexicon::from_json_file(path)?
            }
            None => ClassifierLexicon::builtin(),
        };
        Self::with_lexicon(config, backends, Arc::new(lexicon.compile()?))
    }

    /// Create an engine with an already compiled lexicon.
    ///
    /// # Errors
    /// Returns an error if configuration is invalid.
    pub fn with_lexicon(
        config: RecallConfig,
        backends: RecallBackends,
        lexicon: Arc<CompiledLexicon>,
    ) -> MemoryResult<Self> {
        config.validate()?;
        let executor = MultiVectorSearchExecutor::new(
            backends.store.clone(),
            backends.embedder,
            Duration::from_millis(config.search.dimension_timeout_ms),
        );
        Ok(Self {
            detector: TemporalQueryDetector::new(lexicon.clone()),
            classifier: QueryClassifier::new(lexicon, config.classifier.clone()),
            ranker: ResultFusionRanker::new(config.fusion.clone()),
            executor,
            store: backends.store,
            lookup: backends.lookup,
            config,
        })
    }

    /// Create an engine using `SQLite` + Ollama backends.
    ///
    /// # Errors
    /// Returns an error if backends cannot be initialized.
    pub async fn from_config(config: RecallConfig) -> MemoryResult<Self> {
        let backends = RecallBackends::sqlite(&config).await?;
        Self::new(config, backends)
    }

    /// Retrieve up to `limit` records for `owner`.
    ///
    /// # Errors
    /// Returns `InvalidOwnerPartition` for a malformed owner, `AllDimensionsFailed`
    /// when every weighted search fails, `RetrievalTimeout` when the optional
    /// overall deadline passes, or the store's error for lookups and scans.
    pub async fn retrieve(
        &self,
        owner: &OwnerKey,
        query: &str,
        limit: usize,
        recent_context: Option<&[String]>,
    ) -> MemoryResult<RankedResult> {
        owner.validate()?;
        let work = self.retrieve_unbounded(owner, query, limit, recent_context);
        match self.config.search.overall_timeout_ms {
            Some(ms) => timeout(Duration::from_millis(ms), work)
                .await
                .map_err(|_| MemoryError::RetrievalTimeout(ms))?,
            None => work.await,
        }
    }

    async fn retrieve_unbounded(
        &self,
        owner: &OwnerKey,
        query: &str,
        limit: usize,
        recent_context: Option<&[String]>,
    ) -> MemoryResult<RankedResult> {
        if let Some(intent) = self.detector.detect(query) {
            return self.retrieve_chronological(owner, intent, limit).await;
        }

        let classification = self.classifier.classify(query, recent_context);
        let strategy = VectorStrategySelector::select(&classification);
        debug!(%owner, category = ?classification.category, strategy = %strategy.name, "strategy selected");

        let results = if limit == 0 {
            PerDimensionResults::default()
        } else {
            let top_k = self.config.search.top_k_for(limit);
            self.executor
                .search(owner, &classification.query, &strategy, top_k)
                .await?
        };

        let ids: Vec<RecordId> = {
            let mut ids: Vec<RecordId> = results
                .dimensions
                .iter()
                .flat_map(|d| d.hits.iter().map(|h| h.record_id))
                .collect();
            ids.sort_unstable();
            ids.dedup();
            ids
        };
        let candidates = self.owned_records(owner, ids).await?;

        let mut ranked = self
            .ranker
            .fuse(&results, &strategy, &candidates, limit, Utc::now());
        ranked.classification = Some(classification);
        debug!(%owner, returned = ranked.records.len(), "retrieval complete");
        Ok(ranked)
    }

    async fn retrieve_chronological(
        &self,
        owner: &OwnerKey,
        intent: TemporalIntent,
        limit: usize,
    ) -> MemoryResult<RankedResult> {
        debug!(%owner, order = ?intent.order, filter = ?intent.content_filter, "temporal override");
        let hits = if limit == 0 {
            Vec::new()
        } else {
            self.store
                .scan_by_time(owner, intent.order, limit, intent.content_filter.as_deref())
                .await?
        };
        let candidates = self
            .owned_records(owner, hits.iter().map(|h| h.record_id).collect())
            .await?;
        Ok(ResultFusionRanker::chronological(
            &hits,
            &candidates,
            intent,
            limit,
        ))
    }

    async fn owned_records(
        &self,
        owner: &OwnerKey,
        ids: Vec<RecordId>,
    ) -> MemoryResult<HashMap<RecordId, MemoryRecord>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let requested = ids.len();
        let records: HashMap<RecordId, MemoryRecord> = self
            .lookup
            .get_many(ids)
            .await?
            .into_iter()
            .filter(|record| record.owner == *owner)
            .map(|record| (record.id, record))
            .collect();
        if records.len() < requested {
            debug!(
                %owner,
                dropped = requested - records.len(),
                "dropped candidates that are missing or owned elsewhere"
            );
        }
        Ok(records)
    }
}
