//! Concurrent per-space nearest-neighbor search.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::memory::core::errors::{MemoryError, MemoryResult};
use crate::memory::core::ids::{OwnerKey, RecordId};
use crate::memory::core::space::VectorSpace;
use crate::memory::embedding::embedder::QueryEmbedder;
use crate::memory::retrieval::strategy::SearchStrategy;
use crate::memory::storage::vector_store::{SpaceHit, VectorStore};

/// Outcome of one dimension's search.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DimensionStatus {
    /// Search completed.
    Ok,
    /// Search exceeded its timeout.
    TimedOut,
    /// Embedding or store call failed.
    Failed,
}

/// Hits and diagnostics for one dimension.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DimensionOutcome {
    /// Searched space.
    pub space: VectorSpace,
    /// Outcome.
    pub status: DimensionStatus,
    /// Hits, best first; empty unless `status` is `Ok`.
    pub hits: Vec<SpaceHit>,
    /// Wall time spent on the dimension.
    pub elapsed_ms: u64,
    /// Error message for degraded dimensions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DimensionOutcome {
    /// Whether the dimension contributes to fusion.
    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.status == DimensionStatus::Ok
    }
}

/// Results of every weighted dimension, in `VectorSpace::ALL` order.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PerDimensionResults {
    /// One entry per searched space.
    pub dimensions: Vec<DimensionOutcome>,
}

impl PerDimensionResults {
    /// Hits for `space` if it was searched successfully.
    #[must_use]
    pub fn hits(&self, space: VectorSpace) -> Option<&[SpaceHit]> {
        self.dimensions
            .iter()
            .find(|d| d.space == space && d.succeeded())
            .map(|d| d.hits.as_slice())
    }

    /// Spaces that failed or timed out.
    #[must_use]
    pub fn degraded_spaces(&self) -> Vec<VectorSpace> {
        self.dimensions
            .iter()
            .filter(|d| !d.succeeded())
            .map(|d| d.space)
            .collect()
    }
}

/// Fans a query out to every weighted space.
#[derive(Clone)]
pub struct MultiVectorSearchExecutor {
    store: Arc<dyn VectorStore>,
    embedder: Arc<dyn QueryEmbedder>,
    dimension_timeout: Duration,
}

impl MultiVectorSearchExecutor {
    /// Create an executor with a per-dimension timeout.
    #[must_use]
    pub fn new(
        store: Arc<dyn VectorStore>,
        embedder: Arc<dyn QueryEmbedder>,
        dimension_timeout: Duration,
    ) -> Self {
        Self {
            store,
            embedder,
            dimension_timeout,
        }
    }

    /// Search every space with non-zero weight concurrently.
    ///
    /// # Errors
    /// Returns `InvalidOwnerPartition` before any I/O for a malformed owner and
    /// `AllDimensionsFailed` when no weighted dimension succeeds.
    pub async fn search(
        &self,
        owner: &OwnerKey,
        query: &str,
        strategy: &SearchStrategy,
        top_k: usize,
    ) -> MemoryResult<PerDimensionResults> {
        owner.validate()?;
        let spaces = strategy.active_spaces();
        if spaces.is_empty() {
            return Err(MemoryError::AllDimensionsFailed(
                "strategy has no weighted dimension".to_string(),
            ));
        }

        let dimensions = join_all(
            spaces
                .iter()
                .map(|space| self.search_dimension(owner, *space, query, top_k)),
        )
        .await;

        if dimensions.iter().all(|d| !d.succeeded()) {
            let reasons = dimensions
                .iter()
                .filter_map(|d| d.error.as_deref())
                .collect::<Vec<_>>()
                .join("; ");
            return Err(MemoryError::AllDimensionsFailed(reasons));
        }

        Ok(PerDimensionResults { dimensions })
    }

    async fn search_dimension(
        &self,
        owner: &OwnerKey,
        space: VectorSpace,
        query: &str,
        top_k: usize,
    ) -> DimensionOutcome {
        let started = Instant::now();
        let attempt = timeout(self.dimension_timeout, async {
            let vector = self.embedder.embed_query(space, query).await?;
            self.store.search(owner, space, &vector, top_k).await
        })
        .await;
        let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        let (status, hits, error) = match attempt {
            Ok(Ok(hits)) => (DimensionStatus::Ok, dedupe_hits(hits), None),
            Ok(Err(err)) => {
                let err = MemoryError::DimensionSearchFailed {
                    space,
                    reason: err.to_string(),
                };
                warn!(%space, error = %err, "dimension search failed");
                (DimensionStatus::Failed, Vec::new(), Some(err.to_string()))
            }
            Err(_) => {
                let err = MemoryError::DimensionSearchTimeout {
                    space,
                    timeout_ms: u64::try_from(self.dimension_timeout.as_millis())
                        .unwrap_or(u64::MAX),
                };
                warn!(%space, error = %err, "dimension search timed out");
                (DimensionStatus::TimedOut, Vec::new(), Some(err.to_string()))
            }
        };

        debug!(%space, ?status, hits = hits.len(), elapsed_ms, "dimension searched");
        DimensionOutcome {
            space,
            status,
            hits,
            elapsed_ms,
            error,
        }
    }
}

fn dedupe_hits(hits: Vec<SpaceHit>) -> Vec<SpaceHit> {
    let mut best: HashMap<RecordId, f64> = HashMap::with_capacity(hits.len());
    for hit in hits.into_iter().filter(|h| h.similarity.is_finite()) {
        best.entry(hit.record_id)
            .and_modify(|s| *s = s.max(hit.similarity))
            .or_insert(hit.similarity);
    }
    let mut hits: Vec<SpaceHit> = best
        .into_iter()
        .map(|(record_id, similarity)| SpaceHit {
            record_id,
            similarity,
        })
        .collect();
    hits.sort_by(|a, b| {
        b.similarity
            .total_cmp(&a.similarity)
            .then_with(|| a.record_id.cmp(&b.record_id))
    });
    hits
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::memory::core::record::{EmbeddingSet, EmotionMetadata, MemoryRecord};
    use crate::memory::embedding::hashing::HashingEmbedder;
    use crate::memory::storage::memory_store::InMemoryMemoryStore;
    use crate::memory::storage::vector_store::{StoreFuture, TimeHit, TimeOrder};
    use chrono::Utc;

    /// Store wrapper that fails or stalls selected spaces.
    pub(crate) struct FaultyStore {
        pub(crate) inner: Arc<InMemoryMemoryStore>,
        pub(crate) failing: Vec<VectorSpace>,
        pub(crate) stalled: Vec<VectorSpace>,
    }

    impl VectorStore for FaultyStore {
        fn search<'a>(
            &'a self,
            owner: &'a OwnerKey,
            space: VectorSpace,
            query: &'a [f32],
            top_k: usize,
        ) -> StoreFuture<'a, MemoryResult<Vec<SpaceHit>>> {
            Box::pin(async move {
                if self.failing.contains(&space) {
                    return Err(MemoryError::InvalidRecord("index offline".to_string()));
                }
                if self.stalled.contains(&space) {
                    tokio::time::sleep(Duration::from_secs(30)).await;
                }
                self.inner.search(owner, space, query, top_k).await
            })
        }

        fn scan_by_time<'a>(
            &'a self,
            owner: &'a OwnerKey,
            order: TimeOrder,
            limit: usize,
            content_filter: Option<&'a str>,
        ) -> StoreFuture<'a, MemoryResult<Vec<TimeHit>>> {
            self.inner.scan_by_time(owner, order, limit, content_filter)
        }
    }

    fn owner() -> OwnerKey {
        OwnerKey::new("conv", "user", "char").unwrap()
    }

    fn seeded_store(embedder: &HashingEmbedder) -> Arc<InMemoryMemoryStore> {
        let store = Arc::new(InMemoryMemoryStore::new());
        for text in ["felt anxious before the exam", "likes pizza on fridays"] {
            let vector = embedder.embed(text);
            store
                .insert(MemoryRecord {
                    id: RecordId::new(),
                    owner: owner(),
                    content: text.to_string(),
                    timestamp: Utc::now(),
                    embeddings: EmbeddingSet {
                        content: vector.clone(),
                        emotion: vector.clone(),
                        semantic: vector,
                    },
                    emotion: EmotionMetadata::default(),
                    importance: 0.5,
                })
                .unwrap();
        }
        store
    }

    fn executor(failing: Vec<VectorSpace>, stalled: Vec<VectorSpace>) -> MultiVectorSearchExecutor {
        let embedder = HashingEmbedder::new(64);
        let store = FaultyStore {
            inner: seeded_store(&embedder),
            failing,
            stalled,
        };
        MultiVectorSearchExecutor::new(
            Arc::new(store),
            Arc::new(embedder),
            Duration::from_millis(100),
        )
    }

    #[tokio::test]
    async fn test_primary_searches_one_space() {
        let results = executor(vec![], vec![])
            .search(&owner(), "anxious", &SearchStrategy::primary(VectorSpace::Emotion), 10)
            .await
            .unwrap();
        assert_eq!(results.dimensions.len(), 1);
        assert_eq!(results.hits(VectorSpace::Emotion).unwrap().len(), 2);
        assert!(results.hits(VectorSpace::Content).is_none());
    }

    #[tokio::test]
    async fn test_one_failed_dimension_is_degraded() {
        let results = executor(vec![VectorSpace::Semantic], vec![])
            .search(&owner(), "anxious", &SearchStrategy::weighted([1.0; 3]), 10)
            .await
            .unwrap();
        assert_eq!(results.degraded_spaces(), vec![VectorSpace::Semantic]);
        assert!(results.hits(VectorSpace::Content).is_some());
        let failed = &results.dimensions[2];
        assert_eq!(failed.status, DimensionStatus::Failed);
        assert!(failed.error.as_deref().unwrap().contains("semantic"));
    }

    #[tokio::test]
    async fn test_stalled_dimension_times_out() {
        let started = Instant::now();
        let results = executor(vec![], vec![VectorSpace::Content])
            .search(&owner(), "anxious", &SearchStrategy::weighted([1.0; 3]), 10)
            .await
            .unwrap();
        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(results.dimensions[0].status, DimensionStatus::TimedOut);
        assert!(results.hits(VectorSpace::Emotion).is_some());
    }

    #[tokio::test]
    async fn test_all_failed_is_error() {
        let err = executor(vec![VectorSpace::Emotion], vec![])
            .search(&owner(), "anxious", &SearchStrategy::primary(VectorSpace::Emotion), 10)
            .await
            .unwrap_err();
        assert!(matches!(err, MemoryError::AllDimensionsFailed(_)));
    }

    #[test]
    fn test_dedupe_keeps_best_and_drops_nan() {
        let a = RecordId::from_u128(1);
        let b = RecordId::from_u128(2);
        let hits = dedupe_hits(vec![
            SpaceHit { record_id: a, similarity: 0.2 },
            SpaceHit { record_id: b, similarity: f64::NAN },
            SpaceHit { record_id: a, similarity: 0.7 },
        ]);
        assert_eq!(hits, vec![SpaceHit { record_id: a, similarity: 0.7 }]);
    }
}
