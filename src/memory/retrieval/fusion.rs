//! Fusion of per-space hits into one ranked list, with bounded boosts.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::memory::classify::classifier::QueryClassification;
use crate::memory::classify::temporal::TemporalIntent;
use crate::memory::core::config::FusionConfig;
use crate::memory::core::ids::RecordId;
use crate::memory::core::record::MemoryRecord;
use crate::memory::core::space::VectorSpace;
use crate::memory::retrieval::executor::{DimensionOutcome, DimensionStatus, PerDimensionResults};
use crate::memory::retrieval::strategy::{SearchStrategy, StrategyName};
use crate::memory::storage::vector_store::{SpaceHit, TimeHit};

/// How a fused score was built.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreComponents {
    /// Raw similarity per space the candidate was found in.
    pub similarities: BTreeMap<VectorSpace, f64>,
    /// Score before boosts.
    pub base_score: f64,
    /// Recency multiplier (1.0 when unboosted).
    pub recency_multiplier: f64,
    /// Importance/intensity multiplier (1.0 when unboosted).
    pub importance_multiplier: f64,
}

/// One ranked memory.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RankedRecord {
    /// Record identifier.
    pub record_id: RecordId,
    /// Final score.
    pub fused_score: f64,
    /// Record timestamp.
    pub timestamp: DateTime<Utc>,
    /// Record text.
    pub content: String,
    /// Score breakdown.
    pub components: ScoreComponents,
}

/// Per-dimension diagnostics without the hits themselves.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DimensionDiagnostic {
    /// Searched space.
    pub space: VectorSpace,
    /// Outcome.
    pub status: DimensionStatus,
    /// Number of distinct hits.
    pub hit_count: usize,
    /// Wall time.
    pub elapsed_ms: u64,
    /// Error for degraded dimensions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<&DimensionOutcome> for DimensionDiagnostic {
    fn from(outcome: &DimensionOutcome) -> Self {
        Self {
            space: outcome.space,
            status: outcome.status,
            hit_count: outcome.hits.len(),
            elapsed_ms: outcome.elapsed_ms,
            error: outcome.error.clone(),
        }
    }
}

/// Output of one retrieval.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RankedResult {
    /// Ranked records, best first.
    pub records: Vec<RankedRecord>,
    /// Strategy that produced the ranking.
    pub strategy_used: StrategyName,
    /// Space weights applied (all zero for temporal scans).
    pub weights: [f64; 3],
    /// Per-dimension diagnostics; empty for temporal scans.
    pub diagnostics: Vec<DimensionDiagnostic>,
    /// Classification, absent when the temporal override fired.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub classification: Option<QueryClassification>,
    /// Temporal intent, present only when the override fired.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temporal: Option<TemporalIntent>,
}

impl RankedResult {
    /// Record ids in rank order.
    #[must_use]
    pub fn record_ids(&self) -> Vec<RecordId> {
        self.records.iter().map(|r| r.record_id).collect()
    }

    /// Whether any dimension degraded.
    #[must_use]
    pub fn is_degraded(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.status != DimensionStatus::Ok)
            || self
                .classification
                .as_ref()
                .is_some_and(QueryClassification::is_degraded)
    }
}

/// Fuses per-dimension hits.
#[derive(Clone, Debug, Default)]
pub struct ResultFusionRanker {
    config: FusionConfig,
}

impl ResultFusionRanker {
    /// Create a ranker.
    #[must_use]
    pub const fn new(config: FusionConfig) -> Self {
        Self { config }
    }

    /// Fuse `results` under `strategy`; candidates missing from `candidates` are dropped.
    #[must_use]
    pub fn fuse(
        &self,
        results: &PerDimensionResults,
        strategy: &SearchStrategy,
        candidates: &HashMap<RecordId, MemoryRecord>,
        limit: usize,
        now: DateTime<Utc>,
    ) -> RankedResult {
        let mut records = if strategy.name.is_primary() {
            pass_through(results, strategy, candidates)
        } else {
            self.weighted(results, strategy, candidates, now)
        };

        records.sort_by(rank_order);
        records.truncate(limit);

        RankedResult {
            records,
            strategy_used: strategy.name,
            weights: strategy.weights,
            diagnostics: results.dimensions.iter().map(DimensionDiagnostic::from).collect(),
            classification: None,
            temporal: None,
        }
    }

    /// Rank a chronological scan; scan order is kept and scores are `1 / (rank + 1)`.
    #[must_use]
    #[allow(clippy::cast_precision_loss)] // rank is bounded by the scan limit
    pub fn chronological(
        hits: &[TimeHit],
        candidates: &HashMap<RecordId, MemoryRecord>,
        intent: TemporalIntent,
        limit: usize,
    ) -> RankedResult {
        let records = hits
            .iter()
            .filter_map(|hit| candidates.get(&hit.record_id))
            .take(limit)
            .enumerate()
            .map(|(rank, record)| RankedRecord {
                record_id: record.id,
                fused_score: 1.0 / (rank as f64 + 1.0),
                timestamp: record.timestamp,
                content: record.content.clone(),
                components: ScoreComponents::default(),
            })
            .collect();

        RankedResult {
            records,
            strategy_used: StrategyName::TemporalScan,
            weights: [0.0; 3],
            diagnostics: Vec::new(),
            classification: None,
            temporal: Some(intent),
        }
    }

    fn weighted(
        &self,
        results: &PerDimensionResults,
        strategy: &SearchStrategy,
        candidates: &HashMap<RecordId, MemoryRecord>,
        now: DateTime<Utc>,
    ) -> Vec<RankedRecord> {
        let live: Vec<(VectorSpace, f64, &[SpaceHit])> = strategy
            .active_spaces()
            .into_iter()
            .filter_map(|space| {
                results
                    .hits(space)
                    .map(|hits| (space, strategy.weight(space), hits))
            })
            .collect();
        let live_weight: f64 = live.iter().map(|(_, weight, _)| weight).sum();
        if live_weight <= 0.0 {
            return Vec::new();
        }

        let mut similarities: HashMap<RecordId, BTreeMap<VectorSpace, f64>> = HashMap::new();
        for (space, _, hits) in &live {
            for hit in *hits {
                similarities
                    .entry(hit.record_id)
                    .or_default()
                    .insert(*space, hit.similarity);
            }
        }

        similarities
            .into_iter()
            .filter_map(|(record_id, sims)| {
                let record = candidates.get(&record_id)?;
                let base_score = live
                    .iter()
                    .map(|(space, weight, _)| {
                        (weight / live_weight) * sims.get(space).copied().unwrap_or(0.0)
                    })
                    .sum::<f64>();
                let recency_multiplier = self.recency_multiplier(record, now);
                let importance_multiplier = self.importance_multiplier(record);
                let boost = recency_multiplier * importance_multiplier;
                let fused_score = if base_score >= 0.0 {
                    base_score * boost
                } else {
                    base_score / boost
                };
                Some(RankedRecord {
                    record_id,
                    fused_score,
                    timestamp: record.timestamp,
                    content: record.content.clone(),
                    components: ScoreComponents {
                        similarities: sims,
                        base_score,
                        recency_multiplier,
                        importance_multiplier,
                    },
                })
            })
            .collect()
    }

    fn recency_multiplier(&self, record: &MemoryRecord, now: DateTime<Utc>) -> f64 {
        let half_life = u32::try_from(self.config.recency_half_life_seconds).unwrap_or(u32::MAX);
        let half_life = f64::from(half_life.max(1));
        let age_seconds = now
            .signed_duration_since(record.timestamp)
            .num_seconds()
            .max(0);
        let age_seconds = f64::from(u32::try_from(age_seconds).unwrap_or(u32::MAX));
        let recency = 1.0 / (1.0 + age_seconds / half_life);
        self.config.recency_boost_max.mul_add(recency, 1.0)
    }

    fn importance_multiplier(&self, record: &MemoryRecord) -> f64 {
        let share = self.config.intensity_share.clamp(0.0, 1.0);
        let importance = f64::from(record.importance).clamp(0.0, 1.0);
        let intensity = f64::from(record.emotion.intensity).clamp(0.0, 1.0);
        let signal = share.mul_add(intensity, (1.0 - share) * importance);
        self.config.importance_boost_max.mul_add(signal, 1.0)
    }
}

fn pass_through(
    results: &PerDimensionResults,
    strategy: &SearchStrategy,
    candidates: &HashMap<RecordId, MemoryRecord>,
) -> Vec<RankedRecord> {
    let Some(space) = strategy.active_spaces().first().copied() else {
        return Vec::new();
    };
    results
        .hits(space)
        .unwrap_or_default()
        .iter()
        .filter_map(|hit| {
            let record = candidates.get(&hit.record_id)?;
            Some(RankedRecord {
                record_id: hit.record_id,
                fused_score: hit.similarity,
                timestamp: record.timestamp,
                content: record.content.clone(),
                components: ScoreComponents {
                    similarities: BTreeMap::from([(space, hit.similarity)]),
                    base_score: hit.similarity,
                    recency_multiplier: 1.0,
                    importance_multiplier: 1.0,
                },
            })
        })
        .collect()
}

fn rank_order(a: &RankedRecord, b: &RankedRecord) -> Ordering {
    b.fused_score
        .total_cmp(&a.fused_score)
        .then_with(|| b.timestamp.cmp(&a.timestamp))
        .then_with(|| a.record_id.cmp(&b.record_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::core::ids::OwnerKey;
    use crate::memory::core::record::{EmbeddingSet, EmotionMetadata};
    use chrono::Duration;

    fn record(id: u128, age_days: i64, importance: f32, intensity: f32) -> MemoryRecord {
        MemoryRecord {
            id: RecordId::from_u128(id),
            owner: OwnerKey::new("c", "u", "k").unwrap(),
            content: format!("record {id}"),
            timestamp: now() - Duration::days(age_days),
            embeddings: EmbeddingSet {
                content: vec![1.0],
                emotion: vec![1.0],
                semantic: vec![1.0],
            },
            emotion: EmotionMetadata::new("neutral", 0.5, intensity),
            importance,
        }
    }

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2025-06-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn candidates(records: Vec<MemoryRecord>) -> HashMap<RecordId, MemoryRecord> {
        records.into_iter().map(|r| (r.id, r)).collect()
    }

    fn outcome(space: VectorSpace, hits: &[(u128, f64)]) -> DimensionOutcome {
        DimensionOutcome {
            space,
            status: DimensionStatus::Ok,
            hits: hits
                .iter()
                .map(|(id, similarity)| SpaceHit {
                    record_id: RecordId::from_u128(*id),
                    similarity: *similarity,
                })
                .collect(),
            elapsed_ms: 1,
            error: None,
        }
    }

    fn results(outcomes: Vec<DimensionOutcome>) -> PerDimensionResults {
        PerDimensionResults {
            dimensions: outcomes,
        }
    }

    #[test]
    fn test_primary_passes_scores_through() {
        let ranker = ResultFusionRanker::default();
        let ranked = ranker.fuse(
            &results(vec![outcome(VectorSpace::Emotion, &[(1, 0.4), (2, 0.9)])]),
            &SearchStrategy::primary(VectorSpace::Emotion),
            &candidates(vec![record(1, 0, 1.0, 1.0), record(2, 300, 0.0, 0.0)]),
            10,
            now(),
        );
        assert_eq!(ranked.strategy_used, StrategyName::EmotionPrimary);
        assert_eq!(ranked.record_ids(), vec![RecordId::from_u128(2), RecordId::from_u128(1)]);
        assert!((ranked.records[0].fused_score - 0.9).abs() < f64::EPSILON);
        assert!((ranked.records[1].components.recency_multiplier - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_weighted_zero_fills_missing_dimensions() {
        let ranker = ResultFusionRanker::new(FusionConfig::unboosted());
        let ranked = ranker.fuse(
            &results(vec![
                outcome(VectorSpace::Content, &[(1, 0.8)]),
                outcome(VectorSpace::Emotion, &[(1, 0.4), (2, 0.9)]),
            ]),
            &SearchStrategy::weighted([1.0, 1.0, 0.0]),
            &candidates(vec![record(1, 0, 0.5, 0.5), record(2, 0, 0.5, 0.5)]),
            10,
            now(),
        );
        assert_eq!(ranked.record_ids(), vec![RecordId::from_u128(1), RecordId::from_u128(2)]);
        assert!((ranked.records[0].fused_score - 0.6).abs() < 1e-9);
        assert!((ranked.records[1].fused_score - 0.45).abs() < 1e-9);
    }

    #[test]
    fn test_failed_dimension_is_excluded() {
        let ranker = ResultFusionRanker::new(FusionConfig::unboosted());
        let mut failed = outcome(VectorSpace::Semantic, &[]);
        failed.status = DimensionStatus::TimedOut;
        let ranked = ranker.fuse(
            &results(vec![outcome(VectorSpace::Content, &[(1, 0.5)]), failed]),
            &SearchStrategy::weighted([1.0, 0.0, 1.0]),
            &candidates(vec![record(1, 0, 0.5, 0.5)]),
            10,
            now(),
        );
        assert!((ranked.records[0].fused_score - 0.5).abs() < 1e-9);
        assert!(ranked.is_degraded());
    }

    #[test]
    fn test_ties_break_on_timestamp_then_id() {
        let ranker = ResultFusionRanker::default();
        let ranked = ranker.fuse(
            &results(vec![outcome(VectorSpace::Content, &[(3, 0.5), (2, 0.5), (1, 0.5)])]),
            &SearchStrategy::primary(VectorSpace::Content),
            &candidates(vec![record(1, 1, 0.5, 0.5), record(2, 1, 0.5, 0.5), record(3, 0, 0.5, 0.5)]),
            10,
            now(),
        );
        assert_eq!(
            ranked.record_ids(),
            vec![RecordId::from_u128(3), RecordId::from_u128(1), RecordId::from_u128(2)]
        );
    }

    #[test]
    fn test_boosts_are_bounded() {
        let ranker = ResultFusionRanker::default();
        // Fresh, maximally important record vs. an old, unimportant one 20% ahead.
        let ranked = ranker.fuse(
            &results(vec![outcome(VectorSpace::Content, &[(1, 0.5), (2, 0.6)])]),
            &SearchStrategy::weighted([1.0, 0.0, 0.0]),
            &candidates(vec![record(1, 0, 1.0, 1.0), record(2, 3650, 0.0, 0.0)]),
            10,
            now(),
        );
        assert_eq!(ranked.records[0].record_id, RecordId::from_u128(2));
        let boosted = &ranked.records[1].components;
        assert!(boosted.recency_multiplier <= 1.05 + 1e-9);
        assert!(boosted.importance_multiplier <= 1.05 + 1e-9);
        assert!(boosted.recency_multiplier > 1.049);
    }

    #[test]
    fn test_boosts_break_near_ties() {
        let ranker = ResultFusionRanker::default();
        let ranked = ranker.fuse(
            &results(vec![outcome(VectorSpace::Content, &[(1, 0.50), (2, 0.51)])]),
            &SearchStrategy::weighted([1.0, 0.0, 0.0]),
            &candidates(vec![record(1, 0, 1.0, 1.0), record(2, 3650, 0.0, 0.0)]),
            10,
            now(),
        );
        assert_eq!(ranked.records[0].record_id, RecordId::from_u128(1));
    }

    #[test]
    fn test_fused_score_is_monotonic_in_similarity() {
        let ranker = ResultFusionRanker::default();
        let strategy = SearchStrategy::weighted([0.2, 0.5, 0.3]);
        let pool = candidates(vec![record(1, 2, 0.3, 0.7)]);
        let mut previous = f64::NEG_INFINITY;
        for step in -10..=10 {
            let similarity = f64::from(step) / 10.0;
            let ranked = ranker.fuse(
                &results(vec![
                    outcome(VectorSpace::Content, &[(1, 0.3)]),
                    outcome(VectorSpace::Emotion, &[(1, similarity)]),
                    outcome(VectorSpace::Semantic, &[]),
                ]),
                &strategy,
                &pool,
                10,
                now(),
            );
            let score = ranked.records[0].fused_score;
            assert!(score > previous, "{score} <= {previous} at {similarity}");
            previous = score;
        }
    }

    #[test]
    fn test_higher_similarity_outranks_identical_peer() {
        let ranker = ResultFusionRanker::default();
        let strategy = SearchStrategy::weighted([0.2, 0.5, 0.3]);
        let pool = candidates(vec![record(1, 2, 0.3, 0.7), record(2, 2, 0.3, 0.7)]);
        for step in -10..10 {
            let lower = f64::from(step) / 10.0;
            let higher = lower + 0.05;
            for (better, worse) in [(1, 2), (2, 1)] {
                let ranked = ranker.fuse(
                    &results(vec![
                        outcome(VectorSpace::Content, &[(better, 0.3), (worse, 0.3)]),
                        outcome(VectorSpace::Emotion, &[(better, higher), (worse, lower)]),
                        outcome(VectorSpace::Semantic, &[(better, -0.2), (worse, -0.2)]),
                    ]),
                    &strategy,
                    &pool,
                    10,
                    now(),
                );
                assert_eq!(
                    ranked.record_ids(),
                    vec![RecordId::from_u128(better), RecordId::from_u128(worse)],
                    "at {lower}"
                );
                assert!(ranked.records[0].fused_score > ranked.records[1].fused_score);
            }
        }
    }

    #[test]
    fn test_unknown_candidates_dropped_and_limit_applied() {
        let ranker = ResultFusionRanker::default();
        let ranked = ranker.fuse(
            &results(vec![outcome(VectorSpace::Content, &[(1, 0.9), (2, 0.8), (3, 0.7), (4, 0.6)])]),
            &SearchStrategy::weighted([1.0, 0.0, 0.0]),
            &candidates(vec![record(2, 0, 0.5, 0.5), record(3, 0, 0.5, 0.5), record(4, 0, 0.5, 0.5)]),
            2,
            now(),
        );
        assert_eq!(ranked.record_ids(), vec![RecordId::from_u128(2), RecordId::from_u128(3)]);
    }

    #[test]
    fn test_chronological_scores_by_rank() {
        let pool = candidates(vec![record(1, 3, 0.5, 0.5), record(2, 2, 0.5, 0.5)]);
        let hits: Vec<TimeHit> = [1_u128, 9, 2]
            .into_iter()
            .map(|id| TimeHit {
                record_id: RecordId::from_u128(id),
                timestamp: now(),
            })
            .collect();
        let intent = TemporalIntent {
            order: crate::memory::storage::vector_store::TimeOrder::Ascending,
            content_filter: None,
        };
        let ranked = ResultFusionRanker::chronological(&hits, &pool, intent, 10);
        assert_eq!(ranked.strategy_used, StrategyName::TemporalScan);
        assert_eq!(ranked.record_ids(), vec![RecordId::from_u128(1), RecordId::from_u128(2)]);
        assert!((ranked.records[1].fused_score - 0.5).abs() < f64::EPSILON);
    }
}
