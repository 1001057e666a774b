//! Classification to search-strategy mapping.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::memory::classify::classifier::{QueryCategory, QueryClassification};
use crate::memory::core::space::VectorSpace;

const WEIGHT_FLOOR: f64 = 1.0 / 3.0;

/// Named search strategy.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyName {
    /// Content space only.
    ContentPrimary,
    /// Emotion space only.
    EmotionPrimary,
    /// Semantic space only.
    SemanticPrimary,
    /// All spaces, weighted.
    WeightedCombination,
    /// Chronological scan, no similarity.
    TemporalScan,
}

impl StrategyName {
    /// Stable name for logs and output.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ContentPrimary => "content_primary",
            Self::EmotionPrimary => "emotion_primary",
            Self::SemanticPrimary => "semantic_primary",
            Self::WeightedCombination => "weighted_combination",
            Self::TemporalScan => "temporal_scan",
        }
    }

    /// Whether fusion passes a single dimension through.
    #[must_use]
    pub const fn is_primary(self) -> bool {
        matches!(
            self,
            Self::ContentPrimary | Self::EmotionPrimary | Self::SemanticPrimary
        )
    }
}

impl fmt::Display for StrategyName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Strategy plus per-space weights, indexed by `VectorSpace::index`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SearchStrategy {
    /// Strategy name.
    pub name: StrategyName,
    /// Weights for content, emotion, semantic; zero means the space is not searched.
    pub weights: [f64; 3],
}

impl SearchStrategy {
    /// Single-space strategy.
    #[must_use]
    pub const fn primary(space: VectorSpace) -> Self {
        let mut weights = [0.0; 3];
        weights[space.index()] = 1.0;
        let name = match space {
            VectorSpace::Content => StrategyName::ContentPrimary,
            VectorSpace::Emotion => StrategyName::EmotionPrimary,
            VectorSpace::Semantic => StrategyName::SemanticPrimary,
        };
        Self { name, weights }
    }

    /// Weighted strategy; weights are normalized to sum to 1 (equal if all zero).
    #[must_use]
    pub fn weighted(raw: [f64; 3]) -> Self {
        let raw = raw.map(|w| if w.is_finite() { w.max(0.0) } else { 0.0 });
        let total: f64 = raw.iter().sum();
        let weights = if total > 0.0 {
            raw.map(|w| w / total)
        } else {
            [WEIGHT_FLOOR; 3]
        };
        Self {
            name: StrategyName::WeightedCombination,
            weights,
        }
    }

    /// Weight of one space.
    #[must_use]
    pub const fn weight(&self, space: VectorSpace) -> f64 {
        self.weights[space.index()]
    }

    /// Spaces with non-zero weight, in `VectorSpace::ALL` order.
    #[must_use]
    pub fn active_spaces(&self) -> Vec<VectorSpace> {
        VectorSpace::ALL
            .into_iter()
            .filter(|space| self.weight(*space) > 0.0)
            .collect()
    }
}

/// Pure mapping from classification to strategy.
#[derive(Clone, Copy, Debug, Default)]
pub struct VectorStrategySelector;

impl VectorStrategySelector {
    /// Pick the strategy for `classification`.
    #[must_use]
    pub fn select(classification: &QueryClassification) -> SearchStrategy {
        if classification.is_degraded() {
            return SearchStrategy::weighted([WEIGHT_FLOOR; 3]);
        }
        match classification.category {
            QueryCategory::Content => SearchStrategy::primary(VectorSpace::Content),
            QueryCategory::Emotional => SearchStrategy::primary(VectorSpace::Emotion),
            QueryCategory::Semantic => SearchStrategy::primary(VectorSpace::Semantic),
            QueryCategory::Temporal | QueryCategory::Hybrid => {
                let scores = &classification.scores;
                SearchStrategy::weighted(
                    [scores.content, scores.emotional, scores.semantic]
                        .map(|confidence| f64::from(confidence).max(WEIGHT_FLOOR)),
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::classify::lexicon::AxisScores;

    fn classification(category: QueryCategory, scores: [f32; 4]) -> QueryClassification {
        QueryClassification {
            query: "q".to_string(),
            scores: AxisScores {
                content: scores[0],
                emotional: scores[1],
                semantic: scores[2],
                temporal: scores[3],
            },
            category,
            degraded: None,
        }
    }

    fn assert_weights(strategy: &SearchStrategy, expected: [f64; 3]) {
        for (got, want) in strategy.weights.iter().zip(expected) {
            assert!((got - want).abs() < 1e-6, "{:?} != {expected:?}", strategy.weights);
        }
    }

    #[test]
    fn test_single_axis_maps_to_primary() {
        let strategy = VectorStrategySelector::select(&classification(
            QueryCategory::Emotional,
            [0.1, 0.6, 0.0, 0.0],
        ));
        assert_eq!(strategy.name, StrategyName::EmotionPrimary);
        assert_eq!(strategy.active_spaces(), vec![VectorSpace::Emotion]);

        let strategy = VectorStrategySelector::select(&classification(
            QueryCategory::Semantic,
            [0.1, 0.0, 0.5, 0.0],
        ));
        assert_eq!(strategy.name, StrategyName::SemanticPrimary);
    }

    #[test]
    fn test_all_low_is_equal_weights() {
        let strategy = VectorStrategySelector::select(&classification(
            QueryCategory::Hybrid,
            [0.1, 0.0, 0.2, 0.0],
        ));
        assert_eq!(strategy.name, StrategyName::WeightedCombination);
        assert_weights(&strategy, [WEIGHT_FLOOR; 3]);
    }

    #[test]
    fn test_one_strong_axis_gets_half() {
        let strategy = VectorStrategySelector::select(&classification(
            QueryCategory::Hybrid,
            [0.0, 2.0 / 3.0, 0.1, 0.9],
        ));
        assert_weights(&strategy, [0.25, 0.5, 0.25]);
    }

    #[test]
    fn test_weights_sum_to_one() {
        for scores in [[0.9, 0.8, 0.7, 0.0], [0.3, 1.0, 0.0, 0.5], [1.0, 1.0, 1.0, 1.0]] {
            let strategy =
                VectorStrategySelector::select(&classification(QueryCategory::Hybrid, scores));
            let total: f64 = strategy.weights.iter().sum();
            assert!((total - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_temporal_and_degraded_fall_back_to_weighted() {
        let strategy = VectorStrategySelector::select(&classification(
            QueryCategory::Temporal,
            [0.0, 0.0, 0.0, 0.8],
        ));
        assert_eq!(strategy.name, StrategyName::WeightedCombination);

        let strategy = VectorStrategySelector::select(&QueryClassification::neutral("", "empty"));
        assert_eq!(strategy.name, StrategyName::WeightedCombination);
        assert_weights(&strategy, [WEIGHT_FLOOR; 3]);
    }
}
