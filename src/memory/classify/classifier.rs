//! Lexicon-driven query classification.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::memory::classify::lexicon::{AxisScores, CompiledLexicon, QueryAxis};
use crate::memory::core::config::ClassifierConfig;
use crate::memory::core::errors::{MemoryError, MemoryResult};

/// Overall category of a query.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryCategory {
    /// Content axis dominant.
    Content,
    /// Emotional axis dominant.
    Emotional,
    /// Semantic axis dominant.
    Semantic,
    /// Temporal axis dominant.
    Temporal,
    /// No single dominant axis.
    Hybrid,
}

impl From<QueryAxis> for QueryCategory {
    fn from(axis: QueryAxis) -> Self {
        match axis {
            QueryAxis::Content => Self::Content,
            QueryAxis::Emotional => Self::Emotional,
            QueryAxis::Semantic => Self::Semantic,
            QueryAxis::Temporal => Self::Temporal,
        }
    }
}

/// Result of classifying one query.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QueryClassification {
    /// Query as scored (possibly truncated).
    pub query: String,
    /// Per-axis confidences.
    pub scores: AxisScores,
    /// Derived category.
    pub category: QueryCategory,
    /// Why the classification fell back to neutral, if it did.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub degraded: Option<String>,
}

impl QueryClassification {
    /// Neutral classification used when the query carries no usable signal.
    #[must_use]
    pub fn neutral(query: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            scores: AxisScores::default(),
            category: QueryCategory::Hybrid,
            degraded: Some(reason.into()),
        }
    }

    /// Whether this is a neutral fallback.
    #[must_use]
    pub const fn is_degraded(&self) -> bool {
        self.degraded.is_some()
    }
}

/// Scores queries against an injected lexicon.
#[derive(Clone, Debug)]
pub struct QueryClassifier {
    lexicon: Arc<CompiledLexicon>,
    config: ClassifierConfig,
}

impl QueryClassifier {
    /// Create a classifier.
    #[must_use]
    pub const fn new(lexicon: Arc<CompiledLexicon>, config: ClassifierConfig) -> Self {
        Self { lexicon, config }
    }

    /// Classify `query`, optionally informed by recent turns. Never fails.
    #[must_use]
    pub fn classify(&self, query: &str, recent_context: Option<&[String]>) -> QueryClassification {
        match self.try_classify(query, recent_context) {
            Ok(classification) => classification,
            Err(err) => {
                warn!(error = %err, "query classification degraded to neutral");
                QueryClassification::neutral(query.trim(), err.to_string())
            }
        }
    }

    fn try_classify(
        &self,
        query: &str,
        recent_context: Option<&[String]>,
    ) -> MemoryResult<QueryClassification> {
        let query = truncate_chars(query.trim(), self.config.max_query_chars);
        if query.is_empty() {
            return Err(MemoryError::ClassificationDegraded("empty query".to_string()));
        }
        if !query.chars().any(char::is_alphanumeric) {
            return Err(MemoryError::ClassificationDegraded(
                "query has no lexical content".to_string(),
            ));
        }

        let mut scores = self.lexicon.score(query);
        if let Some(turns) = recent_context.filter(|turns| !turns.is_empty()) {
            let joined = turns.join("\n");
            let context = self
                .lexicon
                .score(truncate_chars(&joined, self.config.max_query_chars));
            for axis in QueryAxis::ALL {
                scores.add(axis, self.config.context_weight * context.get(axis));
            }
        }

        let strongest_other = scores.emotional.max(scores.semantic);
        scores.add(
            QueryAxis::Content,
            self.config.content_residual * (1.0 - strongest_other),
        );

        let category = self.category_for(&scores);
        debug!(
            content = scores.content,
            emotional = scores.emotional,
            semantic = scores.semantic,
            temporal = scores.temporal,
            ?category,
            "query classified"
        );

        Ok(QueryClassification {
            query: query.to_string(),
            scores,
            category,
            degraded: None,
        })
    }

    fn category_for(&self, scores: &AxisScores) -> QueryCategory {
        let mut dominant = QueryAxis::ALL
            .into_iter()
            .filter(|axis| scores.get(*axis) >= self.config.dominance_threshold);
        match (dominant.next(), dominant.next()) {
            (Some(axis), None) => axis.into(),
            _ => QueryCategory::Hybrid,
        }
    }
}

fn truncate_chars(text: &str, max_chars: usize) -> &str {
    text.char_indices()
        .nth(max_chars)
        .map_or(text, |(idx, _)| &text[..idx])
}
