//! Ordinal recall detection ("what did I say first", "the last time we talked about X").

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::memory::classify::lexicon::CompiledLexicon;
use crate::memory::storage::vector_store::TimeOrder;

const LEADING_WORDS: [&str; 5] = ["the ", "a ", "an ", "my ", "your "];
const TRAILING_WORDS: [&str; 5] = [" first", " last", " initially", " originally", " previously"];

/// Chronological intent extracted from a query.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemporalIntent {
    /// Scan direction.
    pub order: TimeOrder,
    /// Topic the scan is restricted to, if the query names one.
    pub content_filter: Option<String>,
}

/// Detects queries that must bypass similarity search.
#[derive(Clone, Debug)]
pub struct TemporalQueryDetector {
    lexicon: Arc<CompiledLexicon>,
}

impl TemporalQueryDetector {
    /// Create a detector over a compiled lexicon.
    #[must_use]
    pub const fn new(lexicon: Arc<CompiledLexicon>) -> Self {
        Self { lexicon }
    }

    /// Return the chronological intent of `query`, if any.
    ///
    /// Requires an ordinal recall construction and a conversational recall
    /// cue. When both directions match, the cue that appears first in the text
    /// wins. The topic filter is the text after the last topic marker.
    #[must_use]
    pub fn detect(&self, query: &str) -> Option<TemporalIntent> {
        if !self.lexicon.recall_context.is_match(query) {
            return None;
        }

        let ascending = self.lexicon.ascending.find(query).map(|m| m.start());
        let descending = self.lexicon.descending.find(query).map(|m| m.start());
        let order = match (ascending, descending) {
            (Some(a), Some(d)) if d < a => TimeOrder::Descending,
            (Some(_), _) => TimeOrder::Ascending,
            (None, Some(_)) => TimeOrder::Descending,
            (None, None) => return None,
        };

        Some(TemporalIntent {
            order,
            content_filter: self.content_filter(query),
        })
    }

    fn content_filter(&self, query: &str) -> Option<String> {
        let marker = self.lexicon.content_filter.find_iter(query).last()?;
        let mut topic = query[marker.end()..].to_lowercase();
        for cue in [&self.lexicon.ascending, &self.lexicon.descending] {
            if let Some(found) = cue.find(&topic) {
                topic.truncate(found.start());
            }
        }

        let mut topic = topic
            .trim_end_matches(|c: char| c.is_ascii_punctuation() || c.is_whitespace())
            .trim_start()
            .to_string();
        while let Some(word) = LEADING_WORDS.iter().find(|w| topic.starts_with(**w)) {
            topic = topic[word.len()..].trim_start().to_string();
        }
        while let Some(word) = TRAILING_WORDS.iter().find(|w| topic.ends_with(**w)) {
            topic.truncate(topic.len() - word.len());
            topic.truncate(topic.trim_end().len());
        }
        (!topic.is_empty()).then_some(topic)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detector() -> TemporalQueryDetector {
        TemporalQueryDetector::new(Arc::new(CompiledLexicon::builtin().unwrap()))
    }

    #[test]
    fn test_first_thing_is_ascending() {
        let intent = detector().detect("what was the first thing I told you").unwrap();
        assert_eq!(intent.order, TimeOrder::Ascending);
        assert_eq!(intent.content_filter, None);
    }

    #[test]
    fn test_last_time_with_topic_filter() {
        let intent = detector()
            .detect("When was the last time we talked about the new job?")
            .unwrap();
        assert_eq!(intent.order, TimeOrder::Descending);
        assert_eq!(intent.content_filter.as_deref(), Some("new job"));
    }

    #[test]
    fn test_before_that_is_descending() {
        let intent = detector().detect("and before that?").unwrap();
        assert_eq!(intent.order, TimeOrder::Descending);
    }

    #[test]
    fn test_earliest_cue_wins() {
        let intent = detector()
            .detect("the last thing you said, or the first thing we discussed")
            .unwrap();
        assert_eq!(intent.order, TimeOrder::Descending);
    }

    #[test]
    fn test_ordinal_without_recall_cue_is_ignored() {
        let detector = detector();
        assert!(detector.detect("what is the first law of thermodynamics").is_none());
        assert!(detector.detect("what makes me anxious?").is_none());
        assert!(detector.detect("what was my first job").is_none());
    }

    #[test]
    fn test_topic_follows_last_marker() {
        let detector = detector();
        let intent = detector
            .detect("what was the first thing I mentioned about pizza?")
            .unwrap();
        assert_eq!(intent.order, TimeOrder::Ascending);
        assert_eq!(intent.content_filter.as_deref(), Some("pizza"));

        let intent = detector
            .detect("tell me about the first time I mentioned pizza")
            .unwrap();
        assert_eq!(intent.order, TimeOrder::Ascending);
        assert_eq!(intent.content_filter.as_deref(), Some("pizza"));
    }

    #[test]
    fn test_topic_drops_ordinal_clause() {
        let detector = detector();
        let intent = detector.detect("what did I say about pizza first?").unwrap();
        assert_eq!(intent.order, TimeOrder::Ascending);
        assert_eq!(intent.content_filter.as_deref(), Some("pizza"));

        let intent = detector.detect("what did we talk about the last time?").unwrap();
        assert_eq!(intent.order, TimeOrder::Descending);
        assert_eq!(intent.content_filter, None);
    }

    #[test]
    fn test_unrelated_ordinal_is_ignored() {
        let detector = detector();
        assert!(detector.detect("Do we have a first aid kit?").is_none());
        assert!(detector.detect("How did we feel about the previous exam?").is_none());
        assert!(
            detector
                .detect("What makes me anxious every time I speak first at work?")
                .is_none()
        );
    }
}
