//! Memory record model as produced by the external writer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::memory::core::errors::{MemoryError, MemoryResult};
use crate::memory::core::ids::{OwnerKey, RecordId};
use crate::memory::core::space::VectorSpace;

/// Emotion annotations attached by the upstream tone classifier.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EmotionMetadata {
    /// Primary emotion label (e.g. `anxiety`, `joy`, `neutral`).
    pub primary: String,
    /// Classifier confidence (0.0 - 1.0).
    pub confidence: f32,
    /// Emotional intensity (0.0 - 1.0).
    pub intensity: f32,
    /// Secondary labels, strongest first.
    #[serde(default)]
    pub secondary: Vec<String>,
}

impl EmotionMetadata {
    /// Neutral tone with zero intensity.
    #[must_use]
    pub fn neutral() -> Self {
        Self {
            primary: "neutral".to_string(),
            confidence: 1.0,
            intensity: 0.0,
            secondary: Vec::new(),
        }
    }

    /// Labelled tone.
    #[must_use]
    pub fn new(primary: impl Into<String>, confidence: f32, intensity: f32) -> Self {
        Self {
            primary: primary.into(),
            confidence,
            intensity,
            secondary: Vec::new(),
        }
    }
}

impl Default for EmotionMetadata {
    fn default() -> Self {
        Self::neutral()
    }
}

/// The three embeddings every persisted record carries.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingSet {
    /// Content embedding.
    pub content: Vec<f32>,
    /// Emotional-tone embedding.
    pub emotion: Vec<f32>,
    /// Semantic paraphrase embedding.
    pub semantic: Vec<f32>,
}

impl EmbeddingSet {
    /// Borrow the vector for one space.
    #[must_use]
    pub fn get(&self, space: VectorSpace) -> &[f32] {
        match space {
            VectorSpace::Content => &self.content,
            VectorSpace::Emotion => &self.emotion,
            VectorSpace::Semantic => &self.semantic,
        }
    }

    /// Shared dimensionality, or an error if any vector is empty, non-finite or mis-sized.
    ///
    /// # Errors
    /// Returns [`MemoryError::InvalidRecord`] for partial or inconsistent vectors.
    pub fn dimension(&self) -> MemoryResult<usize> {
        let ndims = self.content.len();
        for space in VectorSpace::ALL {
            let vector = self.get(space);
            if vector.is_empty() {
                return Err(MemoryError::InvalidRecord(format!(
                    "{space} vector is missing"
                )));
            }
            if vector.len() != ndims {
                return Err(MemoryError::InvalidRecord(format!(
                    "{space} vector has {} dims, expected {ndims}",
                    vector.len()
                )));
            }
            if vector.iter().any(|v| !v.is_finite()) {
                return Err(MemoryError::InvalidRecord(format!(
                    "{space} vector contains non-finite values"
                )));
            }
        }
        Ok(ndims)
    }
}

/// A persisted memory record. Read-only for recall.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MemoryRecord {
    /// Unique record identifier.
    pub id: RecordId,
    /// Isolation partition.
    pub owner: OwnerKey,
    /// Textual content.
    pub content: String,
    /// Write time; monotonic inside one owner partition.
    pub timestamp: DateTime<Utc>,
    /// Per-space embeddings.
    pub embeddings: EmbeddingSet,
    /// Tone annotations.
    #[serde(default)]
    pub emotion: EmotionMetadata,
    /// Importance weight (0.0 - 1.0).
    pub importance: f32,
}

impl MemoryRecord {
    /// Validate the record against a store's frozen dimensionality.
    ///
    /// # Errors
    /// Returns [`MemoryError::InvalidRecord`] if vectors are partial or mis-sized,
    /// content is empty, or scores fall outside `[0, 1]`; returns
    /// [`MemoryError::InvalidOwnerPartition`] if the owner key is malformed.
    pub fn validate(&self, expected_ndims: Option<usize>) -> MemoryResult<usize> {
        self.owner.validate()?;
        if self.content.trim().is_empty() {
            return Err(MemoryError::InvalidRecord("content is empty".to_string()));
        }

        let ndims = self.embeddings.dimension()?;
        if let Some(expected) = expected_ndims
            && expected != ndims
        {
            return Err(MemoryError::InvalidRecord(format!(
                "record has {ndims} dims, store schema is {expected}"
            )));
        }

        if !(0.0..=1.0).contains(&self.importance) {
            return Err(MemoryError::InvalidRecord(
                "importance must be in 0..=1".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.emotion.intensity) {
            return Err(MemoryError::InvalidRecord(
                "emotion intensity must be in 0..=1".to_string(),
            ));
        }

        Ok(ndims)
    }

    /// Borrow the vector for one space.
    #[must_use]
    pub fn vector(&self, space: VectorSpace) -> &[f32] {
        self.embeddings.get(space)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(content: Vec<f32>, emotion: Vec<f32>, semantic: Vec<f32>) -> MemoryRecord {
        MemoryRecord {
            id: RecordId::from_u128(1),
            owner: OwnerKey::new("c", "u1", "k").unwrap(),
            content: "likes pizza".to_string(),
            timestamp: Utc::now(),
            embeddings: EmbeddingSet {
                content,
                emotion,
                semantic,
            },
            emotion: EmotionMetadata::neutral(),
            importance: 0.5,
        }
    }

    #[test]
    fn test_validate_accepts_complete_record() {
        let r = record(vec![1.0, 0.0], vec![0.0, 1.0], vec![0.5, 0.5]);
        assert_eq!(r.validate(Some(2)).unwrap(), 2);
    }

    #[test]
    fn test_validate_rejects_missing_vector() {
        let r = record(vec![1.0, 0.0], Vec::new(), vec![0.5, 0.5]);
        let err = r.validate(None).unwrap_err();
        assert!(err.to_string().contains("emotion vector is missing"));
    }

    #[test]
    fn test_validate_rejects_dimension_drift() {
        let r = record(vec![1.0, 0.0, 0.0], vec![0.0, 1.0], vec![0.5, 0.5]);
        assert!(r.validate(None).is_err());

        let ok = record(vec![1.0, 0.0], vec![0.0, 1.0], vec![0.5, 0.5]);
        assert!(ok.validate(Some(3)).is_err());
    }

    #[test]
    fn test_validate_rejects_nan() {
        let r = record(vec![f32::NAN, 0.0], vec![0.0, 1.0], vec![0.5, 0.5]);
        assert!(r.validate(None).is_err());
    }

    #[test]
    fn test_validate_rejects_out_of_range_importance() {
        let mut r = record(vec![1.0], vec![1.0], vec![1.0]);
        r.importance = 1.5;
        assert!(r.validate(None).is_err());
    }
}
