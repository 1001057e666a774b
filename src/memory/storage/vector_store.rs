//! Store contracts consumed by recall.
//!
//! Persistence belongs to an external writer; recall only reads through these
//! traits. Every call is scoped by an [`OwnerKey`] and implementations must
//! never return records from another partition.

use std::future::Future;
use std::pin::Pin;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::memory::core::errors::MemoryResult;
use crate::memory::core::ids::{OwnerKey, RecordId};
use crate::memory::core::record::MemoryRecord;
use crate::memory::core::space::VectorSpace;

/// Boxed future type for store operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// One nearest-neighbor hit in a single vector space.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SpaceHit {
    /// Matching record.
    pub record_id: RecordId,
    /// Raw similarity reported by the store (cosine, higher is closer).
    pub similarity: f64,
}

/// One row of a time-ordered scan.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeHit {
    /// Matching record.
    pub record_id: RecordId,
    /// Record timestamp.
    pub timestamp: DateTime<Utc>,
}

/// Direction of a time-ordered scan.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeOrder {
    /// Oldest first.
    Ascending,
    /// Newest first.
    Descending,
}

/// Nearest-neighbor and chronological access to an owner's records.
pub trait VectorStore: Send + Sync {
    /// Top-K records in `space` closest to `query`, best first.
    ///
    /// # Errors
    /// Returns an error if the query cannot be executed.
    fn search<'a>(
        &'a self,
        owner: &'a OwnerKey,
        space: VectorSpace,
        query: &'a [f32],
        top_k: usize,
    ) -> StoreFuture<'a, MemoryResult<Vec<SpaceHit>>>;

    /// Up to `limit` records ordered by timestamp, optionally keeping only
    /// records whose content contains `content_filter` (case-insensitive).
    ///
    /// # Errors
    /// Returns an error if the scan cannot be executed.
    fn scan_by_time<'a>(
        &'a self,
        owner: &'a OwnerKey,
        order: TimeOrder,
        limit: usize,
        content_filter: Option<&'a str>,
    ) -> StoreFuture<'a, MemoryResult<Vec<TimeHit>>>;
}

/// Point lookups of full records.
pub trait MemoryRecordLookup: Send + Sync {
    /// Fetch one record, `None` if it no longer exists.
    ///
    /// # Errors
    /// Returns an error if the store cannot be queried.
    fn get(&self, id: RecordId) -> StoreFuture<'_, MemoryResult<Option<MemoryRecord>>>;

    /// Fetch several records; missing ids are skipped, order is unspecified.
    ///
    /// # Errors
    /// Returns an error if the store cannot be queried.
    fn get_many(&self, ids: Vec<RecordId>) -> StoreFuture<'_, MemoryResult<Vec<MemoryRecord>>> {
        Box::pin(async move {
            let mut records = Vec::with_capacity(ids.len());
            for id in ids {
                if let Some(record) = self.get(id).await? {
                    records.push(record);
                }
            }
            Ok(records)
        })
    }
}

/// Cosine similarity in `[-1, 1]`; zero for empty, mismatched or zero-norm vectors.
#[must_use]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.is_empty() || a.len() != b.len() {
        return 0.0;
    }

    let mut dot = 0.0_f64;
    let mut norm_a = 0.0_f64;
    let mut norm_b = 0.0_f64;
    for (x, y) in a.iter().zip(b) {
        let (x, y) = (f64::from(*x), f64::from(*y));
        dot = x.mul_add(y, dot);
        norm_a = x.mul_add(x, norm_a);
        norm_b = y.mul_add(y, norm_b);
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    (dot / (norm_a.sqrt() * norm_b.sqrt())).clamp(-1.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_identical_and_orthogonal() {
        assert!((cosine_similarity(&[1.0, 2.0], &[2.0, 4.0]) - 1.0).abs() < 1e-9);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-9);
    }

    #[test]
    fn test_cosine_degenerate_inputs() {
        assert!(cosine_similarity(&[], &[]).abs() < f64::EPSILON);
        assert!(cosine_similarity(&[1.0], &[1.0, 0.0]).abs() < f64::EPSILON);
        assert!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]).abs() < f64::EPSILON);
    }
}
