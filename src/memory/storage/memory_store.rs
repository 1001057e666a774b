//! In-process record store partitioned by owner.
//!
//! Brute-force cosine search over each partition. Backs tests and local runs
//! where a conversation's memory stays resident.

use std::cmp::Ordering;
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};

use dashmap::DashMap;
use tracing::debug;

use crate::memory::core::errors::{MemoryError, MemoryResult};
use crate::memory::core::ids::{OwnerKey, RecordId};
use crate::memory::core::record::MemoryRecord;
use crate::memory::core::space::VectorSpace;
use crate::memory::storage::vector_store::{
    MemoryRecordLookup, SpaceHit, StoreFuture, TimeHit, TimeOrder, VectorStore,
    cosine_similarity,
};

/// Owner-partitioned in-memory store.
#[derive(Debug, Default)]
pub struct InMemoryMemoryStore {
    partitions: DashMap<OwnerKey, Vec<MemoryRecord>>,
    owners: DashMap<RecordId, OwnerKey>,
    ndims: AtomicUsize,
}

impl InMemoryMemoryStore {
    /// Create an empty store; the first insert freezes the dimensionality.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty store with a fixed dimensionality.
    #[must_use]
    pub fn with_ndims(ndims: usize) -> Self {
        Self {
            ndims: AtomicUsize::new(ndims),
            ..Self::default()
        }
    }

    /// Vector size fixed by `with_ndims` or the first insert.
    #[must_use]
    pub fn ndims(&self) -> Option<usize> {
        let frozen = self.ndims.load(AtomicOrdering::Acquire);
        (frozen != 0).then_some(frozen)
    }

    /// Insert or replace a record.
    ///
    /// # Errors
    /// Returns an error if the record is partial, mis-sized, or its id is
    /// already held by another owner.
    pub fn insert(&self, record: MemoryRecord) -> MemoryResult<()> {
        let frozen = self.ndims.load(AtomicOrdering::Acquire);
        let ndims = record.validate((frozen != 0).then_some(frozen))?;
        if frozen == 0
            && let Err(current) = self.ndims.compare_exchange(
                0,
                ndims,
                AtomicOrdering::AcqRel,
                AtomicOrdering::Acquire,
            )
            && current != ndims
        {
            return Err(MemoryError::InvalidRecord(format!(
                "record has {ndims} dims, store schema is {current}"
            )));
        }

        if let Some(existing) = self.owners.get(&record.id)
            && *existing != record.owner
        {
            return Err(MemoryError::InvalidRecord(format!(
                "record {} already belongs to another owner",
                record.id
            )));
        }

        self.owners.insert(record.id, record.owner.clone());
        let mut partition = self.partitions.entry(record.owner.clone()).or_default();
        partition.retain(|existing| existing.id != record.id);
        partition.push(record);
        Ok(())
    }

    /// Insert many records, stopping at the first invalid one.
    ///
    /// # Errors
    /// Returns the first validation error encountered.
    pub fn insert_all(&self, records: impl IntoIterator<Item = MemoryRecord>) -> MemoryResult<()> {
        for record in records {
            self.insert(record)?;
        }
        Ok(())
    }

    /// Number of records held for an owner.
    #[must_use]
    pub fn len_for(&self, owner: &OwnerKey) -> usize {
        self.partitions.get(owner).map_or(0, |p| p.len())
    }
}

fn by_similarity(a: &(SpaceHit, i64), b: &(SpaceHit, i64)) -> Ordering {
    b.0.similarity
        .total_cmp(&a.0.similarity)
        .then_with(|| b.1.cmp(&a.1))
        .then_with(|| a.0.record_id.cmp(&b.0.record_id))
}

impl VectorStore for InMemoryMemoryStore {
    fn search<'a>(
        &'a self,
        owner: &'a OwnerKey,
        space: VectorSpace,
        query: &'a [f32],
        top_k: usize,
    ) -> StoreFuture<'a, MemoryResult<Vec<SpaceHit>>> {
        Box::pin(async move {
            let Some(partition) = self.partitions.get(owner) else {
                return Ok(Vec::new());
            };

            let mut scored: Vec<(SpaceHit, i64)> = partition
                .iter()
                .map(|record| {
                    (
                        SpaceHit {
                            record_id: record.id,
                            similarity: cosine_similarity(record.vector(space), query),
                        },
                        record.timestamp.timestamp_millis(),
                    )
                })
                .collect();
            drop(partition);

            scored.sort_by(by_similarity);
            scored.truncate(top_k);
            debug!(%owner, %space, hits = scored.len(), "in-memory search");
            Ok(scored.into_iter().map(|(hit, _)| hit).collect())
        })
    }

    fn scan_by_time<'a>(
        &'a self,
        owner: &'a OwnerKey,
        order: TimeOrder,
        limit: usize,
        content_filter: Option<&'a str>,
    ) -> StoreFuture<'a, MemoryResult<Vec<TimeHit>>> {
        Box::pin(async move {
            let Some(partition) = self.partitions.get(owner) else {
                return Ok(Vec::new());
            };

            let needle = content_filter.map(str::to_lowercase);
            let mut hits: Vec<TimeHit> = partition
                .iter()
                .filter(|record| {
                    needle
                        .as_deref()
                        .is_none_or(|n| record.content.to_lowercase().contains(n))
                })
                .map(|record| TimeHit {
                    record_id: record.id,
                    timestamp: record.timestamp,
                })
                .collect();
            drop(partition);

            hits.sort_by(|a, b| {
                let by_time = a.timestamp.cmp(&b.timestamp);
                let by_time = match order {
                    TimeOrder::Ascending => by_time,
                    TimeOrder::Descending => by_time.reverse(),
                };
                by_time.then_with(|| a.record_id.cmp(&b.record_id))
            });
            hits.truncate(limit);
            Ok(hits)
        })
    }
}

impl MemoryRecordLookup for InMemoryMemoryStore {
    fn get(&self, id: RecordId) -> StoreFuture<'_, MemoryResult<Option<MemoryRecord>>> {
        Box::pin(async move {
            let Some(owner) = self.owners.get(&id).map(|o| o.value().clone()) else {
                return Ok(None);
            };
            Ok(self
                .partitions
                .get(&owner)
                .and_then(|p| p.iter().find(|r| r.id == id).cloned()))
        })
    }
}
