//! `SQLite` record store with per-space vector columns.
//!
//! One row per record; the three embeddings live in little-endian `f32` BLOB
//! columns and are compared with sqlite-vec's `vec_distance_cosine`. Every
//! statement filters on `owner_key`.

use std::str::FromStr;

use chrono::{DateTime, TimeZone, Utc};
use tokio_rusqlite::Connection;
use tracing::info;

use crate::memory::core::config::RecallConfig;
use crate::memory::core::errors::{MemoryError, MemoryResult};
use crate::memory::core::ids::{OwnerKey, RecordId};
use crate::memory::core::record::{EmbeddingSet, EmotionMetadata, MemoryRecord};
use crate::memory::core::space::VectorSpace;
use crate::memory::storage::vector_store::{
    MemoryRecordLookup, SpaceHit, StoreFuture, TimeHit, TimeOrder, VectorStore,
};

const fn vector_column(space: VectorSpace) -> &'static str {
    match space {
        VectorSpace::Content => "content_vec",
        VectorSpace::Emotion => "emotion_vec",
        VectorSpace::Semantic => "semantic_vec",
    }
}

fn vector_to_blob(vector: &[f32]) -> Vec<u8> {
    vector.iter().flat_map(|v| v.to_le_bytes()).collect()
}

fn blob_to_vector(blob: &[u8]) -> MemoryResult<Vec<f32>> {
    if blob.len() % 4 != 0 {
        return Err(MemoryError::InvalidRecord(format!(
            "vector blob length {} is not a multiple of 4",
            blob.len()
        )));
    }
    Ok(blob
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect())
}

fn millis_to_datetime(ms: i64) -> MemoryResult<DateTime<Utc>> {
    Utc.timestamp_millis_opt(ms)
        .single()
        .ok_or_else(|| MemoryError::InvalidRecord(format!("invalid timestamp {ms}")))
}

fn to_sql_limit(value: usize) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

/// Row as read from `SQLite`, decoded outside the connection thread.
struct RawRecord {
    id: String,
    owner_key: String,
    content: String,
    ts_ms: i64,
    content_vec: Vec<u8>,
    emotion_vec: Vec<u8>,
    semantic_vec: Vec<u8>,
    emotion_json: String,
    importance: f64,
}

impl RawRecord {
    const COLUMNS: &'static str = "id, owner_key, content, ts_ms, content_vec, emotion_vec, \
                                   semantic_vec, emotion_json, importance";

    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            owner_key: row.get(1)?,
            content: row.get(2)?,
            ts_ms: row.get(3)?,
            content_vec: row.get(4)?,
            emotion_vec: row.get(5)?,
            semantic_vec: row.get(6)?,
            emotion_json: row.get(7)?,
            importance: row.get(8)?,
        })
    }

    #[allow(clippy::cast_possible_truncation)] // importance is stored from an f32
    fn into_record(self) -> MemoryResult<MemoryRecord> {
        let id = RecordId::from_str(&self.id)
            .map_err(|err| MemoryError::InvalidRecord(format!("invalid record id: {err}")))?;
        let owner = OwnerKey::from_str(&self.owner_key)?;
        let emotion: EmotionMetadata = serde_json::from_str(&self.emotion_json)?;
        Ok(MemoryRecord {
            id,
            owner,
            content: self.content,
            timestamp: millis_to_datetime(self.ts_ms)?,
            embeddings: EmbeddingSet {
                content: blob_to_vector(&self.content_vec)?,
                emotion: blob_to_vector(&self.emotion_vec)?,
                semantic: blob_to_vector(&self.semantic_vec)?,
            },
            emotion,
            importance: self.importance as f32,
        })
    }
}

/// SQLite-backed record store.
pub struct SqliteMemoryStore {
    conn: Connection,
    table: String,
    ndims: usize,
}

impl SqliteMemoryStore {
    /// Open (and create if needed) the record table.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or the schema cannot be created.
    ///
    /// # Note
    /// Call `init_sqlite_vec_extension()` first; searches depend on it.
    pub async fn new(config: &RecallConfig) -> MemoryResult<Self> {
        config.validate()?;
        let conn = Connection::open(&config.storage.sqlite_path).await?;
        let table = config.storage.table.clone();
        let table_name = table.clone();

        conn.call(move |conn| {
            conn.execute_batch(&format!(
                "CREATE TABLE IF NOT EXISTS {table_name} (
                    id TEXT PRIMARY KEY,
                    owner_key TEXT NOT NULL,
                    content TEXT NOT NULL,
                    ts_ms INTEGER NOT NULL,
                    content_vec BLOB NOT NULL,
                    emotion_vec BLOB NOT NULL,
                    semantic_vec BLOB NOT NULL,
                    emotion_json TEXT NOT NULL,
                    importance REAL NOT NULL
                );
                CREATE INDEX IF NOT EXISTS {table_name}_owner_ts
                    ON {table_name} (owner_key, ts_ms);"
            ))?;
            Ok(())
        })
        .await?;

        info!(
            table = %table,
            path = %config.storage.sqlite_path.display(),
            "Opened sqlite memory store"
        );

        Ok(Self {
            conn,
            table,
            ndims: config.embedding.ndims,
        })
    }

    /// Insert or update a record. An id already owned by another partition is rejected.
    ///
    /// # Errors
    /// Returns an error if the record is invalid or the write fails.
    pub async fn upsert(&self, record: MemoryRecord) -> MemoryResult<()> {
        record.validate(Some(self.ndims))?;
        let table = self.table.clone();
        let id = record.id;
        let emotion_json = serde_json::to_string(&record.emotion)?;

        let changed = self
            .conn
            .call(move |conn| {
                let changed = conn.execute(
                    &format!(
                        "INSERT INTO {table} (id, owner_key, content, ts_ms, content_vec,
                             emotion_vec, semantic_vec, emotion_json, importance)
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                         ON CONFLICT(id) DO UPDATE SET
                             content = excluded.content,
                             ts_ms = excluded.ts_ms,
                             content_vec = excluded.content_vec,
                             emotion_vec = excluded.emotion_vec,
                             semantic_vec = excluded.semantic_vec,
                             emotion_json = excluded.emotion_json,
                             importance = excluded.importance
                         WHERE owner_key = excluded.owner_key"
                    ),
                    rusqlite::params![
                        record.id,
                        record.owner,
                        record.content,
                        record.timestamp.timestamp_millis(),
                        vector_to_blob(&record.embeddings.content),
                        vector_to_blob(&record.embeddings.emotion),
                        vector_to_blob(&record.embeddings.semantic),
                        emotion_json,
                        f64::from(record.importance),
                    ],
                )?;
                Ok(changed)
            })
            .await?;

        if changed == 0 {
            return Err(MemoryError::InvalidRecord(format!(
                "record {id} already belongs to another owner"
            )));
        }
        Ok(())
    }
}

impl VectorStore for SqliteMemoryStore {
    fn search<'a>(
        &'a self,
        owner: &'a OwnerKey,
        space: VectorSpace,
        query: &'a [f32],
        top_k: usize,
    ) -> StoreFuture<'a, MemoryResult<Vec<SpaceHit>>> {
        Box::pin(async move {
            if query.len() != self.ndims {
                return Err(MemoryError::InvalidConfig(format!(
                    "query vector has {} dims, store schema is {}",
                    query.len(),
                    self.ndims
                )));
            }

            let table = self.table.clone();
            let column = vector_column(space);
            let partition = owner.partition();
            let blob = vector_to_blob(query);
            let limit = to_sql_limit(top_k);

            let rows = self
                .conn
                .call(move |conn| {
                    let mut stmt = conn.prepare(&format!(
                        "SELECT id, vec_distance_cosine({column}, ?2) AS distance
                         FROM {table}
                         WHERE owner_key = ?1
                         ORDER BY distance ASC, ts_ms DESC, id ASC
                         LIMIT ?3"
                    ))?;
                    let rows = stmt
                        .query_map(rusqlite::params![partition, blob, limit], |row| {
                            Ok((row.get::<_, String>(0)?, row.get::<_, Option<f64>>(1)?))
                        })?
                        .collect::<Result<Vec<_>, rusqlite::Error>>()?;
                    Ok(rows)
                })
                .await?;

            let mut hits = Vec::with_capacity(rows.len());
            for (id, distance) in rows {
                let Some(distance) = distance.filter(|d| d.is_finite()) else {
                    continue;
                };
                let record_id = RecordId::from_str(&id).map_err(|err| {
                    MemoryError::InvalidRecord(format!("invalid record id: {err}"))
                })?;
                hits.push(SpaceHit {
                    record_id,
                    similarity: 1.0 - distance,
                });
            }
            Ok(hits)
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
            let table = self.table.clone();
            let partition = owner.partition();
            let filter = content_filter.map(str::to_lowercase);
            let direction = match order {
                TimeOrder::Ascending => "ASC",
                TimeOrder::Descending => "DESC",
            };
            let limit = to_sql_limit(limit);

            let rows = self
                .conn
                .call(move |conn| {
                    let mut stmt = conn.prepare(&format!(
                        "SELECT id, ts_ms FROM {table}
                         WHERE owner_key = ?1
                           AND (?2 IS NULL OR instr(lower(content), ?2) > 0)
                         ORDER BY ts_ms {direction}, id ASC
                         LIMIT ?3"
                    ))?;
                    let rows = stmt
                        .query_map(rusqlite::params![partition, filter, limit], |row| {
                            Ok((row.get::<_, RecordId>(0)?, row.get::<_, i64>(1)?))
                        })?
                        .collect::<Result<Vec<_>, rusqlite::Error>>()?;
                    Ok(rows)
                })
                .await?;

            rows.into_iter()
                .map(|(record_id, ts_ms)| -> MemoryResult<TimeHit> {
                    Ok(TimeHit {
                        record_id,
                        timestamp: millis_to_datetime(ts_ms)?,
                    })
                })
                .collect()
        })
    }
}

impl MemoryRecordLookup for SqliteMemoryStore {
    fn get(&self, id: RecordId) -> StoreFuture<'_, MemoryResult<Option<MemoryRecord>>> {
        Box::pin(async move {
            let mut records = self.get_many(vec![id]).await?;
            Ok(records.pop())
        })
    }

    fn get_many(&self, ids: Vec<RecordId>) -> StoreFuture<'_, MemoryResult<Vec<MemoryRecord>>> {
        Box::pin(async move {
            if ids.is_empty() {
                return Ok(Vec::new());
            }

            let table = self.table.clone();
            let placeholders = (0..ids.len())
                .map(|i| format!("?{}", i + 1))
                .collect::<Vec<_>>()
                .join(", ");

            let raw = self
                .conn
                .call(move |conn| {
                    let mut stmt = conn.prepare(&format!(
                        "SELECT {} FROM {table} WHERE id IN ({placeholders})",
                        RawRecord::COLUMNS
                    ))?;
                    let rows = stmt
                        .query_map(rusqlite::params_from_iter(ids.iter()), RawRecord::from_row)?
                        .collect::<Result<Vec<_>, rusqlite::Error>>()?;
                    Ok(rows)
                })
                .await?;

            raw.into_iter().map(RawRecord::into_record).collect()
        })
    }
}
