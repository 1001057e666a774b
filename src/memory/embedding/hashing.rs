//! Deterministic feature-hashing embedder.
//!
//! Tokens are lowercased, hashed with FNV-1a into `ndims` signed buckets and the
//! result is L2-normalized. Same text always yields the same vector and texts
//! sharing words have positive cosine similarity, which is all offline runs and
//! tests need. Records written for this embedder must use the same `ndims`.

use crate::memory::core::errors::MemoryResult;
use crate::memory::core::space::VectorSpace;
use crate::memory::embedding::embedder::{EmbedFuture, QueryEmbedder};

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

fn fnv1a(bytes: &[u8]) -> u64 {
    bytes
        .iter()
        .fold(FNV_OFFSET, |hash, b| (hash ^ u64::from(*b)).wrapping_mul(FNV_PRIME))
}

/// Offline embedder; identical across spaces.
#[derive(Clone, Debug)]
pub struct HashingEmbedder {
    ndims: usize,
}

impl HashingEmbedder {
    /// Create an embedder producing `ndims`-dimensional vectors (at least 1).
    #[must_use]
    pub fn new(ndims: usize) -> Self {
        Self {
            ndims: ndims.max(1),
        }
    }

    /// Embed text synchronously.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)] // bucket index is reduced modulo ndims
    pub fn embed(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0_f32; self.ndims];
        for token in text
            .split(|c: char| !c.is_alphanumeric() && c != '\'')
            .filter(|t| !t.is_empty())
        {
            let hash = fnv1a(token.to_lowercase().as_bytes());
            let bucket = (hash % self.ndims as u64) as usize;
            let sign = if hash >> 63 == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }
        vector
    }
}

impl QueryEmbedder for HashingEmbedder {
    fn embed_query<'a>(
        &'a self,
        _space: VectorSpace,
        text: &'a str,
    ) -> EmbedFuture<'a, MemoryResult<Vec<f32>>> {
        let vector = self.embed(text);
        Box::pin(async move { Ok(vector) })
    }

    fn ndims(&self) -> usize {
        self.ndims
    }
}
