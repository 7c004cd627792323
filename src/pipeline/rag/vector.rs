use serde::{Deserialize, Serialize};

use super::RagError;
use crate::models::{Chunk, SearchHit};

/// Chunk embeddings, row `i` belonging to chunk `i`. Exact search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorIndex {
    dimension: usize,
    vectors: Vec<Vec<f32>>,
}

impl VectorIndex {
    pub fn new(dimension: usize, vectors: Vec<Vec<f32>>) -> Result<Self, RagError> {
        if let Some(bad) = vectors.iter().find(|v| v.len() != dimension) {
            return Err(RagError::DimensionMismatch {
                expected: dimension,
                actual: bad.len(),
            });
        }
        Ok(Self { dimension, vectors })
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    /// `(row, squared L2 distance)` of the `k` closest rows, nearest first;
    /// equal distances keep row order.
    pub fn nearest(&self, query: &[f32], k: usize) -> Result<Vec<(usize, f32)>, RagError> {
        if query.len() != self.dimension {
            return Err(RagError::DimensionMismatch {
                expected: self.dimension,
                actual: query.len(),
            });
        }

        let mut ranked: Vec<(usize, f32)> = self
            .vectors
            .iter()
            .enumerate()
            .map(|(idx, v)| (idx, squared_l2(query, v)))
            .collect();
        ranked.sort_by(|a, b| a.1.total_cmp(&b.1));
        ranked.truncate(k);
        Ok(ranked)
    }
}

pub fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

/// Top `k` chunks nearest to `query_vector`, smallest distance first.
///
/// A missing or empty index, or one that does not line up with the query
/// or the corpus, yields no hits instead of an error.
pub fn vector_search(
    index: Option<&VectorIndex>,
    chunks: &[Chunk],
    query_vector: &[f32],
    k: usize,
) -> Vec<SearchHit> {
    let Some(index) = index.filter(|i| !i.is_empty()) else {
        return Vec::new();
    };
    if index.len() != chunks.len() {
        tracing::warn!(
            vectors = index.len(),
            chunks = chunks.len(),
            "Vector index does not match corpus, skipping"
        );
        return Vec::new();
    }

    match index.nearest(query_vector, k) {
        Ok(ranked) => ranked
            .into_iter()
            .map(|(idx, distance)| SearchHit::vector(chunks[idx].clone(), distance))
            .collect(),
        Err(e) => {
            tracing::warn!(error = %e, "Vector search skipped");
            Vec::new()
        }
    }
}
