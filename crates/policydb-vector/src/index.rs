use std::collections::BTreeMap;

use policydb_core::error::{Error, Result};
use policydb_core::types::{ChunkId, DenseVector};

/// Cosine similarity; zero when either side has no magnitude.
pub fn cosine(a: &[f32], b: &[f32]) -> f32 {
    let mut dot = 0.0f32;
    let mut na = 0.0f32;
    let mut nb = 0.0f32;
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        na += x * x;
        nb += y * y;
    }
    if na <= 0.0 || nb <= 0.0 { return 0.0; }
    dot / (na.sqrt() * nb.sqrt())
}

/// Chunk embeddings, all of one dimension. The first vector inserted fixes
/// the dimension; every later insert and query must match it.
#[derive(Debug, Clone, Default)]
pub struct DenseIndex {
    dim: Option<usize>,
    vectors: BTreeMap<ChunkId, DenseVector>,
}

impl DenseIndex {
    pub fn new() -> Self { Self::default() }

    pub fn with_dimension(dim: usize) -> Self { Self { dim: Some(dim), vectors: BTreeMap::new() } }

    pub fn dimension(&self) -> Option<usize> { self.dim }

    pub fn insert(&mut self, vector: DenseVector) -> Result<()> {
        match self.dim {
            Some(expected) if expected != vector.dimension() => {
                return Err(Error::DimensionMismatch { expected, actual: vector.dimension() });
            }
            Some(_) => {}
            None => self.dim = Some(vector.dimension()),
        }
        self.vectors.insert(vector.chunk_id.clone(), vector);
        Ok(())
    }

    pub fn remove(&mut self, chunk_id: &str) -> Option<DenseVector> { self.vectors.remove(chunk_id) }

    pub fn get(&self, chunk_id: &str) -> Option<&DenseVector> { self.vectors.get(chunk_id) }
    pub fn len(&self) -> usize { self.vectors.len() }
    pub fn is_empty(&self) -> bool { self.vectors.is_empty() }

    /// Cosine rescaled from `[-1, 1]` to `[0, 1]`; 0 for unknown chunks.
    pub fn score(&self, query: &[f32], chunk_id: &str) -> f32 {
        self.vectors.get(chunk_id).map_or(0.0, |v| ((cosine(query, &v.vector) + 1.0) / 2.0).clamp(0.0, 1.0))
    }

    /// Scores every chunk against `query`.
    pub fn score_all(&self, query: &[f32]) -> Result<BTreeMap<ChunkId, f32>> {
        if let Some(expected) = self.dim {
            if expected != query.len() { return Err(Error::DimensionMismatch { expected, actual: query.len() }); }
        }
        Ok(self.vectors.keys().map(|id| (id.clone(), self.score(query, id))).collect())
    }
}
