use std::cmp::Ordering;
use std::collections::BTreeSet;

use policydb_core::config::RetrievalConfig;
use policydb_core::error::Result;
use policydb_core::types::{DocumentId, RankedClause};

use crate::snapshot::IndexSnapshot;

/// Weighted sum of the two normalized scores.
pub fn fuse(dense_weight: f32, sparse_weight: f32, dense: f32, sparse: f32) -> f32 {
    dense_weight * dense + sparse_weight * sparse
}

/// Ranks snapshot chunks by fused dense and sparse similarity.
#[derive(Debug, Clone)]
pub struct HybridRanker { config: RetrievalConfig }

impl HybridRanker {
    /// Fails with `InconsistentWeights` unless the weights are non-negative
    /// and sum to one.
    pub fn new(config: RetrievalConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &RetrievalConfig { &self.config }

    pub fn fuse(&self, dense: f32, sparse: f32) -> f32 {
        fuse(self.config.dense_weight, self.config.sparse_weight, dense, sparse)
    }

    /// Scores every candidate chunk and returns those at or above the
    /// similarity threshold, best first, at most `max_results`.
    ///
    /// Without a query vector the ranking is sparse-only: dense scores are
    /// reported as 0 and `fused = sparse`.
    pub fn rank(
        &self,
        query_text: &str,
        query_vector: Option<&[f32]>,
        snapshot: &IndexSnapshot,
        scope: Option<&BTreeSet<DocumentId>>,
    ) -> Result<Vec<RankedClause>> {
        let dense_scores = match query_vector {
            Some(v) => Some(snapshot.dense.score_all(v)?),
            None => None,
        };
        let query_terms = snapshot.sparse.query_terms(query_text);

        let mut ranked: Vec<RankedClause> = snapshot
            .chunks
            .values()
            .filter(|c| scope.map_or(true, |s| s.contains(&c.document_id)))
            .filter_map(|chunk| {
                let sparse = snapshot.sparse.score(&query_terms, &chunk.id);
                let (dense, fused) = match &dense_scores {
                    Some(scores) => {
                        let dense = scores.get(&chunk.id).copied().unwrap_or(0.0);
                        (dense, self.fuse(dense, sparse))
                    }
                    None => (0.0, sparse),
                };
                (fused >= self.config.similarity_threshold).then(|| RankedClause {
                    chunk_id: chunk.id.clone(),
                    document_id: chunk.document_id.clone(),
                    position: chunk.position,
                    text: chunk.text.clone(),
                    dense_score: dense,
                    sparse_score: sparse,
                    fused_score: fused,
                    rank: 0,
                })
            })
            .collect();

        ranked.sort_by(compare_clauses);
        ranked.truncate(self.config.max_results);
        for (i, clause) in ranked.iter_mut().enumerate() { clause.rank = i + 1; }
        tracing::debug!(
            generation = snapshot.generation,
            candidates = snapshot.len(),
            returned = ranked.len(),
            degraded = query_vector.is_none(),
            "ranked clauses"
        );
        Ok(ranked)
    }
}

fn compare_clauses(a: &RankedClause, b: &RankedClause) -> Ordering {
    b.fused_score
        .total_cmp(&a.fused_score)
        .then_with(|| a.position.cmp(&b.position))
        .then_with(|| a.document_id.cmp(&b.document_id))
        .then_with(|| a.chunk_id.cmp(&b.chunk_id))
}
