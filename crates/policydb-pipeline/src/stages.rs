//! The individual pipeline stages. Each consumes the previous stage's output
//! and returns a new value; the async ones run their work on the blocking
//! pool under a timeout.
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use policydb_core::error::{Error, Result};
use policydb_core::traits::{Embedder, RuleEvaluator};
use policydb_core::types::{DocumentId, Entities, RankedClause, RuleOutcome};
use policydb_decision::Retrieval;
use policydb_hybrid::{HybridRanker, IndexSnapshot};

use crate::cancel::CancelToken;

async fn embed_once(embedder: Arc<dyn Embedder>, text: String, timeout: Duration) -> Result<Vec<f32>> {
    let dim = embedder.dim();
    let task = tokio::task::spawn_blocking(move || embedder.embed_batch(&[text]));
    match tokio::time::timeout(timeout, task).await {
        Err(_) => Err(Error::IndexTimeout { stage: "embedding", after: timeout }),
        Ok(Err(join)) => Err(Error::Embedding(join.to_string())),
        Ok(Ok(Err(e))) => Err(Error::Embedding(e.to_string())),
        Ok(Ok(Ok(mut vectors))) => {
            let vector = vectors.pop().ok_or_else(|| Error::Embedding("embedder returned no vector".into()))?;
            if vector.len() != dim { return Err(Error::DimensionMismatch { expected: dim, actual: vector.len() }); }
            Ok(vector)
        }
    }
}

/// Query embedding with one retry after `backoff`. `Ok(None)` means both
/// attempts failed and retrieval should fall back to sparse-only ranking.
pub async fn embed_query(
    embedder: Arc<dyn Embedder>,
    text: &str,
    timeout: Duration,
    backoff: Duration,
    cancel: &CancelToken,
) -> Result<Option<Vec<f32>>> {
    for attempt in 1..=2 {
        cancel.check()?;
        match embed_once(embedder.clone(), text.to_string(), timeout).await {
            Ok(vector) => return Ok(Some(vector)),
            Err(e) if attempt == 1 && e.is_retryable() => {
                tracing::warn!(error = %e, ?backoff, "query embedding failed; retrying");
                tokio::time::sleep(backoff).await;
            }
            Err(e) => {
                tracing::warn!(error = %e, attempt, "query embedding unavailable; degrading to sparse retrieval");
                return Ok(None);
            }
        }
    }
    Ok(None)
}

/// Ranks clauses from `snapshot`. A missing or unusable query vector
/// degrades to sparse-only ranking instead of failing the query.
pub fn retrieve(
    ranker: &HybridRanker,
    snapshot: &IndexSnapshot,
    text: &str,
    vector: Option<&[f32]>,
    scope: Option<&BTreeSet<DocumentId>>,
) -> (Vec<RankedClause>, Retrieval) {
    if let Some(v) = vector {
        match ranker.rank(text, Some(v), snapshot, scope) {
            Ok(ranked) => return (ranked, Retrieval::Full),
            Err(e) => tracing::warn!(error = %e, "dense ranking failed; degrading to sparse retrieval"),
        }
    }
    match ranker.rank(text, None, snapshot, scope) {
        Ok(ranked) => (ranked, Retrieval::Degraded),
        Err(e) => {
            tracing::warn!(error = %e, "sparse ranking failed");
            (Vec::new(), Retrieval::Degraded)
        }
    }
}

/// Runs the rule evaluator on the blocking pool under `timeout`.
pub async fn evaluate_rules(
    evaluator: Arc<dyn RuleEvaluator>,
    entities: Entities,
    clauses: Vec<RankedClause>,
    timeout: Duration,
) -> Result<Vec<RuleOutcome>> {
    let task = tokio::task::spawn_blocking(move || evaluator.evaluate(&entities, &clauses));
    match tokio::time::timeout(timeout, task).await {
        Err(_) => Err(Error::IndexTimeout { stage: "rule evaluation", after: timeout }),
        Ok(Err(join)) => Err(Error::Operation(format!("rule evaluation aborted: {join}"))),
        Ok(Ok(outcomes)) => Ok(outcomes),
    }
}
