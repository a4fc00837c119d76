/// Opaque `text -> vector` function. Implementations must be deterministic
/// for identical input and return vectors of length `dim()`.
pub trait Embedder: Send + Sync {
    /// Stable identifier for the provider/model (e.g., `hashing:d384`).
    fn id(&self) -> &str;
    fn dim(&self) -> usize;
    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>>;
}

/// Derives a payable amount for an approved claim from the evidence.
///
/// Returning `None` means the amount could not be determined.
pub trait AmountEstimator: Send + Sync {
    fn estimate(&self, entities: &crate::types::Entities, clauses: &[crate::types::RankedClause]) -> Option<f64>;
}

/// Rule evaluation stage: one outcome per loaded rule, in evaluation order.
pub trait RuleEvaluator: Send + Sync {
    fn evaluate(&self, entities: &crate::types::Entities, clauses: &[crate::types::RankedClause]) -> Vec<crate::types::RuleOutcome>;
    fn rule_count(&self) -> usize;
}
