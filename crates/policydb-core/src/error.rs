use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Inconsistent weights: {dense_name}={dense} + {sparse_name}={sparse} must sum to 1")]
    InconsistentWeights {
        dense_name: &'static str,
        dense: f32,
        sparse_name: &'static str,
        sparse: f32,
    },

    #[error("Rule configuration error in '{rule_id}': {reason}")]
    RuleConfig { rule_id: String, reason: String },

    #[error("{stage} timed out after {after:?}")]
    IndexTimeout { stage: &'static str, after: Duration },

    #[error("Embedding failed: {0}")]
    Embedding(String),

    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Query cancelled before decision synthesis")]
    Cancelled,

    #[error("Operation failed: {0}")]
    Operation(String),
}

impl Error {
    /// Errors worth retrying once before degrading.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::IndexTimeout { .. } | Error::Embedding(_))
    }

    pub fn rule_config(rule_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::RuleConfig { rule_id: rule_id.into(), reason: reason.into() }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
