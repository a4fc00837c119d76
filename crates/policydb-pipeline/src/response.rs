use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use policydb_core::types::{DecisionStatus, DocumentId, RankedClause, TraceRecord};

/// Transport-facing request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryRequest {
    pub text: String,
    #[serde(default)]
    pub document_scope: Option<BTreeSet<DocumentId>>,
}

impl QueryRequest {
    pub fn new(text: impl Into<String>) -> Self { Self { text: text.into(), document_scope: None } }

    pub fn scoped<I, S>(mut self, documents: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<DocumentId>,
    {
        self.document_scope = Some(documents.into_iter().map(Into::into).collect());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupportingClause {
    pub document_name: String,
    pub clause_text: String,
    pub relevance_score: f32,
}

impl From<&RankedClause> for SupportingClause {
    fn from(c: &RankedClause) -> Self {
        Self { document_name: c.document_id.clone(), clause_text: c.text.clone(), relevance_score: c.fused_score }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResponse {
    pub status: DecisionStatus,
    pub amount: Option<f64>,
    pub confidence: f32,
    pub justification: String,
    pub supporting_clauses: Vec<SupportingClause>,
    pub trace_id: String,
    pub processing_time_ms: u64,
}

impl QueryResponse {
    pub fn from_trace(trace: &TraceRecord, processing_time_ms: u64) -> Self {
        let decision = &trace.decision;
        let supporting_clauses = decision
            .supporting_clauses
            .iter()
            .filter_map(|id| trace.retrieved_clauses.iter().find(|c| &c.chunk_id == id))
            .map(SupportingClause::from)
            .collect();
        Self {
            status: decision.status,
            amount: decision.amount,
            confidence: decision.confidence,
            justification: decision.justification.clone(),
            supporting_clauses,
            trace_id: trace.trace_id.clone(),
            processing_time_ms,
        }
    }
}
