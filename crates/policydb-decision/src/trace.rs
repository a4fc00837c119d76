use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use uuid::Uuid;

use policydb_core::types::{ChunkId, Decision, DecisionStatus, DocumentId, Query, RankedClause, RuleOutcome, TraceRecord};

/// Confidence above which a decision counts as high confidence.
pub const HIGH_CONFIDENCE: f32 = 0.7;

/// Snapshot of a decision and its evidence under a fresh v4 trace id.
/// Inputs are cloned, never modified.
pub fn build_trace(query: &Query, decision: &Decision, outcomes: &[RuleOutcome], clauses: &[RankedClause]) -> TraceRecord {
    TraceRecord {
        trace_id: Uuid::new_v4().to_string(),
        created_at: Utc::now(),
        query: query.clone(),
        decision: decision.clone(),
        rule_outcomes: outcomes.to_vec(),
        retrieved_clauses: clauses.to_vec(),
    }
}

/// Decisions per status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub approved: usize,
    pub rejected: usize,
    pub pending: usize,
    pub requires_review: usize,
}

impl StatusCounts {
    fn add(&mut self, status: DecisionStatus) {
        match status {
            DecisionStatus::Approved => self.approved += 1,
            DecisionStatus::Rejected => self.rejected += 1,
            DecisionStatus::Pending => self.pending += 1,
            DecisionStatus::RequiresReview => self.requires_review += 1,
        }
    }

    pub fn total(&self) -> usize { self.approved + self.rejected + self.pending + self.requires_review }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DecisionStatistics {
    pub total_decisions: usize,
    pub distribution: StatusCounts,
    /// 0 when nothing has been decided.
    pub average_confidence: f32,
    pub high_confidence_decisions: usize,
}

/// Inclusive time window of a report. An open end is unbounded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ReportPeriod {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl ReportPeriod {
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.start.map_or(true, |s| s <= at) && self.end.map_or(true, |e| at <= e)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TraceCoverage {
    /// Share of decisions in the period citing at least one clause.
    pub decision_coverage: f32,
    /// Share of indexed chunks cited by some decision in the period.
    pub clause_coverage: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditReport {
    pub period: ReportPeriod,
    pub total_decisions: usize,
    pub decisions: StatusCounts,
    /// Decisions citing each document, most cited first.
    pub document_usage: Vec<(DocumentId, usize)>,
    pub coverage: TraceCoverage,
}

/// A cited clause and every trace that cited it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LinkedClause {
    pub clause: RankedClause,
    pub cited_by: Vec<String>,
}

/// A trace with its evidence, ready for external analysis.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TraceExport {
    pub trace: TraceRecord,
    pub linked_clauses: Vec<LinkedClause>,
    pub exported_at: DateTime<Utc>,
}

fn share(part: usize, whole: usize) -> f32 { if whole == 0 { 0.0 } else { part as f32 / whole as f32 } }

#[derive(Debug, Default)]
struct TraceIndex {
    records: HashMap<String, Arc<TraceRecord>>,
    by_chunk: HashMap<ChunkId, Vec<String>>,
    by_document: HashMap<DocumentId, Vec<String>>,
}

/// Append-only store of [`TraceRecord`]s with chunk ↔ trace lookups.
#[derive(Debug, Default)]
pub struct TraceStore { inner: RwLock<TraceIndex> }

impl TraceStore {
    pub fn new() -> Self { Self::default() }

    pub fn append(&self, record: TraceRecord) -> Arc<TraceRecord> {
        let record = Arc::new(record);
        let id = record.trace_id.clone();
        let mut index = self.inner.write();
        let chunks: BTreeSet<&ChunkId> = record.retrieved_clauses.iter().map(|c| &c.chunk_id).collect();
        for chunk in chunks { index.by_chunk.entry(chunk.clone()).or_default().push(id.clone()); }
        let documents: BTreeSet<&DocumentId> = record.retrieved_clauses.iter().map(|c| &c.document_id).collect();
        for doc in documents { index.by_document.entry(doc.clone()).or_default().push(id.clone()); }
        index.records.insert(id.clone(), record.clone());
        tracing::debug!(trace_id = %id, status = %record.decision.status, "trace recorded");
        record
    }

    /// Builds and appends a record in one step.
    pub fn record(&self, query: &Query, decision: &Decision, outcomes: &[RuleOutcome], clauses: &[RankedClause]) -> Arc<TraceRecord> {
        self.append(build_trace(query, decision, outcomes, clauses))
    }

    pub fn get(&self, trace_id: &str) -> Option<Arc<TraceRecord>> { self.inner.read().records.get(trace_id).cloned() }

    /// Trace ids that cited `chunk_id`, oldest first.
    pub fn traces_citing(&self, chunk_id: &str) -> Vec<String> {
        self.inner.read().by_chunk.get(chunk_id).cloned().unwrap_or_default()
    }

    pub fn traces_citing_document(&self, document_id: &str) -> Vec<String> {
        self.inner.read().by_document.get(document_id).cloned().unwrap_or_default()
    }

    /// Chunk ids a trace cited, in rank order.
    pub fn chunks_cited_by(&self, trace_id: &str) -> Option<Vec<ChunkId>> {
        self.get(trace_id).map(|r| r.retrieved_clauses.iter().map(|c| c.chunk_id.clone()).collect())
    }

    /// Decisions recorded in `period`, with per-document usage and how much
    /// of an index of `indexed_chunks` chunks they cite.
    pub fn report(&self, period: ReportPeriod, indexed_chunks: usize) -> AuditReport {
        let index = self.inner.read();
        let mut decisions = StatusCounts::default();
        let mut usage: BTreeMap<&DocumentId, usize> = BTreeMap::new();
        let mut cited: BTreeSet<&ChunkId> = BTreeSet::new();
        let mut traced = 0;
        let in_period = index.records.values().filter(|r| period.contains(r.created_at));
        for record in in_period {
            decisions.add(record.decision.status);
            if !record.retrieved_clauses.is_empty() { traced += 1; }
            cited.extend(record.retrieved_clauses.iter().map(|c| &c.chunk_id));
            let documents: BTreeSet<&DocumentId> = record.retrieved_clauses.iter().map(|c| &c.document_id).collect();
            for doc in documents { *usage.entry(doc).or_insert(0) += 1; }
        }
        let mut document_usage: Vec<(DocumentId, usize)> = usage.into_iter().map(|(d, n)| (d.clone(), n)).collect();
        document_usage.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        let total_decisions = decisions.total();
        let report = AuditReport {
            period,
            total_decisions,
            decisions,
            document_usage,
            coverage: TraceCoverage {
                decision_coverage: share(traced, total_decisions),
                clause_coverage: share(cited.len(), indexed_chunks).min(1.0),
            },
        };
        tracing::debug!(decisions = total_decisions, documents = report.document_usage.len(), "audit report built");
        report
    }

    pub fn statistics(&self) -> DecisionStatistics {
        let index = self.inner.read();
        let mut distribution = StatusCounts::default();
        let mut confidence_sum = 0.0f32;
        let mut high = 0;
        for record in index.records.values() {
            distribution.add(record.decision.status);
            confidence_sum += record.decision.confidence;
            if record.decision.confidence > HIGH_CONFIDENCE { high += 1; }
        }
        let total = index.records.len();
        DecisionStatistics {
            total_decisions: total,
            distribution,
            average_confidence: if total == 0 { 0.0 } else { confidence_sum / total as f32 },
            high_confidence_decisions: high,
        }
    }

    /// The trace, each clause it cited with every trace citing that clause,
    /// and the export time. `None` for an unknown id.
    pub fn export(&self, trace_id: &str) -> Option<TraceExport> {
        let index = self.inner.read();
        let record = index.records.get(trace_id)?;
        let linked_clauses = record
            .retrieved_clauses
            .iter()
            .map(|c| LinkedClause { clause: c.clone(), cited_by: index.by_chunk.get(&c.chunk_id).cloned().unwrap_or_default() })
            .collect();
        Some(TraceExport { trace: (**record).clone(), linked_clauses, exported_at: Utc::now() })
    }

    pub fn len(&self) -> usize { self.inner.read().records.len() }
    pub fn is_empty(&self) -> bool { self.inner.read().records.is_empty() }
}
