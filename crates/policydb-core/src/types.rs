//! Domain types shared by the indexes, the rule engine and the decision stages.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

pub type ChunkId = String;
pub type DocumentId = String;

/// A retrievable unit of policy text.
///
/// - `id`: globally unique chunk identifier (`<document_id>:<position>`)
/// - `document_id`: stable document identity (file stem or external id)
/// - `position`: ordinal of the chunk inside its document, used for tie-breaks
/// - `overlap_with`: chunks that share overlapping text with this one
///
/// Chunks are never mutated after ingestion; a document is replaced by
/// removing it and ingesting it again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: ChunkId,
    pub document_id: DocumentId,
    pub text: String,
    pub position: usize,
    #[serde(default)]
    pub overlap_with: BTreeSet<ChunkId>,
}

impl Chunk {
    pub fn new(document_id: &str, position: usize, text: impl Into<String>) -> Self {
        Self {
            id: format!("{document_id}:{position}"),
            document_id: document_id.to_string(),
            text: text.into(),
            position,
            overlap_with: BTreeSet::new(),
        }
    }
}

/// Embedding of a single chunk. Owned by the dense index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DenseVector {
    pub chunk_id: ChunkId,
    pub vector: Vec<f32>,
}

impl DenseVector {
    pub fn dimension(&self) -> usize {
        self.vector.len()
    }
}

/// Term-frequency mapping of a single chunk. Owned by the sparse index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SparseVector {
    pub chunk_id: ChunkId,
    pub term_weights: BTreeMap<String, f32>,
}

impl SparseVector {
    /// Total number of analyzed tokens in the chunk.
    pub fn length(&self) -> f32 {
        self.term_weights.values().sum()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Age,
    Gender,
    Procedure,
    Location,
    PolicyDurationDays,
    ClaimAmount,
}

impl EntityKind {
    pub const ALL: [EntityKind; 6] = [
        EntityKind::Age,
        EntityKind::Gender,
        EntityKind::Procedure,
        EntityKind::Location,
        EntityKind::PolicyDurationDays,
        EntityKind::ClaimAmount,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            EntityKind::Age => "age",
            EntityKind::Gender => "gender",
            EntityKind::Procedure => "procedure",
            EntityKind::Location => "location",
            EntityKind::PolicyDurationDays => "policy_duration_days",
            EntityKind::ClaimAmount => "claim_amount",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gender {
    Male,
    Female,
    Other,
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Gender::Male => "male",
            Gender::Female => "female",
            Gender::Other => "other",
        })
    }
}

/// Entities extracted from a query. Every field is optional: a kind that
/// could not be found is simply absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Entities {
    pub age: Option<u32>,
    pub gender: Option<Gender>,
    pub procedure: Option<String>,
    pub location: Option<String>,
    pub policy_duration_days: Option<u32>,
    pub claim_amount: Option<f64>,
}

impl Entities {
    pub fn has(&self, kind: EntityKind) -> bool {
        match kind {
            EntityKind::Age => self.age.is_some(),
            EntityKind::Gender => self.gender.is_some(),
            EntityKind::Procedure => self.procedure.is_some(),
            EntityKind::Location => self.location.is_some(),
            EntityKind::PolicyDurationDays => self.policy_duration_days.is_some(),
            EntityKind::ClaimAmount => self.claim_amount.is_some(),
        }
    }

    /// Kinds present in this extraction, in declaration order.
    pub fn present(&self) -> Vec<EntityKind> {
        EntityKind::ALL.into_iter().filter(|k| self.has(*k)).collect()
    }

    /// Kind → rendered value, for logs and trace output.
    pub fn to_map(&self) -> BTreeMap<EntityKind, String> {
        let mut out = BTreeMap::new();
        if let Some(v) = self.age { out.insert(EntityKind::Age, v.to_string()); }
        if let Some(v) = self.gender { out.insert(EntityKind::Gender, v.to_string()); }
        if let Some(v) = &self.procedure { out.insert(EntityKind::Procedure, v.clone()); }
        if let Some(v) = &self.location { out.insert(EntityKind::Location, v.clone()); }
        if let Some(v) = self.policy_duration_days { out.insert(EntityKind::PolicyDurationDays, v.to_string()); }
        if let Some(v) = self.claim_amount { out.insert(EntityKind::ClaimAmount, format!("{v:.2}")); }
        out
    }
}

/// A parsed request. Immutable once extraction has run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Query {
    pub raw_text: String,
    pub entities: Entities,
    pub timestamp: DateTime<Utc>,
    /// Restricts retrieval to these documents when set.
    #[serde(default)]
    pub document_scope: Option<BTreeSet<DocumentId>>,
}

/// A clause scored against one query.
///
/// `dense_score` and `sparse_score` are both in `[0, 1]`; `fused_score` is
/// their weighted combination. `rank` starts at 1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedClause {
    pub chunk_id: ChunkId,
    pub document_id: DocumentId,
    pub position: usize,
    pub text: String,
    pub dense_score: f32,
    pub sparse_score: f32,
    pub fused_score: f32,
    pub rank: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Pass,
    RequireReview,
    Block,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Outcome::Pass => "pass",
            Outcome::RequireReview => "require_review",
            Outcome::Block => "block",
        })
    }
}

/// Verdict of one rule for one query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleOutcome {
    pub rule_id: String,
    pub outcome: Outcome,
    pub terminal: bool,
    /// Share of this rule in the confidence rule component.
    #[serde(default = "unit_weight")]
    pub weight: f32,
    /// True when the rule was short-circuited by an earlier terminal block.
    #[serde(default)]
    pub skipped: bool,
    /// Human-readable condition, e.g. "age between 18 and 80".
    pub condition: String,
    pub detail: String,
}

fn unit_weight() -> f32 {
    1.0
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionStatus {
    Approved,
    Rejected,
    Pending,
    RequiresReview,
}

impl fmt::Display for DecisionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DecisionStatus::Approved => "approved",
            DecisionStatus::Rejected => "rejected",
            DecisionStatus::Pending => "pending",
            DecisionStatus::RequiresReview => "requires_review",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub status: DecisionStatus,
    pub amount: Option<f64>,
    pub confidence: f32,
    pub justification: String,
    pub supporting_clauses: Vec<ChunkId>,
}

/// Append-only audit entry linking a decision to its evidence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceRecord {
    pub trace_id: String,
    pub created_at: DateTime<Utc>,
    pub query: Query,
    pub decision: Decision,
    pub rule_outcomes: Vec<RuleOutcome>,
    pub retrieved_clauses: Vec<RankedClause>,
}
