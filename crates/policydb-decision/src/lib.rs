//! policydb-decision
//!
//! Turns rule outcomes and ranked clauses into a [`Decision`], and keeps the
//! append-only audit trail that links each decision to its evidence.
//!
//! [`Decision`]: policydb_core::types::Decision
pub mod synth;
pub mod trace;

pub use synth::{ClauseAmountEstimator, DecisionSynthesizer, Retrieval};
pub use trace::{build_trace, AuditReport, DecisionStatistics, LinkedClause, ReportPeriod, StatusCounts, TraceCoverage, TraceExport, TraceStore};
