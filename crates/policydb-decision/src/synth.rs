use std::fmt::Write as _;
use std::sync::Arc;

use policydb_core::config::DecisionConfig;
use policydb_core::error::Result;
use policydb_core::traits::AmountEstimator;
use policydb_core::types::{Decision, DecisionStatus, Entities, Outcome, RankedClause, RuleOutcome};
use policydb_rules::clauses::stated_coverage_limit;

/// Reads the coverage limit stated by the best-ranked clause that states
/// one, capped by the claimed amount when the query gives one.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClauseAmountEstimator;

impl AmountEstimator for ClauseAmountEstimator {
    fn estimate(&self, entities: &Entities, clauses: &[RankedClause]) -> Option<f64> {
        let limit = clauses.iter().find_map(|c| stated_coverage_limit(&c.text))?;
        Some(entities.claim_amount.map_or(limit, |claimed| claimed.min(limit)))
    }
}

/// Evidence state of the retrieval stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Retrieval {
    Full,
    /// Sparse-only ranking after the embedding stage failed.
    Degraded,
}

pub struct DecisionSynthesizer {
    config: DecisionConfig,
    estimator: Arc<dyn AmountEstimator>,
}

impl DecisionSynthesizer {
    pub fn new(config: DecisionConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config, estimator: Arc::new(ClauseAmountEstimator) })
    }

    pub fn with_estimator(mut self, estimator: Arc<dyn AmountEstimator>) -> Self {
        self.estimator = estimator;
        self
    }

    pub fn synthesize(&self, entities: &Entities, outcomes: &[RuleOutcome], clauses: &[RankedClause], retrieval: Retrieval) -> Decision {
        let terminal_block = outcomes.iter().any(|o| o.terminal && !o.skipped && o.outcome == Outcome::Block);
        let all_pass = outcomes.iter().all(|o| o.outcome == Outcome::Pass);
        let degraded = retrieval == Retrieval::Degraded;

        // Rejected and approved both cite at least one clause.
        let status = if clauses.is_empty() {
            if degraded { DecisionStatus::RequiresReview } else { DecisionStatus::Pending }
        } else if terminal_block {
            DecisionStatus::Rejected
        } else if all_pass && !degraded {
            DecisionStatus::Approved
        } else {
            DecisionStatus::RequiresReview
        };
        let amount = match status {
            DecisionStatus::Approved => self.estimator.estimate(entities, clauses),
            _ => None,
        };
        let confidence = self.confidence(clauses, Some(outcomes));
        let mut justification = justify(status, outcomes);
        if degraded {
            justification.push_str(" Retrieval degraded: semantic similarity was unavailable, clauses were matched by keywords only.");
        }
        if clauses.is_empty() && !degraded {
            justification.push_str(" No policy clause cleared the similarity threshold.");
        }
        self.append_excerpt(&mut justification, clauses);

        tracing::debug!(%status, confidence, clauses = clauses.len(), degraded, "decision synthesized");
        Decision { status, amount, confidence, justification, supporting_clauses: clauses.iter().map(|c| c.chunk_id.clone()).collect() }
    }

    /// Decision when rule evaluation did not finish in time.
    pub fn pending_without_rules(&self, clauses: &[RankedClause], reason: &str) -> Decision {
        let mut justification = format!("Decision: pending. Rule evaluation incomplete: {reason}.");
        self.append_excerpt(&mut justification, clauses);
        Decision {
            status: DecisionStatus::Pending,
            amount: None,
            confidence: self.confidence(clauses, None),
            justification,
            supporting_clauses: clauses.iter().map(|c| c.chunk_id.clone()).collect(),
        }
    }

    /// `retrieval_weight * mean(fused) + rule_weight * share of evaluated
    /// rules that reached a verdict`, clamped to `[0, 1]`. Rule shares are
    /// weighted by rule weight. `None` outcomes contribute nothing.
    pub fn confidence(&self, clauses: &[RankedClause], outcomes: Option<&[RuleOutcome]>) -> f32 {
        let retrieval = if clauses.is_empty() {
            0.0
        } else {
            clauses.iter().map(|c| c.fused_score).sum::<f32>() / clauses.len() as f32
        };
        let rules = outcomes.map_or(0.0, decided_share);
        (self.config.retrieval_weight * retrieval + self.config.rule_weight * rules).clamp(0.0, 1.0)
    }

    fn append_excerpt(&self, justification: &mut String, clauses: &[RankedClause]) {
        if let Some(top) = clauses.first() {
            let _ = write!(justification, " Top clause [{}]: \"{}\"", top.chunk_id, excerpt(&top.text, self.config.excerpt_chars));
        }
    }
}

fn decided_share(outcomes: &[RuleOutcome]) -> f32 {
    let evaluated: Vec<&RuleOutcome> = outcomes.iter().filter(|o| !o.skipped).collect();
    if evaluated.is_empty() { return 1.0; }
    let total: f32 = evaluated.iter().map(|o| o.weight).sum();
    if total > 0.0 {
        evaluated.iter().filter(|o| o.outcome != Outcome::RequireReview).map(|o| o.weight).sum::<f32>() / total
    } else {
        evaluated.iter().filter(|o| o.outcome != Outcome::RequireReview).count() as f32 / evaluated.len() as f32
    }
}

fn justify(status: DecisionStatus, outcomes: &[RuleOutcome]) -> String {
    let mut text = format!("Decision: {status}.");
    for o in outcomes.iter().filter(|o| !o.skipped && o.outcome != Outcome::Pass) {
        let _ = write!(text, " Rule {} ({}): {}; {}.", o.rule_id, o.outcome, o.condition, o.detail);
    }
    let skipped = outcomes.iter().filter(|o| o.skipped).count();
    if skipped > 0 {
        let _ = write!(text, " {skipped} lower-priority rule(s) not evaluated.");
    }
    text
}

/// At most `max_chars` characters of `text`, marked with an ellipsis when cut.
pub fn excerpt(text: &str, max_chars: usize) -> String {
    let text = text.trim();
    if text.chars().count() <= max_chars { return text.to_string(); }
    let cut: String = text.chars().take(max_chars.saturating_sub(3)).collect();
    format!("{}...", cut.trim_end())
}
