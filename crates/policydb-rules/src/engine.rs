use policydb_core::error::Result;
use policydb_core::traits::RuleEvaluator;
use policydb_core::types::{Entities, Outcome, RankedClause, RuleOutcome};
use policydb_extract::vocabulary::{compile, standalone_spans, vocabulary_spans, Phrase};

use crate::clauses::{contains_name, matches_any_phrase, sentences, stance_toward, stated_waiting_days, Stance};
use crate::definition::{RuleCheck, RuleDef, RuleSet};

/// Evaluates a [`RuleSet`] against one query's entities and clauses.
///
/// Every loaded rule reports exactly one outcome, in rule-set order.
#[derive(Debug, Clone)]
pub struct RuleEngine {
    rules: RuleSet,
    /// Procedure names a clause may mention; a match nested in a longer one
    /// is not a mention of the shorter name.
    vocabulary: Vec<Phrase>,
}

/// One sentence naming the claimed procedure.
struct Mention<'a> {
    sentence: &'a str,
    stance: Option<Stance>,
}

impl RuleEngine {
    /// Engine whose vocabulary is every procedure the rules name.
    pub fn new(rules: RuleSet) -> Self {
        let names: Vec<String> = rules
            .rules()
            .iter()
            .flat_map(|r| match &r.check {
                RuleCheck::ProcedureCoverage { include, exclude } => include.iter().chain(exclude).cloned().collect(),
                RuleCheck::PreAuthorization { procedures } => procedures.clone(),
                _ => Vec::new(),
            })
            .collect();
        let vocabulary = names.iter().filter_map(|n| Phrase::new(n).ok()).collect();
        Self { rules, vocabulary }
    }

    /// Adds extraction vocabulary entries to the names clauses are scanned for.
    pub fn with_vocabulary(mut self, procedures: &[String]) -> Result<Self> {
        self.vocabulary.extend(compile(procedures)?);
        Ok(self)
    }

    pub fn rules(&self) -> &RuleSet { &self.rules }
    pub fn len(&self) -> usize { self.rules.len() }
    pub fn is_empty(&self) -> bool { self.rules.is_empty() }

    pub fn evaluate(&self, entities: &Entities, clauses: &[RankedClause]) -> Vec<RuleOutcome> {
        let mut blocked_by: Option<(&str, i32)> = None;
        let mut out = Vec::with_capacity(self.rules.len());
        for rule in self.rules.rules() {
            if let Some((blocker, priority)) = blocked_by {
                if rule.priority > priority {
                    out.push(outcome(rule, Outcome::RequireReview, true, format!("not evaluated: terminal rule {blocker} blocked")));
                    continue;
                }
            }
            let (verdict, detail) = self.check(&rule.check, entities, clauses);
            if verdict == Outcome::Block && rule.terminal && blocked_by.is_none() {
                blocked_by = Some((rule.id.as_str(), rule.priority));
            }
            out.push(outcome(rule, verdict, false, detail));
        }
        tracing::debug!(
            rules = out.len(),
            blocked = out.iter().filter(|o| o.outcome == Outcome::Block).count(),
            review = out.iter().filter(|o| o.outcome == Outcome::RequireReview).count(),
            "rules evaluated"
        );
        out
    }
}

impl RuleEvaluator for RuleEngine {
    fn evaluate(&self, entities: &Entities, clauses: &[RankedClause]) -> Vec<RuleOutcome> { RuleEngine::evaluate(self, entities, clauses) }
    fn rule_count(&self) -> usize { self.len() }
}

impl RuleEngine {
    /// Sentences of the retrieved clauses naming `procedure` on its own,
    /// each with the stance it takes toward it.
    fn mentions<'a>(&self, procedure: &str, clauses: &'a [RankedClause]) -> Vec<Mention<'a>> {
        let Ok(target) = Phrase::new(procedure) else { return Vec::new() };
        let mut out = Vec::new();
        for sentence in clauses.iter().flat_map(|c| sentences(&c.text)) {
            let names = vocabulary_spans(&self.vocabulary, sentence);
            for span in standalone_spans(&target, &names, sentence) {
                let until = names.iter().map(|&(start, _)| start).filter(|&start| start >= span.1).min().unwrap_or(sentence.len());
                out.push(Mention { sentence, stance: stance_toward(sentence, span, until) });
            }
        }
        out
    }

    fn check(&self, check: &RuleCheck, entities: &Entities, clauses: &[RankedClause]) -> (Outcome, String) {
        match check {
            RuleCheck::AgeRange { min, max } => {
                let Some(age) = entities.age else { return (Outcome::RequireReview, "age not stated".into()) };
                let low = min.map_or(true, |lo| age >= lo);
                let high = max.map_or(true, |hi| age <= hi);
                if low && high { (Outcome::Pass, format!("age {age} within bounds")) } else { (Outcome::Block, format!("age {age} out of bounds")) }
            }
            RuleCheck::WaitingPeriod { min_days, from_clauses } => {
                let Some(held) = entities.policy_duration_days else {
                    return (Outcome::RequireReview, "policy duration not stated".into());
                };
                let stated = match (*from_clauses, entities.procedure.as_deref()) {
                    (true, Some(procedure)) => self.mentions(procedure, clauses).iter().find_map(|m| stated_waiting_days(m.sentence)),
                    _ => None,
                };
                let required = stated.unwrap_or(*min_days);
                let source = if stated.is_some() { "clause" } else { "policy default" };
                if held >= required {
                    (Outcome::Pass, format!("held {held} days, {source} requires {required}"))
                } else {
                    (Outcome::Block, format!("held {held} days, {source} requires {required}"))
                }
            }
            RuleCheck::ProcedureCoverage { include, exclude } => {
                let Some(procedure) = entities.procedure.as_deref() else {
                    return (Outcome::RequireReview, "procedure not stated".into());
                };
                if matches_any_phrase(exclude, procedure) {
                    return (Outcome::Block, format!("{procedure} is on the exclusion list"));
                }
                let named = self.mentions(procedure, clauses);
                let excludes = named.iter().any(|m| m.stance == Some(Stance::Excludes));
                let covers = named.iter().any(|m| m.stance == Some(Stance::Covers));
                match (excludes, covers) {
                    (true, true) => return (Outcome::RequireReview, format!("retrieved clauses both cover and exclude {procedure}")),
                    (true, false) => return (Outcome::Block, format!("a retrieved clause excludes {procedure}")),
                    _ => {}
                }
                if include.is_empty() || contains_name(include, procedure) {
                    return (Outcome::Pass, format!("{procedure} is not excluded"));
                }
                if covers {
                    return (Outcome::Pass, format!("a retrieved clause covers {procedure}"));
                }
                (Outcome::RequireReview, format!("{procedure} is not on the coverage list"))
            }
            RuleCheck::GeographicEligibility { locations } => {
                let Some(location) = entities.location.as_deref() else {
                    return (Outcome::RequireReview, "location not stated".into());
                };
                if contains_name(locations, location) {
                    (Outcome::Pass, format!("{location} is eligible"))
                } else {
                    (Outcome::Block, format!("{location} is outside the eligible area"))
                }
            }
            RuleCheck::MaxClaimAmount { max, require_amount } => match entities.claim_amount {
                None if *require_amount => (Outcome::RequireReview, "claim amount not stated".into()),
                None => (Outcome::Pass, "no claim amount stated".into()),
                Some(amount) if amount <= *max => (Outcome::Pass, format!("claim {amount:.2} within limit")),
                Some(amount) => (Outcome::Block, format!("claim {amount:.2} exceeds {max:.2}")),
            },
            RuleCheck::PreAuthorization { procedures } => {
                let Some(procedure) = entities.procedure.as_deref() else {
                    return (Outcome::RequireReview, "procedure not stated".into());
                };
                if contains_name(procedures, procedure) {
                    (Outcome::RequireReview, format!("{procedure} needs pre-authorization"))
                } else {
                    (Outcome::Pass, format!("{procedure} needs no pre-authorization"))
                }
            }
        }
    }
}

fn outcome(rule: &RuleDef, verdict: Outcome, skipped: bool, detail: String) -> RuleOutcome {
    RuleOutcome {
        rule_id: rule.id.clone(),
        outcome: verdict,
        terminal: rule.terminal,
        weight: rule.weight,
        skipped,
        condition: rule.condition(),
        detail,
    }
}
