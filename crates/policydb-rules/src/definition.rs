use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use policydb_core::config::{expand_path, ExtractionConfig, PolicyBounds, Settings};
use policydb_core::error::{Error, Result};

fn default_priority() -> i32 { 100 }
fn default_weight() -> f32 { 1.0 }

/// Predicate of a rule, tagged by `kind` in rule files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RuleCheck {
    AgeRange {
        #[serde(default)]
        min: Option<u32>,
        #[serde(default)]
        max: Option<u32>,
    },
    WaitingPeriod {
        min_days: u32,
        /// Prefer the waiting period stated by the best retrieved clause.
        #[serde(default)]
        from_clauses: bool,
    },
    ProcedureCoverage {
        #[serde(default)]
        include: Vec<String>,
        #[serde(default)]
        exclude: Vec<String>,
    },
    GeographicEligibility { locations: Vec<String> },
    MaxClaimAmount {
        max: f64,
        #[serde(default)]
        require_amount: bool,
    },
    /// Procedures that always need a human sign-off.
    PreAuthorization { procedures: Vec<String> },
}

impl RuleCheck {
    pub fn kind(&self) -> &'static str {
        match self {
            RuleCheck::AgeRange { .. } => "age_range",
            RuleCheck::WaitingPeriod { .. } => "waiting_period",
            RuleCheck::ProcedureCoverage { .. } => "procedure_coverage",
            RuleCheck::GeographicEligibility { .. } => "geographic_eligibility",
            RuleCheck::MaxClaimAmount { .. } => "max_claim_amount",
            RuleCheck::PreAuthorization { .. } => "pre_authorization",
        }
    }

    /// Condition text quoted in justifications.
    pub fn condition(&self) -> String {
        match self {
            RuleCheck::AgeRange { min: Some(lo), max: Some(hi) } => format!("age between {lo} and {hi}"),
            RuleCheck::AgeRange { min: Some(lo), max: None } => format!("age at least {lo}"),
            RuleCheck::AgeRange { min: None, max: Some(hi) } => format!("age at most {hi}"),
            RuleCheck::AgeRange { min: None, max: None } => "age stated".to_string(),
            RuleCheck::WaitingPeriod { min_days, from_clauses: true } => {
                format!("policy held for the clause waiting period (default {min_days} days)")
            }
            RuleCheck::WaitingPeriod { min_days, from_clauses: false } => format!("policy held at least {min_days} days"),
            RuleCheck::ProcedureCoverage { include, exclude } if include.is_empty() => {
                format!("procedure not among exclusions ({})", exclude.join(", "))
            }
            RuleCheck::ProcedureCoverage { include, .. } => format!("procedure covered ({})", include.join(", ")),
            RuleCheck::GeographicEligibility { locations } => format!("treatment location in {}", locations.join(", ")),
            RuleCheck::MaxClaimAmount { max, .. } => format!("claim amount at most {max:.2}"),
            RuleCheck::PreAuthorization { procedures } => {
                format!("pre-authorization required for {}", procedures.join(", "))
            }
        }
    }

    fn validate(&self) -> std::result::Result<(), String> {
        fn non_empty(name: &str, list: &[String]) -> std::result::Result<(), String> {
            if list.iter().any(|s| s.trim().is_empty()) { return Err(format!("{name} contains an empty entry")); }
            Ok(())
        }
        match self {
            RuleCheck::AgeRange { min, max } => match (min, max) {
                (None, None) => Err("age_range needs min or max".into()),
                (Some(lo), Some(hi)) if lo > hi => Err(format!("inverted age bounds {lo} > {hi}")),
                _ => Ok(()),
            },
            RuleCheck::WaitingPeriod { .. } => Ok(()),
            RuleCheck::ProcedureCoverage { include, exclude } => {
                if include.is_empty() && exclude.is_empty() { return Err("procedure_coverage needs include or exclude".into()); }
                non_empty("include", include)?;
                non_empty("exclude", exclude)?;
                if let Some(both) = include.iter().find(|p| crate::clauses::contains_name(exclude, p)) {
                    return Err(format!("{both:?} is both included and excluded"));
                }
                Ok(())
            }
            RuleCheck::GeographicEligibility { locations } => {
                if locations.is_empty() { return Err("locations must not be empty".into()); }
                non_empty("locations", locations)
            }
            RuleCheck::MaxClaimAmount { max, .. } => {
                if max.is_finite() && *max > 0.0 { Ok(()) } else { Err(format!("max must be positive, got {max}")) }
            }
            RuleCheck::PreAuthorization { procedures } => {
                if procedures.is_empty() { return Err("procedures must not be empty".into()); }
                non_empty("procedures", procedures)
            }
        }
    }
}

/// One rule as written in a rule file.
///
/// ```toml
/// [[rules]]
/// id = "age"
/// kind = "age_range"
/// min = 18
/// max = 80
/// priority = 10
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleDef {
    pub id: String,
    /// Lower runs first.
    #[serde(default = "default_priority")]
    pub priority: i32,
    /// A block from a terminal rule skips every rule with a higher priority number.
    #[serde(default)]
    pub terminal: bool,
    #[serde(default = "default_weight")]
    pub weight: f32,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(flatten)]
    pub check: RuleCheck,
}

impl RuleDef {
    pub fn new(id: &str, priority: i32, check: RuleCheck) -> Self {
        Self { id: id.to_string(), priority, terminal: false, weight: 1.0, description: None, check }
    }

    pub fn terminal(mut self) -> Self {
        self.terminal = true;
        self
    }

    pub fn condition(&self) -> String {
        self.description.clone().unwrap_or_else(|| self.check.condition())
    }

    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() { return Err(Error::rule_config("<unnamed>", "rule id must not be empty")); }
        if !(self.weight.is_finite() && self.weight >= 0.0) {
            return Err(Error::rule_config(&self.id, format!("weight must be finite and non-negative, got {}", self.weight)));
        }
        self.check.validate().map_err(|reason| Error::rule_config(&self.id, reason))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RuleStats {
    pub total: usize,
    pub terminal: usize,
    pub by_kind: BTreeMap<&'static str, usize>,
}

/// Validated rules in evaluation order: ascending priority, then id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuleSet { rules: Vec<RuleDef> }

#[derive(Deserialize)]
struct TomlRuleFile {
    #[serde(default)]
    rules: Vec<toml::Value>,
}

#[derive(Deserialize)]
struct JsonRuleFile {
    #[serde(default)]
    rules: Vec<serde_json::Value>,
}

impl RuleSet {
    /// Validates and orders `rules`. Fails on the first malformed rule or a
    /// repeated id.
    pub fn new(mut rules: Vec<RuleDef>) -> Result<Self> {
        let mut seen = HashSet::new();
        for rule in &rules {
            rule.validate()?;
            if !seen.insert(rule.id.clone()) { return Err(Error::rule_config(&rule.id, "duplicate rule id")); }
        }
        rules.sort_by(|a, b| a.priority.cmp(&b.priority).then_with(|| a.id.cmp(&b.id)));
        tracing::info!(rules = rules.len(), "rule set loaded");
        Ok(Self { rules })
    }

    pub fn from_toml_str(source: &str) -> Result<Self> {
        let file: TomlRuleFile = toml::from_str(source).map_err(|e| Error::rule_config("<file>", e.to_string()))?;
        let rules = file
            .rules
            .into_iter()
            .enumerate()
            .map(|(i, value)| {
                let id = value.get("id").and_then(toml::Value::as_str).map_or_else(|| format!("#{i}"), str::to_string);
                value.try_into::<RuleDef>().map_err(|e| Error::rule_config(id, e.to_string()))
            })
            .collect::<Result<Vec<_>>>()?;
        Self::new(rules)
    }

    pub fn from_json_str(source: &str) -> Result<Self> {
        let file: JsonRuleFile = serde_json::from_str(source).map_err(|e| Error::rule_config("<file>", e.to_string()))?;
        let rules = file
            .rules
            .into_iter()
            .enumerate()
            .map(|(i, value)| {
                let id = value.get("id").and_then(serde_json::Value::as_str).map_or_else(|| format!("#{i}"), str::to_string);
                serde_json::from_value::<RuleDef>(value).map_err(|e| Error::rule_config(id, e.to_string()))
            })
            .collect::<Result<Vec<_>>>()?;
        Self::new(rules)
    }

    /// Loads a `.json` file as JSON and anything else as TOML.
    pub fn from_path(path: &Path) -> Result<Self> {
        let source = std::fs::read_to_string(path)
            .map_err(|e| Error::rule_config("<file>", format!("cannot read {}: {e}", path.display())))?;
        tracing::debug!(path = %path.display(), "loading rule file");
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => Self::from_json_str(&source),
            _ => Self::from_toml_str(&source),
        }
    }

    /// Rule set mirroring the configured bounds and vocabularies.
    pub fn default_for(bounds: &PolicyBounds, extraction: &ExtractionConfig) -> Result<Self> {
        let excluded = bounds.excluded_procedures.clone();
        let covered: Vec<String> = extraction
            .procedures
            .iter()
            .filter(|p| !crate::clauses::matches_any_phrase(&excluded, p))
            .cloned()
            .collect();
        Self::new(vec![
            RuleDef::new("excluded-procedures", 0, RuleCheck::ProcedureCoverage { include: Vec::new(), exclude: excluded }).terminal(),
            RuleDef::new("age-range", 10, RuleCheck::AgeRange { min: Some(bounds.min_age), max: Some(bounds.max_age) }),
            RuleDef::new("covered-procedures", 20, RuleCheck::ProcedureCoverage { include: covered, exclude: Vec::new() }),
            RuleDef::new("waiting-period", 30, RuleCheck::WaitingPeriod { min_days: bounds.waiting_period_days, from_clauses: true }),
            RuleDef::new("geographic-eligibility", 40, RuleCheck::GeographicEligibility { locations: extraction.locations.clone() }),
            RuleDef::new("max-claim-amount", 50, RuleCheck::MaxClaimAmount { max: bounds.max_claim_amount, require_amount: false }),
            RuleDef::new("pre-authorization", 60, RuleCheck::PreAuthorization { procedures: bounds.pre_authorization.clone() }),
        ])
    }

    /// The configured rule file when one is set, otherwise [`RuleSet::default_for`].
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        match &settings.rules.path {
            Some(path) => Self::from_path(&expand_path(path)),
            None => Self::default_for(&settings.bounds, &settings.extraction),
        }
    }

    pub fn rules(&self) -> &[RuleDef] { &self.rules }
    pub fn len(&self) -> usize { self.rules.len() }
    pub fn is_empty(&self) -> bool { self.rules.is_empty() }
    pub fn get(&self, id: &str) -> Option<&RuleDef> { self.rules.iter().find(|r| r.id == id) }

    pub fn stats(&self) -> RuleStats {
        let mut stats = RuleStats { total: self.rules.len(), ..RuleStats::default() };
        for rule in &self.rules {
            *stats.by_kind.entry(rule.check.kind()).or_insert(0) += 1;
            if rule.terminal { stats.terminal += 1; }
        }
        stats
    }
}
