//! policydb-rules
//!
//! Declarative policy rules. Rule sets are data (TOML or JSON) validated at
//! load time into a fixed evaluation order; the engine runs them against
//! extracted entities and retrieved clauses.
pub mod clauses;
pub mod definition;
pub mod engine;

pub use definition::{RuleCheck, RuleDef, RuleSet, RuleStats};
pub use engine::RuleEngine;
