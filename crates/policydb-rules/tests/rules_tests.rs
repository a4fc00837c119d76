use std::io::Write;

use policydb_core::config::{ExtractionConfig, PolicyBounds, Settings};
use policydb_core::error::Error;
use policydb_core::types::{Entities, Gender, Outcome, RankedClause};
use policydb_rules::{RuleCheck, RuleDef, RuleEngine, RuleSet};
use proptest::prelude::*;

fn clause(rank: usize, text: &str) -> RankedClause {
    RankedClause {
        chunk_id: format!("policy:{rank}"),
        document_id: "policy".into(),
        position: rank,
        text: text.into(),
        dense_score: 0.9,
        sparse_score: 0.8,
        fused_score: 0.87,
        rank,
    }
}

fn engine_for(bounds: &PolicyBounds) -> RuleEngine {
    let extraction = ExtractionConfig::default();
    RuleEngine::new(RuleSet::default_for(bounds, &extraction).unwrap()).with_vocabulary(&extraction.procedures).unwrap()
}

fn default_engine() -> RuleEngine { engine_for(&PolicyBounds::default()) }

fn knee_claim() -> Entities {
    Entities {
        age: Some(46),
        gender: Some(Gender::Male),
        procedure: Some("knee surgery".into()),
        location: Some("pune".into()),
        policy_duration_days: Some(90),
        claim_amount: None,
    }
}

fn outcome_of<'a>(outcomes: &'a [policydb_core::types::RuleOutcome], id: &str) -> &'a policydb_core::types::RuleOutcome {
    outcomes.iter().find(|o| o.rule_id == id).unwrap()
}

#[test]
fn default_rules_are_ordered_by_priority() {
    let engine = default_engine();
    let ids: Vec<&str> = engine.rules().rules().iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids[0], "excluded-procedures");
    assert_eq!(ids.len(), 7);
    let stats = engine.rules().stats();
    assert_eq!(stats.total, 7);
    assert_eq!(stats.terminal, 1);
    assert_eq!(stats.by_kind["procedure_coverage"], 2);
    let excluded = &engine.rules().get("excluded-procedures").unwrap().check;
    assert_eq!(excluded, &RuleCheck::ProcedureCoverage { include: vec![], exclude: PolicyBounds::default().excluded_procedures });
}

#[test]
fn covered_knee_surgery_passes_every_rule() {
    let clauses = [clause(1, "Orthopedic procedures including knee surgery are covered after 60-day waiting period")];
    let outcomes = default_engine().evaluate(&knee_claim(), &clauses);
    assert_eq!(outcomes.len(), 7);
    assert!(outcomes.iter().all(|o| o.outcome == Outcome::Pass), "{outcomes:#?}");
    assert!(outcome_of(&outcomes, "waiting-period").detail.contains("clause requires 60"));
}

#[test]
fn terminal_exclusion_skips_lower_priority_rules() {
    let entities = Entities { procedure: Some("cosmetic surgery".into()), age: Some(30), ..Entities::default() };
    let clauses = [clause(1, "Cosmetic surgery is excluded from coverage.")];
    let outcomes = default_engine().evaluate(&entities, &clauses);
    assert_eq!(outcomes.len(), 7, "skipped rules still report");
    let first = &outcomes[0];
    assert_eq!(first.outcome, Outcome::Block);
    assert!(first.terminal && !first.skipped);
    for o in &outcomes[1..] {
        assert!(o.skipped, "{} should be skipped", o.rule_id);
        assert_eq!(o.outcome, Outcome::RequireReview);
    }
}

#[test]
fn clause_exclusion_language_blocks() {
    let entities = Entities { procedure: Some("knee surgery".into()), ..Entities::default() };
    let clauses = [clause(1, "Knee surgery is not covered under this rider; dental care is covered.")];
    let outcomes = default_engine().evaluate(&entities, &clauses);
    assert_eq!(outcome_of(&outcomes, "excluded-procedures").outcome, Outcome::Block);
}

#[test]
fn exclusion_of_another_procedure_in_the_same_sentence_does_not_reject() {
    let clauses = [clause(1, "Knee surgery is covered after a 60-day waiting period, while cosmetic surgery is excluded.")];
    let outcomes = default_engine().evaluate(&knee_claim(), &clauses);
    assert!(outcomes.iter().all(|o| o.outcome == Outcome::Pass), "{outcomes:#?}");

    let joined = [clause(1, "Knee surgery is covered and cosmetic surgery is excluded.")];
    assert_eq!(outcome_of(&default_engine().evaluate(&knee_claim(), &joined), "excluded-procedures").outcome, Outcome::Pass);
}

#[test]
fn conflicting_clauses_need_review() {
    let clauses = [clause(1, "Knee surgery is covered."), clause(2, "Knee surgery is excluded under the basic plan.")];
    let outcomes = default_engine().evaluate(&knee_claim(), &clauses);
    let excluded = outcome_of(&outcomes, "excluded-procedures");
    assert_eq!(excluded.outcome, Outcome::RequireReview);
    assert!(excluded.detail.contains("both cover and exclude"));
    assert!(outcomes.iter().all(|o| !o.skipped));
}

#[test]
fn generic_procedure_is_not_matched_inside_a_longer_name() {
    let surgery = Entities { procedure: Some("surgery".into()), ..knee_claim() };
    let cosmetic = [clause(1, "Cosmetic surgery is excluded from coverage.")];
    let outcomes = default_engine().evaluate(&surgery, &cosmetic);
    assert_eq!(outcome_of(&outcomes, "excluded-procedures").outcome, Outcome::Pass);
    assert_eq!(outcome_of(&outcomes, "covered-procedures").outcome, Outcome::Pass);

    let standalone = [clause(1, "Surgery is excluded during the first year.")];
    assert_eq!(outcome_of(&default_engine().evaluate(&surgery, &standalone), "excluded-procedures").outcome, Outcome::Block);
}

#[test]
fn exclusion_list_matches_whole_phrases_and_is_configurable() {
    let engine = default_engine();
    for procedure in ["elective surgery", "experimental therapy", "cosmetic surgery", "plastic surgery"] {
        let entities = Entities { procedure: Some(procedure.into()), ..knee_claim() };
        assert_eq!(engine.evaluate(&entities, &[])[0].outcome, Outcome::Block, "{procedure}");
    }
    assert!(!engine.rules().get("covered-procedures").unwrap().condition().contains("cosmetic surgery"));

    let bounds = PolicyBounds { excluded_procedures: vec!["maternity".into()], ..PolicyBounds::default() };
    let custom = engine_for(&bounds);
    let maternity = Entities { procedure: Some("maternity".into()), ..knee_claim() };
    assert_eq!(custom.evaluate(&maternity, &[])[0].outcome, Outcome::Block);
    let cosmetic = Entities { procedure: Some("cosmetic surgery".into()), ..knee_claim() };
    assert_eq!(custom.evaluate(&cosmetic, &[])[0].outcome, Outcome::Pass);
}

#[test]
fn waiting_period_comes_from_sentences_naming_the_procedure() {
    let engine = default_engine();
    let other = [clause(1, "Pre-existing diseases are covered after a 2 years waiting period.")];
    let outcomes = engine.evaluate(&knee_claim(), &other);
    let waiting = outcome_of(&outcomes, "waiting-period");
    assert_eq!(waiting.outcome, Outcome::Pass);
    assert!(waiting.detail.contains("policy default requires 90"), "{}", waiting.detail);

    let own = [clause(1, "Pre-existing diseases wait 2 years. Knee surgery has a waiting period of 120 days.")];
    let waiting = engine.evaluate(&knee_claim(), &own).into_iter().find(|o| o.rule_id == "waiting-period").unwrap();
    assert_eq!(waiting.outcome, Outcome::Block);
    assert!(waiting.detail.contains("clause requires 120"));
}

#[test]
fn missing_entities_need_review_not_block() {
    let outcomes = default_engine().evaluate(&Entities::default(), &[clause(1, "Surgery is covered.")]);
    assert_eq!(outcomes.len(), 7);
    assert!(outcomes.iter().all(|o| o.outcome != Outcome::Block));
    assert_eq!(outcome_of(&outcomes, "age-range").outcome, Outcome::RequireReview);
    assert_eq!(outcome_of(&outcomes, "covered-procedures").outcome, Outcome::RequireReview);
    assert_eq!(outcome_of(&outcomes, "max-claim-amount").outcome, Outcome::Pass);
}

#[test]
fn bounds_violations_block() {
    let engine = default_engine();
    let old = Entities { age: Some(85), location: Some("london".into()), claim_amount: Some(900_000.0), ..knee_claim() };
    let outcomes = engine.evaluate(&old, &[]);
    assert_eq!(outcome_of(&outcomes, "age-range").outcome, Outcome::Block);
    assert_eq!(outcome_of(&outcomes, "geographic-eligibility").outcome, Outcome::Block);
    assert_eq!(outcome_of(&outcomes, "max-claim-amount").outcome, Outcome::Block);

    let fresh = Entities { policy_duration_days: Some(30), ..knee_claim() };
    assert_eq!(outcome_of(&engine.evaluate(&fresh, &[]), "waiting-period").outcome, Outcome::Block);
}

#[test]
fn high_risk_procedures_need_pre_authorization() {
    let entities = Entities { procedure: Some("kidney transplant".into()), ..knee_claim() };
    let outcomes = default_engine().evaluate(&entities, &[]);
    assert_eq!(outcome_of(&outcomes, "pre-authorization").outcome, Outcome::RequireReview);
}

#[test]
fn include_list_miss_passes_with_covering_clause() {
    let rules = RuleSet::new(vec![RuleDef::new(
        "covered",
        1,
        RuleCheck::ProcedureCoverage { include: vec!["hip surgery".into()], exclude: vec![] },
    )])
    .unwrap();
    let engine = RuleEngine::new(rules);
    let entities = Entities { procedure: Some("root canal".into()), ..Entities::default() };
    assert_eq!(engine.evaluate(&entities, &[])[0].outcome, Outcome::RequireReview);
    let covered = [clause(1, "Root canal treatment is reimbursed up to Rs 20,000.")];
    assert_eq!(engine.evaluate(&entities, &covered)[0].outcome, Outcome::Pass);
}

#[test]
fn rules_load_from_toml() {
    let rules = RuleSet::from_toml_str(
        r#"
        [[rules]]
        id = "age"
        kind = "age_range"
        min = 21
        priority = 5
        weight = 2.0

        [[rules]]
        id = "cap"
        kind = "max_claim_amount"
        max = 100000
        require_amount = true
        priority = 1
        terminal = true
        "#,
    )
    .unwrap();
    let ids: Vec<&str> = rules.rules().iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["cap", "age"]);
    assert_eq!(rules.get("age").unwrap().check, RuleCheck::AgeRange { min: Some(21), max: None });
    assert!((rules.get("age").unwrap().weight - 2.0).abs() < f32::EPSILON);
    assert!(rules.get("cap").unwrap().terminal);
}

#[test]
fn rules_load_from_json_file() {
    let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
    write!(
        file,
        r#"{{"rules": [{{"id": "geo", "kind": "geographic_eligibility", "locations": ["Pune"]}},
                      {{"id": "wait", "kind": "waiting_period", "min_days": 30}}]}}"#
    )
    .unwrap();
    let rules = RuleSet::from_path(file.path()).unwrap();
    assert_eq!(rules.len(), 2);
    let engine = RuleEngine::new(rules);
    let outcomes = engine.evaluate(&knee_claim(), &[]);
    assert!(outcomes.iter().all(|o| o.outcome == Outcome::Pass), "{outcomes:#?}");
}

#[test]
fn settings_pick_the_rule_file_or_the_default_set() {
    let mut settings = Settings::default();
    assert_eq!(RuleSet::from_settings(&settings).unwrap().len(), 7);

    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    write!(file, "[[rules]]\nid = \"age\"\nkind = \"age_range\"\nmin = 21\n").unwrap();
    settings.rules.path = Some(file.path().display().to_string());
    let rules = RuleSet::from_settings(&settings).unwrap();
    assert_eq!(rules.len(), 1);
    assert!(rules.get("age").is_some());

    settings.rules.path = Some("/nonexistent/rules.toml".into());
    assert!(matches!(RuleSet::from_settings(&settings), Err(Error::RuleConfig { .. })));
}

#[test]
fn malformed_rules_fail_at_load() {
    let cases = [
        ("[[rules]]\nid = \"x\"\nkind = \"horoscope\"\n", "x"),
        ("[[rules]]\nid = \"age\"\nkind = \"age_range\"\nmin = 60\nmax = 20\n", "age"),
        ("[[rules]]\nid = \"geo\"\nkind = \"geographic_eligibility\"\nlocations = []\n", "geo"),
        ("[[rules]]\nid = \"cap\"\nkind = \"max_claim_amount\"\nmax = -5.0\n", "cap"),
        ("[[rules]]\nid = \"w\"\nkind = \"age_range\"\nmin = 1\nweight = -1.0\n", "w"),
        ("[[rules]]\nid = \"p\"\nkind = \"procedure_coverage\"\n", "p"),
        ("[[rules]]\nid = \"\"\nkind = \"age_range\"\nmin = 1\n", "<unnamed>"),
        ("[[rules]]\nkind = \"age_range\"\nmin = 1\n", "#0"),
    ];
    for (source, expected_id) in cases {
        match RuleSet::from_toml_str(source) {
            Err(Error::RuleConfig { rule_id, .. }) => assert_eq!(rule_id, expected_id, "{source}"),
            other => panic!("expected RuleConfig for {source}, got {other:?}"),
        }
    }
}

#[test]
fn duplicate_ids_are_rejected() {
    let check = RuleCheck::AgeRange { min: Some(18), max: None };
    let err = RuleSet::new(vec![RuleDef::new("age", 1, check.clone()), RuleDef::new("age", 2, check)]).unwrap_err();
    assert!(matches!(err, Error::RuleConfig { ref rule_id, .. } if rule_id == "age"));
}

fn arb_entities() -> impl Strategy<Value = Entities> {
    (
        prop::option::of(0u32..=130),
        prop::option::of(prop::sample::select(vec!["knee surgery", "cosmetic surgery", "organ transplant", "root canal"])),
        prop::option::of(prop::sample::select(vec!["pune", "london"])),
        prop::option::of(0u32..1000),
        prop::option::of(1.0f64..1_000_000.0),
    )
        .prop_map(|(age, procedure, location, days, amount)| Entities {
            age,
            gender: None,
            procedure: procedure.map(str::to_string),
            location: location.map(str::to_string),
            policy_duration_days: days,
            claim_amount: amount,
        })
}

proptest! {
    #[test]
    fn every_rule_reports_and_absence_never_blocks(entities in arb_entities()) {
        let engine = default_engine();
        let outcomes = engine.evaluate(&entities, &[clause(1, "Surgery is covered after a 90-day waiting period.")]);
        prop_assert_eq!(outcomes.len(), engine.len());
        for o in &outcomes {
            let needs = match o.rule_id.as_str() {
                "age-range" => entities.age.is_none(),
                "waiting-period" => entities.policy_duration_days.is_none(),
                "excluded-procedures" | "covered-procedures" | "pre-authorization" => entities.procedure.is_none(),
                "geographic-eligibility" => entities.location.is_none(),
                _ => false,
            };
            if needs { prop_assert_ne!(o.outcome, Outcome::Block); }
        }
        prop_assert_eq!(&outcomes, &engine.evaluate(&entities, &[clause(1, "Surgery is covered after a 90-day waiting period.")]));
    }
}
