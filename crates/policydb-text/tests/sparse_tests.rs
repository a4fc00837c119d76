use policydb_core::types::Chunk;
use policydb_text::SparseIndex;
use proptest::prelude::*;

fn index_of(texts: &[&str]) -> SparseIndex {
    let mut index = SparseIndex::new();
    for (i, text) in texts.iter().enumerate() { index.insert(&Chunk::new("policy", i, *text)); }
    index
}

#[test]
fn analyzer_lowercases_removes_stop_words_and_stems() {
    let index = SparseIndex::new();
    assert_eq!(index.terms("Surgeries"), index.terms("surgery"));
    assert_eq!(index.terms("KNEE"), vec!["knee".to_string()]);
    assert!(index.terms("the of and is").is_empty());
    assert_eq!(index.terms("not covered").len(), 2, "negations survive");
}

#[test]
fn encode_counts_term_frequencies() {
    let index = SparseIndex::new();
    let v = index.encode("c1", "knee surgery, knee replacement");
    let knee = index.terms("knee").remove(0);
    assert_eq!(v.term_weights.get(&knee).copied(), Some(2.0));
    assert!((v.length() - 4.0).abs() < 1e-6);
}

#[test]
fn full_overlap_scores_one_and_disjoint_scores_zero() {
    let index = index_of(&["knee surgery covered"]);
    let id = "policy:0";
    let full = index.score(&index.query_terms("knee surgery covered"), id);
    assert!((full - 1.0).abs() < 1e-5, "full={full}");
    assert_eq!(index.score(&index.query_terms("dental cleaning"), id), 0.0);
    assert_eq!(index.score(&[], id), 0.0);
    assert_eq!(index.score(&index.query_terms("knee"), "missing"), 0.0);
}

#[test]
fn partial_overlap_ranks_between() {
    let index = index_of(&[
        "Orthopedic procedures including knee surgery are covered after a waiting period.",
        "Cosmetic surgery is excluded from coverage.",
        "Dental treatment is reimbursed up to a fixed limit.",
    ]);
    let scores = index.score_all("knee surgery waiting period");
    let ortho = scores["policy:0"];
    let cosmetic = scores["policy:1"];
    let dental = scores["policy:2"];
    assert!(ortho > cosmetic, "{ortho} > {cosmetic}");
    assert!(cosmetic > dental, "{cosmetic} > {dental}");
    assert_eq!(dental, 0.0);
}

#[test]
fn remove_updates_document_frequencies() {
    let mut index = index_of(&["knee surgery", "hip surgery"]);
    let surgery = index.terms("surgery").remove(0);
    let before = index.idf(&surgery);
    assert!(index.remove("policy:1").is_some());
    assert_eq!(index.len(), 1);
    assert!(index.idf(&surgery) > before, "fewer chunks sharing a term raises its idf");
    assert!(index.remove("policy:1").is_none());
    let hip = index.terms("hip").remove(0);
    assert!(index.get("policy:0").is_some());
    assert!(!index.get("policy:0").map_or(false, |v| v.term_weights.contains_key(&hip)));
}

#[test]
fn reinserting_a_chunk_replaces_it() {
    let mut index = index_of(&["knee surgery"]);
    index.insert(&Chunk::new("policy", 0, "hip surgery"));
    assert_eq!(index.len(), 1);
    let knee = index.terms("knee").remove(0);
    assert!(!index.get("policy:0").map_or(true, |v| v.term_weights.contains_key(&knee)));
    assert_eq!(index.vocabulary_size(), 2);
}

proptest! {
    #[test]
    fn scores_stay_in_unit_interval(docs in prop::collection::vec("[a-z ]{0,60}", 1..5), query in "[a-z ]{0,40}") {
        let refs: Vec<&str> = docs.iter().map(String::as_str).collect();
        let index = index_of(&refs);
        for score in index.score_all(&query).values() {
            prop_assert!((0.0..=1.0).contains(score), "score {} out of range", score);
        }
    }
}
