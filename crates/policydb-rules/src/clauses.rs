//! Clause-language cues shared by the rule predicates and the amount
//! estimator.
use policydb_extract::vocabulary::Phrase;
use regex::Regex;
use std::sync::LazyLock;

const EXCLUSION_CUES: &[&str] = &[
    "excluded", "exclusion", "not covered", "not payable", "not eligible", "no coverage",
    "does not cover", "shall not cover", "not reimbursed", "not admissible",
];
const COVERAGE_CUES: &[&str] = &["covered", "coverage", "payable", "reimbursed", "reimbursable", "eligible", "included"];

static WAITING_BEFORE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(\d{1,4})[\s\-]*(days?|weeks?|months?|years?)[\s\-]+(?:of\s+)?waiting\s+period\b")
        .expect("waiting period pattern")
});

static WAITING_AFTER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bwaiting\s+period\s+(?:of\s+)?(\d{1,4})[\s\-]*(days?|weeks?|months?|years?)\b")
        .expect("waiting period pattern")
});

static LIMIT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:up\s*to|limit\s+of|maximum\s+of|capped\s+at|sum\s+insured\s+of)\s*(?:rs\.?|inr|₹|\$|usd)?\s*(\d[\d,]*(?:\.\d+)?)(?:\s*(k|lakhs?|lacs?|crores?|cr|million)\b)?",
    )
    .expect("coverage limit pattern")
});

/// Lowercase, with whitespace and hyphen runs collapsed to one space.
pub fn normalize_name(s: &str) -> String {
    s.split(|c: char| c.is_whitespace() || c == '-').filter(|w| !w.is_empty()).map(str::to_lowercase).collect::<Vec<_>>().join(" ")
}

pub fn contains_name(list: &[String], name: &str) -> bool {
    let name = normalize_name(name);
    list.iter().any(|entry| normalize_name(entry) == name)
}

/// Sentences of a clause, split on terminal punctuation.
pub fn sentences(text: &str) -> impl Iterator<Item = &str> {
    text.split(['.', ';', '!', '?']).map(str::trim).filter(|s| !s.is_empty())
}

pub fn has_exclusion_language(text: &str) -> bool {
    let lower = text.to_lowercase();
    EXCLUSION_CUES.iter().any(|cue| lower.contains(cue))
}

/// Coverage cue without any exclusion cue ("excluded from coverage" is not coverage).
pub fn has_coverage_language(text: &str) -> bool {
    let lower = text.to_lowercase();
    !has_exclusion_language(&lower) && COVERAGE_CUES.iter().any(|cue| lower.contains(cue))
}

/// Position a clause takes toward one procedure it names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stance {
    Covers,
    Excludes,
}

fn first_cue(text: &str, cues: &[&str]) -> Option<usize> { cues.iter().filter_map(|cue| text.find(cue)).min() }

/// Stance of `sentence` toward the phrase at `span`. The first cue after the
/// phrase, before `until`, decides ("not covered" outranks the "covered"
/// inside it). With no cue there, any exclusion cue before the phrase wins
/// over a coverage cue.
pub fn stance_toward(sentence: &str, span: (usize, usize), until: usize) -> Option<Stance> {
    let lower = sentence.to_ascii_lowercase();
    let until = until.clamp(span.1, lower.len());
    let after = lower.get(span.1..until).unwrap_or_default();
    match (first_cue(after, EXCLUSION_CUES), first_cue(after, COVERAGE_CUES)) {
        (Some(ex), Some(cov)) => return Some(if ex <= cov { Stance::Excludes } else { Stance::Covers }),
        (Some(_), None) => return Some(Stance::Excludes),
        (None, Some(_)) => return Some(Stance::Covers),
        (None, None) => {}
    }
    let before = lower.get(..span.0).unwrap_or_default();
    if has_exclusion_language(before) {
        Some(Stance::Excludes)
    } else if has_coverage_language(before) {
        Some(Stance::Covers)
    } else {
        None
    }
}

/// Whether any entry occurs in `name` as a whole phrase.
pub fn matches_any_phrase(list: &[String], name: &str) -> bool {
    list.iter().filter_map(|entry| Phrase::new(entry).ok()).any(|p| p.is_match(name))
}

fn unit_days(unit: &str) -> u32 {
    match unit.to_lowercase().chars().next() {
        Some('d') => 1,
        Some('w') => 7,
        Some('m') => 30,
        _ => 365,
    }
}

/// Waiting period stated by a clause ("60-day waiting period",
/// "waiting period of 2 years"), in days.
pub fn stated_waiting_days(text: &str) -> Option<u32> {
    let caps = WAITING_BEFORE.captures(text).or_else(|| WAITING_AFTER.captures(text))?;
    let n: u32 = caps.get(1)?.as_str().parse().ok()?;
    n.checked_mul(unit_days(caps.get(2)?.as_str()))
}

/// Monetary limit stated by a clause ("up to Rs 2 lakh").
pub fn stated_coverage_limit(text: &str) -> Option<f64> {
    let caps = LIMIT.captures(text)?;
    let value: f64 = caps.get(1)?.as_str().replace(',', "").parse().ok()?;
    let multiplier = match caps.get(2).map(|m| m.as_str().to_lowercase()) {
        None => 1.0,
        Some(m) if m == "k" => 1e3,
        Some(m) if m.starts_with("la") => 1e5,
        Some(m) if m.starts_with("cr") => 1e7,
        Some(_) => 1e6,
    };
    let amount = value * multiplier;
    (amount.is_finite() && amount > 0.0).then_some(amount)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn waiting_period_forms() {
        assert_eq!(stated_waiting_days("covered after 60-day waiting period"), Some(60));
        assert_eq!(stated_waiting_days("subject to a waiting period of 2 years"), Some(730));
        assert_eq!(stated_waiting_days("3 months waiting period applies"), Some(90));
        assert_eq!(stated_waiting_days("no waiting"), None);
    }

    #[test]
    fn exclusion_beats_coverage() {
        assert!(has_exclusion_language("Cosmetic surgery is excluded from coverage"));
        assert!(!has_coverage_language("Cosmetic surgery is excluded from coverage"));
        assert!(has_coverage_language("Knee surgery is covered"));
        assert!(!has_coverage_language("Knee surgery is not covered"));
    }

    #[test]
    fn stance_follows_the_nearest_cue() {
        let mixed = "Knee surgery is covered after a 60-day waiting period, while cosmetic surgery is excluded";
        let cosmetic = mixed.find("cosmetic").unwrap();
        assert_eq!(stance_toward(mixed, (0, 12), cosmetic), Some(Stance::Covers));
        assert_eq!(stance_toward(mixed, (cosmetic, cosmetic + 16), mixed.len()), Some(Stance::Excludes));
        assert_eq!(stance_toward("Knee surgery is not covered", (0, 12), 27), Some(Stance::Excludes));
        assert_eq!(stance_toward("Cosmetic surgery is excluded from coverage", (0, 16), 42), Some(Stance::Excludes));
        assert_eq!(stance_toward("Exclusions: cosmetic surgery", (12, 28), 28), Some(Stance::Excludes));
        assert_eq!(stance_toward("Knee surgery requires a referral", (0, 12), 32), None);
    }

    #[test]
    fn phrases_match_inside_longer_names() {
        let list = vec!["elective".to_string(), "plastic surgery".to_string()];
        assert!(matches_any_phrase(&list, "elective surgery"));
        assert!(matches_any_phrase(&list, "Plastic-Surgery"));
        assert!(!matches_any_phrase(&list, "knee surgery"));
        assert!(!matches_any_phrase(&list, "selective procedure"));
    }

    #[test]
    fn coverage_limits() {
        assert_eq!(stated_coverage_limit("reimbursed up to Rs. 2 lakh per year"), Some(200_000.0));
        assert_eq!(stated_coverage_limit("subject to a limit of 150,000"), Some(150_000.0));
        assert_eq!(stated_coverage_limit("covered in full"), None);
    }

    #[test]
    fn names_compare_loosely() {
        assert!(contains_name(&["Knee-Surgery".to_string()], "knee  surgery"));
        assert!(!contains_name(&["knee surgery".to_string()], "knee"));
    }
}
