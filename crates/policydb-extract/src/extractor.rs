use chrono::Utc;
use regex::{Captures, Regex};
use std::collections::BTreeSet;

use policydb_core::config::ExtractionConfig;
use policydb_core::error::{Error, Result};
use policydb_core::types::{DocumentId, Entities, Gender, Query};

use crate::vocabulary::{compile, gender_of, Phrase};

const MAX_AGE: u32 = 130;

const AGE_MARKED: &str = r"(?i)\b(\d{1,3})[\s\-]*(?:years?|yrs?|yo|y/o)\b([\s\-]*old\b)?";
const AGE_PREFIXED: &str = r"(?i)\bage(?:d)?\s*[:=]?\s*(\d{1,3})\b";
const AGE_GENDER_SHORTHAND: &str = r"(?i)\b(\d{1,3})([mf])\b";
const GENDER_WORD: &str = r"(?i)\b(male|man|gentleman|boy|female|woman|lady|girl|non[\s\-]?binary|genderqueer|intersex)\b";
const DURATION: &str = r"(?i)\b(\d{1,4})[\s\-]*(days?|weeks?|wks?|months?|mos?|mths?|years?|yrs?)\b";
const POLICY_AFTER: &str = r"(?i)^[\s\-]*(?:old\s+)?(?:policy|policies|plan|cover|coverage|insurance)\b";
const POLICY_BEFORE: &str = r"(?i)\b(?:policy|plan|cover|coverage|insurance)(?:\s+\w+)?\s+(?:of|for)\s*$";
const AMOUNT_PREFIXED: &str = r"(?i)(?:\brs\.?|\binr|₹|\$|\busd)\s*(\d[\d,]*(?:\.\d+)?)(?:\s*(k|lakhs?|lacs?|crores?|cr|million)\b)?";
const AMOUNT_SUFFIXED: &str = r"(?i)\b(\d[\d,]*(?:\.\d+)?)(?:\s*(k|lakhs?|lacs?|crores?|cr|million))?\s*(?:rupees|dollars|inr|usd)\b";

/// Regex and vocabulary based entity extractor.
///
/// Built once from an [`ExtractionConfig`]; `extract` is pure.
#[derive(Debug, Clone)]
pub struct EntityExtractor {
    procedures: Vec<Phrase>,
    locations: Vec<Phrase>,
    age_marked: Regex,
    age_prefixed: Regex,
    age_gender: Regex,
    gender_word: Regex,
    duration: Regex,
    policy_after: Regex,
    policy_before: Regex,
    amount_prefixed: Regex,
    amount_suffixed: Regex,
}

fn re(pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|e| Error::InvalidConfig(format!("bad pattern {pattern}: {e}")))
}

impl EntityExtractor {
    pub fn new(config: &ExtractionConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            procedures: compile(&config.procedures)?,
            locations: compile(&config.locations)?,
            age_marked: re(AGE_MARKED)?,
            age_prefixed: re(AGE_PREFIXED)?,
            age_gender: re(AGE_GENDER_SHORTHAND)?,
            gender_word: re(GENDER_WORD)?,
            duration: re(DURATION)?,
            policy_after: re(POLICY_AFTER)?,
            policy_before: re(POLICY_BEFORE)?,
            amount_prefixed: re(AMOUNT_PREFIXED)?,
            amount_suffixed: re(AMOUNT_SUFFIXED)?,
        })
    }

    pub fn extract(&self, text: &str) -> Entities {
        let entities = Entities {
            age: self.age(text),
            gender: self.gender(text),
            procedure: self.procedure(text),
            location: self.location(text),
            policy_duration_days: self.policy_duration_days(text),
            claim_amount: self.claim_amount(text),
        };
        tracing::debug!(found = ?entities.present(), "extracted entities");
        entities
    }

    /// Builds an immutable [`Query`] stamped with the current time.
    pub fn parse(&self, raw_text: &str, document_scope: Option<BTreeSet<DocumentId>>) -> Query {
        Query { raw_text: raw_text.to_string(), entities: self.extract(raw_text), timestamp: Utc::now(), document_scope }
    }

    /// Text handed to the ranker: the query followed by the procedure and
    /// location names it mentions.
    pub fn retrieval_text(query: &Query) -> String {
        let mut text = query.raw_text.clone();
        for extra in [&query.entities.procedure, &query.entities.location].into_iter().flatten() {
            text.push(' ');
            text.push_str(extra);
        }
        text
    }

    /// A year marker right before a policy word, or a number right after
    /// "policy of", describes the policy rather than the person.
    fn is_policy_context(&self, text: &str, start: usize, end: usize) -> bool {
        self.policy_after.is_match(&text[end..]) || self.policy_before.is_match(&text[..start])
    }

    fn age(&self, text: &str) -> Option<u32> {
        let mut candidates: Vec<(usize, u32)> = Vec::new();
        for caps in self.age_marked.captures_iter(text) {
            let Some(whole) = caps.get(0) else { continue };
            let followed_by_policy = self.policy_after.is_match(&text[whole.end()..]);
            let after_policy_of = caps.get(2).is_none() && self.policy_before.is_match(&text[..whole.start()]);
            if followed_by_policy || after_policy_of { continue; }
            push_number(&mut candidates, &caps);
        }
        for caps in self.age_prefixed.captures_iter(text).chain(self.age_gender.captures_iter(text)) {
            push_number(&mut candidates, &caps);
        }
        candidates.sort_by_key(|(start, _)| *start);
        candidates.into_iter().map(|(_, v)| v).find(|v| *v <= MAX_AGE)
    }

    fn gender(&self, text: &str) -> Option<Gender> {
        let word = self.gender_word.captures(text).and_then(|c| {
            let m = c.get(1)?;
            let normalized = m.as_str().to_lowercase().replace([' ', '-'], "");
            let gender = gender_of(&normalized).or_else(|| gender_of(m.as_str()))?;
            Some((m.start(), gender))
        });
        let shorthand = self.age_gender.captures(text).and_then(|c| {
            let m = c.get(2)?;
            let gender = if m.as_str().eq_ignore_ascii_case("m") { Gender::Male } else { Gender::Female };
            Some((m.start(), gender))
        });
        [word, shorthand].into_iter().flatten().min_by_key(|(start, _)| *start).map(|(_, g)| g)
    }

    fn procedure(&self, text: &str) -> Option<String> {
        let mut best: Option<(usize, usize, &Phrase)> = None;
        for phrase in &self.procedures {
            let Some((start, end)) = phrase.first_match(text) else { continue };
            let len = text[start..end].chars().count();
            let better = match best {
                None => true,
                Some((best_start, best_len, _)) => len > best_len || (len == best_len && start < best_start),
            };
            if better { best = Some((start, len, phrase)); }
        }
        best.map(|(_, _, p)| p.canonical.clone())
    }

    fn location(&self, text: &str) -> Option<String> {
        let mut best: Option<(usize, usize, &Phrase)> = None;
        for phrase in &self.locations {
            let Some((start, end)) = phrase.first_match(text) else { continue };
            let better = match best {
                None => true,
                Some((best_start, best_end, _)) => start < best_start || (start == best_start && end > best_end),
            };
            if better { best = Some((start, end, phrase)); }
        }
        best.map(|(_, _, p)| p.canonical.clone())
    }

    fn policy_duration_days(&self, text: &str) -> Option<u32> {
        self.duration.captures_iter(text).find_map(|caps| {
            let whole = caps.get(0)?;
            if !self.is_policy_context(text, whole.start(), whole.end()) { return None; }
            let n: u32 = caps.get(1)?.as_str().parse().ok()?;
            let unit = caps.get(2)?.as_str().to_lowercase();
            let per = match unit.chars().next()? {
                'd' => 1,
                'w' => 7,
                'm' => 30,
                _ => 365,
            };
            n.checked_mul(per)
        })
    }

    fn claim_amount(&self, text: &str) -> Option<f64> {
        let prefixed = self.amount_prefixed.captures(text);
        let suffixed = self.amount_suffixed.captures(text);
        let first = match (prefixed, suffixed) {
            (Some(a), Some(b)) => {
                let (sa, sb) = (a.get(0).map_or(usize::MAX, |m| m.start()), b.get(0).map_or(usize::MAX, |m| m.start()));
                if sa <= sb { a } else { b }
            }
            (Some(a), None) => a,
            (None, Some(b)) => b,
            (None, None) => return None,
        };
        let value: f64 = first.get(1)?.as_str().replace(',', "").parse().ok()?;
        let multiplier = match first.get(2).map(|m| m.as_str().to_lowercase()) {
            None => 1.0,
            Some(m) if m == "k" => 1e3,
            Some(m) if m.starts_with("la") => 1e5,
            Some(m) if m.starts_with("cr") => 1e7,
            Some(_) => 1e6,
        };
        let amount = value * multiplier;
        (amount.is_finite() && amount > 0.0).then_some(amount)
    }
}

fn push_number(candidates: &mut Vec<(usize, u32)>, caps: &Captures<'_>) {
    if let Some(m) = caps.get(1) {
        if let Ok(v) = m.as_str().parse() { candidates.push((m.start(), v)); }
    }
}
