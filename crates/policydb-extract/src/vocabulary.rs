use regex::Regex;

use policydb_core::error::{Error, Result};
use policydb_core::types::Gender;

/// A vocabulary entry and the case-insensitive, word-bounded pattern that
/// finds it. Words may be separated by any run of spaces or hyphens.
#[derive(Debug, Clone)]
pub struct Phrase {
    pub canonical: String,
    pattern: Regex,
}

impl Phrase {
    pub fn new(canonical: &str) -> Result<Self> {
        let words: Vec<String> = canonical.split(|c: char| c.is_whitespace() || c == '-').filter(|w| !w.is_empty()).map(regex::escape).collect();
        if words.is_empty() {
            return Err(Error::InvalidConfig(format!("empty vocabulary entry {canonical:?}")));
        }
        let pattern = Regex::new(&format!(r"(?i)\b{}\b", words.join(r"[\s\-]+")))
            .map_err(|e| Error::InvalidConfig(format!("vocabulary entry {canonical:?}: {e}")))?;
        Ok(Self { canonical: canonical.trim().to_string(), pattern })
    }

    /// Byte span of the first occurrence in `text`.
    pub fn first_match(&self, text: &str) -> Option<(usize, usize)> {
        self.pattern.find(text).map(|m| (m.start(), m.end()))
    }

    pub fn is_match(&self, text: &str) -> bool { self.pattern.is_match(text) }

    /// Byte spans of every non-overlapping occurrence, left to right.
    pub fn spans<'a>(&'a self, text: &'a str) -> impl Iterator<Item = (usize, usize)> + 'a {
        self.pattern.find_iter(text).map(|m| (m.start(), m.end()))
    }
}

/// Occurrences of every vocabulary entry in `text`.
pub fn vocabulary_spans(vocabulary: &[Phrase], text: &str) -> Vec<(usize, usize)> {
    vocabulary.iter().flat_map(|p| p.spans(text)).collect()
}

/// Occurrences of `target` that are not part of a longer vocabulary match,
/// so "surgery" is not found inside "cosmetic surgery".
pub fn standalone_spans(target: &Phrase, vocabulary: &[(usize, usize)], text: &str) -> Vec<(usize, usize)> {
    target
        .spans(text)
        .filter(|&(start, end)| !vocabulary.iter().any(|&(s, e)| s <= start && end <= e && e - s > end - start))
        .collect()
}

pub fn compile(entries: &[String]) -> Result<Vec<Phrase>> {
    entries.iter().map(|e| Phrase::new(e)).collect()
}

pub const GENDER_WORDS: &[(&str, Gender)] = &[
    ("male", Gender::Male),
    ("man", Gender::Male),
    ("gentleman", Gender::Male),
    ("boy", Gender::Male),
    ("female", Gender::Female),
    ("woman", Gender::Female),
    ("lady", Gender::Female),
    ("girl", Gender::Female),
    ("non-binary", Gender::Other),
    ("nonbinary", Gender::Other),
    ("genderqueer", Gender::Other),
    ("intersex", Gender::Other),
];

pub fn gender_of(word: &str) -> Option<Gender> {
    let word = word.to_lowercase();
    GENDER_WORDS.iter().find(|(w, _)| *w == word).map(|(_, g)| *g)
}
