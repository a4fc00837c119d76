use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

use policydb_core::types::{Chunk, ChunkId, SparseVector};
use tantivy::tokenizer::TextAnalyzer;

use crate::tantivy_utils::{analyze, build_analyzer};

/// Term-frequency index over chunk vocabulary.
///
/// Plain data: cloning it is how the snapshot layer builds the next
/// generation without disturbing readers of the current one.
#[derive(Clone)]
pub struct SparseIndex {
	analyzer: TextAnalyzer,
	pub(crate) vectors: BTreeMap<ChunkId, SparseVector>,
	pub(crate) doc_freq: HashMap<String, u32>,
	pub(crate) total_length: f64,
}

impl Default for SparseIndex {
	fn default() -> Self { Self::new() }
}

impl fmt::Debug for SparseIndex {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("SparseIndex").field("chunks", &self.vectors.len()).field("vocabulary", &self.doc_freq.len()).finish()
	}
}

impl SparseIndex {
	pub fn new() -> Self {
		Self { analyzer: build_analyzer(), vectors: BTreeMap::new(), doc_freq: HashMap::new(), total_length: 0.0 }
	}

	/// Analyzed terms of `text`, in order, duplicates kept.
	pub fn terms(&self, text: &str) -> Vec<String> { analyze(&self.analyzer, text) }

	/// Unique analyzed terms of a query, sorted.
	pub fn query_terms(&self, text: &str) -> Vec<String> {
		self.terms(text).into_iter().collect::<BTreeSet<_>>().into_iter().collect()
	}

	pub fn encode(&self, chunk_id: &str, text: &str) -> SparseVector {
		let mut term_weights = BTreeMap::new();
		for term in self.terms(text) { *term_weights.entry(term).or_insert(0.0) += 1.0; }
		SparseVector { chunk_id: chunk_id.to_string(), term_weights }
	}

	/// Adds (or replaces) the vector for `chunk`.
	pub fn insert(&mut self, chunk: &Chunk) {
		let vector = self.encode(&chunk.id, &chunk.text);
		self.remove(&chunk.id);
		for term in vector.term_weights.keys() { *self.doc_freq.entry(term.clone()).or_insert(0) += 1; }
		self.total_length += f64::from(vector.length());
		tracing::trace!(chunk = %chunk.id, terms = vector.term_weights.len(), "sparse vector indexed");
		self.vectors.insert(chunk.id.clone(), vector);
	}

	pub fn remove(&mut self, chunk_id: &str) -> Option<SparseVector> {
		let vector = self.vectors.remove(chunk_id)?;
		for term in vector.term_weights.keys() {
			if let Some(df) = self.doc_freq.get_mut(term) {
				*df = df.saturating_sub(1);
				if *df == 0 { self.doc_freq.remove(term); }
			}
		}
		self.total_length = (self.total_length - f64::from(vector.length())).max(0.0);
		Some(vector)
	}

	pub fn get(&self, chunk_id: &str) -> Option<&SparseVector> { self.vectors.get(chunk_id) }
	pub fn len(&self) -> usize { self.vectors.len() }
	pub fn is_empty(&self) -> bool { self.vectors.is_empty() }
	pub fn vocabulary_size(&self) -> usize { self.doc_freq.len() }
}
