use std::collections::BTreeMap;

use policydb_core::types::ChunkId;

use crate::index::SparseIndex;

pub const BM25_K1: f32 = 1.2;
pub const BM25_B: f32 = 0.75;

impl SparseIndex {
	/// BM25 inverse document frequency; strictly positive.
	pub fn idf(&self, term: &str) -> f32 {
		let n = self.vectors.len() as f32;
		let df = self.doc_freq.get(term).copied().unwrap_or(0) as f32;
		(1.0 + (n - df + 0.5) / (df + 0.5)).ln()
	}

	fn average_length(&self) -> f32 {
		if self.vectors.is_empty() { 0.0 } else { (self.total_length / self.vectors.len() as f64) as f32 }
	}

	/// Normalized lexical overlap between `query_terms` and one chunk, in `[0, 1]`.
	///
	/// Each matched term contributes its BM25 saturation `tf(k1+1)/(tf+K)`
	/// capped at 1, weighted by idf; the sum is divided by the idf mass of all
	/// query terms, so a chunk containing every query term at average density
	/// scores 1 and unmatched query terms pull the score down.
	pub fn score(&self, query_terms: &[String], chunk_id: &str) -> f32 {
		let Some(vector) = self.vectors.get(chunk_id) else { return 0.0 };
		if query_terms.is_empty() { return 0.0; }
		let avg = self.average_length();
		let norm = if avg > 0.0 { vector.length() / avg } else { 1.0 };
		let k = BM25_K1 * (1.0 - BM25_B + BM25_B * norm);

		let mut matched = 0.0f32;
		let mut total = 0.0f32;
		for term in query_terms {
			let idf = self.idf(term);
			total += idf;
			if let Some(&tf) = vector.term_weights.get(term) {
				if tf > 0.0 { matched += idf * (tf * (BM25_K1 + 1.0) / (tf + k)).min(1.0); }
			}
		}
		if total <= 0.0 { 0.0 } else { (matched / total).clamp(0.0, 1.0) }
	}

	/// Scores every indexed chunk against `query_text`.
	pub fn score_all(&self, query_text: &str) -> BTreeMap<ChunkId, f32> {
		let terms = self.query_terms(query_text);
		self.vectors.keys().map(|id| (id.clone(), self.score(&terms, id))).collect()
	}
}
