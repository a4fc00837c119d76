use std::hash::Hasher;

use anyhow::Result;
use policydb_core::traits::Embedder;
use twox_hash::XxHash64;

/// Model-free embedder: signed feature hashing of lowercased words,
/// L2-normalized. Texts sharing vocabulary get high cosine similarity, which
/// is enough for tests and offline use without model files.
pub struct HashingEmbedder { dim: usize, id: String }

impl HashingEmbedder {
    pub fn new(dim: usize) -> Self { Self { dim: dim.max(1), id: format!("hashing:d{}", dim.max(1)) } }

    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0f32; self.dim];
        for token in text.split(|c: char| !c.is_alphanumeric()).filter(|t| !t.is_empty()) {
            let mut hasher = XxHash64::with_seed(0);
            hasher.write(token.to_lowercase().as_bytes());
            let h = hasher.finish();
            let idx = (h % self.dim as u64) as usize;
            let sign = if (h >> 63) == 0 { 1.0 } else { -1.0 };
            v[idx] += sign;
        }
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 { for x in &mut v { *x /= norm; } }
        v
    }
}

impl Embedder for HashingEmbedder {
    fn id(&self) -> &str { &self.id }
    fn dim(&self) -> usize { self.dim }
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_text(t)).collect())
    }
}
