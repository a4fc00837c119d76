use parking_lot::RwLock;
use std::collections::HashMap;

/// Hex blake3 digest used as the cache key for chunk text.
pub fn hash_content(s: &str) -> String {
    blake3::hash(s.as_bytes()).to_hex().to_string()
}

#[derive(Clone, Debug)]
pub struct CacheEntry {
    pub content_hash: String,
    pub embedder_id: String,
    pub vector: Vec<f32>,
}

/// Embedding cache keyed by `(content_hash, embedder_id)`.
///
/// Consulted before calling an embedder and written through on misses, so
/// re-ingesting unchanged text never recomputes its vector.
#[derive(Debug, Default)]
pub struct EmbeddingCache {
    entries: RwLock<HashMap<(String, String), Vec<f32>>>,
}

impl EmbeddingCache {
    pub fn new() -> Self { Self::default() }

    pub fn get_many(&self, embedder_id: &str, hashes: &[String]) -> HashMap<String, Vec<f32>> {
        let entries = self.entries.read();
        hashes
            .iter()
            .filter_map(|h| entries.get(&(h.clone(), embedder_id.to_string())).map(|v| (h.clone(), v.clone())))
            .collect()
    }

    pub fn put_many(&self, new_entries: Vec<CacheEntry>) {
        if new_entries.is_empty() { return; }
        let mut entries = self.entries.write();
        for e in new_entries { entries.insert((e.content_hash, e.embedder_id), e.vector); }
    }

    pub fn len(&self) -> usize { self.entries.read().len() }
    pub fn is_empty(&self) -> bool { self.entries.read().is_empty() }
}
