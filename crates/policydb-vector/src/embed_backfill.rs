use anyhow::{Result, anyhow};
use indicatif::ProgressBar;

use policydb_core::error::Error;
use policydb_core::traits::Embedder;
use policydb_core::types::{Chunk, DenseVector};

use crate::cache::{hash_content, CacheEntry, EmbeddingCache};

/// Embeds `chunks` in batches of `batch_size`, serving repeated text from
/// `cache`. Output order matches input order.
pub fn embed_chunks(
    chunks: &[Chunk],
    embedder: &dyn Embedder,
    cache: &EmbeddingCache,
    batch_size: usize,
    progress: Option<&ProgressBar>,
) -> Result<Vec<DenseVector>> {
    let mut out = Vec::with_capacity(chunks.len());
    let mut hits = 0usize;
    for batch in chunks.chunks(batch_size.max(1)) {
        let hashes: Vec<String> = batch.iter().map(|c| hash_content(&c.text)).collect();
        let cached = cache.get_many(embedder.id(), &hashes);
        hits += cached.len();

        let mut texts = Vec::new();
        let mut miss_indices = Vec::new();
        for (i, chunk) in batch.iter().enumerate() {
            if !cached.contains_key(&hashes[i]) { texts.push(chunk.text.clone()); miss_indices.push(i); }
        }
        let mut vectors: Vec<Option<Vec<f32>>> = hashes.iter().map(|h| cached.get(h).cloned()).collect();

        if !texts.is_empty() {
            let embs = embedder.embed_batch(&texts).map_err(|e| Error::Embedding(e.to_string()))?;
            if embs.len() != texts.len() {
                return Err(anyhow!("embedder returned {} vectors for {} texts", embs.len(), texts.len()));
            }
            let mut new_entries = Vec::with_capacity(embs.len());
            for (v, &i) in embs.into_iter().zip(&miss_indices) {
                if v.len() != embedder.dim() {
                    return Err(Error::DimensionMismatch { expected: embedder.dim(), actual: v.len() }.into());
                }
                new_entries.push(CacheEntry { content_hash: hashes[i].clone(), embedder_id: embedder.id().to_string(), vector: v.clone() });
                vectors[i] = Some(v);
            }
            cache.put_many(new_entries);
        }

        for (chunk, v) in batch.iter().zip(vectors) {
            let vector = v.ok_or_else(|| anyhow!("no embedding produced for {}", chunk.id))?;
            out.push(DenseVector { chunk_id: chunk.id.clone(), vector });
        }
        if let Some(pb) = progress { pb.inc(batch.len() as u64); }
    }
    tracing::debug!(chunks = chunks.len(), cache_hits = hits, embedder = embedder.id(), "embedded chunks");
    Ok(out)
}
