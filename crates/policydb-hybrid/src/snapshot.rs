use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::Arc;

use policydb_core::error::{Error, Result};
use policydb_core::types::{Chunk, ChunkId, DenseVector, DocumentId};
use policydb_text::SparseIndex;
use policydb_vector::DenseIndex;

/// One consistent generation of the corpus: chunks plus both indexes.
/// Never mutated after publication.
#[derive(Debug, Clone, Default)]
pub struct IndexSnapshot {
    pub generation: u64,
    pub chunks: BTreeMap<ChunkId, Chunk>,
    pub dense: DenseIndex,
    pub sparse: SparseIndex,
}

impl IndexSnapshot {
    pub fn chunk(&self, id: &str) -> Option<&Chunk> { self.chunks.get(id) }
    pub fn len(&self) -> usize { self.chunks.len() }
    pub fn is_empty(&self) -> bool { self.chunks.is_empty() }

    pub fn documents(&self) -> BTreeSet<DocumentId> {
        self.chunks.values().map(|c| c.document_id.clone()).collect()
    }

    pub fn chunk_ids_of(&self, document_id: &str) -> Vec<ChunkId> {
        self.chunks.values().filter(|c| c.document_id == document_id).map(|c| c.id.clone()).collect()
    }

    fn drop_document(&mut self, document_id: &str) -> usize {
        let ids = self.chunk_ids_of(document_id);
        for id in &ids {
            self.chunks.remove(id);
            self.dense.remove(id);
            self.sparse.remove(id);
        }
        ids.len()
    }
}

/// Holder of the current [`IndexSnapshot`].
///
/// Readers take an `Arc` under a short read lock and keep using it for the
/// whole query. Writers are serialized, build the next generation on a
/// private copy and publish it in one swap, so readers never observe a
/// half-applied ingest.
#[derive(Debug, Default)]
pub struct CorpusStore {
    current: RwLock<Arc<IndexSnapshot>>,
    writer: Mutex<()>,
}

impl CorpusStore {
    pub fn new() -> Self { Self::default() }

    pub fn snapshot(&self) -> Arc<IndexSnapshot> { self.current.read().clone() }

    pub fn generation(&self) -> u64 { self.current.read().generation }

    /// Adds chunks with their embeddings. Documents named by `chunks` replace
    /// any earlier version of themselves. Returns the published generation.
    pub fn ingest(&self, chunks: Vec<Chunk>, vectors: Vec<DenseVector>) -> Result<u64> {
        if chunks.len() != vectors.len() {
            return Err(Error::Operation(format!("{} chunks but {} vectors", chunks.len(), vectors.len())));
        }
        let mut seen = HashSet::new();
        for (chunk, vector) in chunks.iter().zip(&vectors) {
            if chunk.id != vector.chunk_id {
                return Err(Error::Operation(format!("vector for {} paired with chunk {}", vector.chunk_id, chunk.id)));
            }
            if !seen.insert(chunk.id.as_str()) {
                return Err(Error::Operation(format!("duplicate chunk id {}", chunk.id)));
            }
        }

        let _guard = self.writer.lock();
        let mut next = (*self.snapshot()).clone();
        let documents: BTreeSet<&str> = chunks.iter().map(|c| c.document_id.as_str()).collect();
        for doc in &documents {
            let replaced = next.drop_document(doc);
            if replaced > 0 { tracing::debug!(document = doc, replaced, "replacing document"); }
        }
        let document_count = documents.len();
        for (chunk, vector) in chunks.into_iter().zip(vectors) {
            next.dense.insert(vector)?;
            next.sparse.insert(&chunk);
            next.chunks.insert(chunk.id.clone(), chunk);
        }
        next.generation += 1;
        let generation = next.generation;
        *self.current.write() = Arc::new(next);
        tracing::info!(generation, documents = document_count, "published snapshot");
        Ok(generation)
    }

    /// Removes every chunk of `document_id`. Returns how many were removed.
    pub fn remove_document(&self, document_id: &str) -> Result<usize> {
        let _guard = self.writer.lock();
        let mut next = (*self.snapshot()).clone();
        let removed = next.drop_document(document_id);
        if removed == 0 { return Err(Error::NotFound(format!("document {document_id}"))); }
        next.generation += 1;
        let generation = next.generation;
        *self.current.write() = Arc::new(next);
        tracing::info!(generation, document = document_id, removed, "removed document");
        Ok(removed)
    }
}
