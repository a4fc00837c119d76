//! policydb-vector
//!
//! In-memory dense index over chunk embeddings, plus the embedding cache and
//! the batch embedding step that feeds it.
pub mod cache;
pub mod embed_backfill;
pub mod index;

pub use cache::{CacheEntry, EmbeddingCache};
pub use embed_backfill::embed_chunks;
pub use index::{cosine, DenseIndex};
