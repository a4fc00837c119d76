//! policydb-embed
//!
//! Embedding providers behind `policydb_core::traits::Embedder`: a local
//! transformer model and a deterministic feature-hashing fallback.
use anyhow::{Result, anyhow};
use std::sync::Arc;

use policydb_core::config::{expand_path, EmbeddingBackend, EmbeddingConfig};
use policydb_core::traits::Embedder;

pub mod hashing;
pub mod model;
pub mod pool;
pub mod tokenize;

pub use hashing::HashingEmbedder;
pub use model::EmbeddingModel;
pub use pool::masked_mean_l2;

/// Builds the embedder selected by `config.backend`.
pub fn default_embedder(config: &EmbeddingConfig) -> Result<Arc<dyn Embedder>> {
    match config.backend {
        EmbeddingBackend::Hashing => {
            tracing::info!(dim = config.dim, "using hashing embedder");
            Ok(Arc::new(HashingEmbedder::new(config.dim)))
        }
        EmbeddingBackend::Model => {
            let dir = config.model_dir.as_deref().ok_or_else(|| anyhow!("embedding.model_dir is not set"))?;
            let dir = expand_path(dir);
            if !dir.exists() { return Err(anyhow!("Could not locate model directory {}", dir.display())); }
            Ok(Arc::new(EmbeddingModel::load(&dir, config.max_len)?))
        }
    }
}
