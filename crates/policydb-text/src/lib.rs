//! policydb-text
//!
//! Sparse (lexical) side of hybrid retrieval: tantivy's analyzer pipeline
//! turns chunk text into term-frequency vectors, and a BM25-derived score
//! normalized to `[0, 1]` compares them with a query.
pub mod tantivy_utils;
pub mod index;
pub mod search;

pub use index::SparseIndex;
pub use search::{BM25_B, BM25_K1};
