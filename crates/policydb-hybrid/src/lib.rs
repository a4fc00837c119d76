//! policydb-hybrid
//!
//! Snapshot-published chunk store over the dense and sparse indexes, and the
//! ranker that fuses their scores into one clause ranking.
pub mod ranker;
pub mod snapshot;

pub use ranker::{fuse, HybridRanker};
pub use snapshot::{CorpusStore, IndexSnapshot};
