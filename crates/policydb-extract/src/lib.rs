//! policydb-extract
//!
//! Turns free-text claim questions into structured [`Entities`]. Every kind
//! is optional and independent; nothing here touches the network.
//!
//! [`Entities`]: policydb_core::types::Entities
pub mod extractor;
pub mod vocabulary;

pub use extractor::EntityExtractor;
