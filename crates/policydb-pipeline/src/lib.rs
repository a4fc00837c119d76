//! policydb-pipeline
//!
//! End-to-end query answering: extraction, hybrid retrieval, rule
//! evaluation, decision synthesis and trace recording, run as explicit
//! stages under timeouts with cooperative cancellation.
pub mod cancel;
pub mod pipeline;
pub mod response;
pub mod stages;

pub use cancel::CancelToken;
pub use pipeline::Pipeline;
pub use response::{QueryRequest, QueryResponse, SupportingClause};
