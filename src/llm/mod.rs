//! Clients for external model capabilities: embedding generation and
//! cross-encoder scoring. Both are consumed as black boxes; the retrieval
//! logic never depends on a specific vendor.

pub mod cross_encoder;
pub mod embeddings;
