//! Retrieval pipeline: parallel signal fan-out and merge ([`hybrid`]),
//! then precision reranking ([`rerank`]).

pub mod hybrid;
pub mod rerank;
