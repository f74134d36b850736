//! Document ingestion: text extraction and cleaning, chunking, and
//! defined-term extraction.

pub mod chunker;
pub mod definitions;
pub mod extract;
