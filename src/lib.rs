//! # lexcite
//!
//! A retrieval engine for legal document collections: contracts, leases,
//! policies, and regulations in English and Hebrew. Documents on disk are
//! synced into three parallel indexes and questions are answered with a
//! citation-backed context block assembled from the best passages.
//!
//! ## Architecture
//!
//! ```text
//!                       ┌──────────────┐
//!                       │   Question    │
//!                       └──────┬────────┘
//!                              │
//!           ┌──────────────────┼──────────────────┐
//!           ▼                  ▼                  ▼
//!    ┌─────────────┐   ┌─────────────┐   ┌──────────────┐
//!    │  Semantic    │   │   Lexical   │   │  Definitions │
//!    │ (embeddings) │   │ (BM25)      │   │ (term lookup │
//!    │              │   │             │   │  + fallback) │
//!    └──────┬──────┘   └──────┬──────┘   └──────┬───────┘
//!           │                 │                 │
//!           └─────────────────┼─────────────────┘
//!                             │ merge by id, union provenance
//!                             ▼
//!                ┌─────────────────────────┐
//!                │  Candidate set (≤ 30)   │
//!                │  defs > multi > single  │
//!                └────────────┬────────────┘
//!                             │
//!                             ▼
//!                ┌─────────────────────────┐
//!                │  Cross-encoder rerank   │
//!                │  (merge-order fallback) │
//!                └────────────┬────────────┘
//!                             │ top 5
//!                             ▼
//!                ┌─────────────────────────┐
//!                │   Context assembly      │
//!                │  numbered passages +    │
//!                │  aligned citations      │
//!                └─────────────────────────┘
//! ```
//!
//! ## Module Overview
//!
//! - [`config`] - Environment-based configuration for data dirs, chunking, retrieval, and model endpoints
//! - [`models`] - Shared data types: `Chunk`, `Definition`, `SearchHit`, `Citation`, request/response types
//! - [`error`] - Engine error taxonomy
//! - [`ingest`] - Text extraction with legal-grade cleaning, paragraph/sentence chunking, definition extraction
//! - [`index`] - The three indexes: tantivy BM25, in-memory vectors with persistence, definition records
//! - [`sync`] - Hash-diff document sync with per-document failure isolation
//! - [`search::hybrid`] - Parallel signal fan-out and provenance-preserving merge
//! - [`search::rerank`] - Cross-encoder precision reranking with deterministic tie-breaking
//! - [`context`] - Context block assembly with positionally aligned citations
//! - [`llm`] - Embedding and cross-encoder clients (Ollama / OpenAI-compatible)
//! - [`api`] - Axum HTTP handlers for query, sync, and status
//! - [`state`] - Shared application state wiring indexes, clients, and the sync engine

pub mod api;
pub mod config;
pub mod context;
pub mod error;
pub mod index;
pub mod ingest;
pub mod llm;
pub mod models;
pub mod search;
pub mod state;
pub mod sync;
