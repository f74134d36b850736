//! Derived indexes over chunks and definitions.
//!
//! All three are written only by the sync engine; the query path reads
//! them concurrently. Every entry carries its owning document id so a
//! document's entries can be cascade-deleted as a unit.

pub mod definitions;
pub mod lexical;
pub mod vector;
