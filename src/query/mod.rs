//! Query surface (stage S9).
//!
//! Fixed parametric lookups over the populated graph: concept lookup,
//! evidence (provenance), and neighborhood exploration. Results are typed;
//! driver errors collapse to a generic internal category so server-side
//! detail never reaches a caller's payload.

pub mod service;

pub use service::QueryService;

use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum QueryError {
    /// The id or lemma resolves to nothing.
    #[error("not found: {0}")]
    NotFound(String),
    /// Anything else. Detail goes to the log, never into this message.
    #[error("internal graph query error")]
    Internal,
}

/// Which end of a relation the queried concept sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Direction {
    Outgoing,
    Incoming,
}

/// A concept row, with how often it is mentioned.
#[derive(Debug, Clone, Serialize)]
pub struct ConceptRecord {
    pub concept_id: String,
    pub lemma: String,
    pub surface: String,
    pub origin: String,
    pub mention_count: i64,
}

/// One chunk of evidence for a concept.
#[derive(Debug, Clone, Serialize)]
pub struct EvidenceRecord {
    pub chunk_id: String,
    pub doc_id: String,
    pub text: String,
    pub source_uri: String,
    pub span_start: i64,
    pub span_end: i64,
}

/// One typed relation from or to the queried concept.
#[derive(Debug, Clone, Serialize)]
pub struct NeighborRecord {
    pub predicate: String,
    pub direction: Direction,
    pub concept_id: String,
    pub lemma: String,
    pub confidence: Option<f64>,
}
