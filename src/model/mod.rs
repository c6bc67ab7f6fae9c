//! Core domain vocabulary.
//!
//! - Chunk: immutable unit of ingest with provenance
//! - Concept: canonical entity keyed by a lemma hash
//! - Mention: chunk→concept containment
//! - CoOccurrence / RelationCandidate: canonically ordered concept pairs
//! - LlmVerdict / ScoredRelation: the scorer's output
//! - GraphWrite: the sink's input command (tagged sum, two cases)

mod lemma;

pub use lemma::{concept_id, normalize_lemma};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Node label for chunk nodes.
pub const CHUNK_LABEL: &str = "Chunk";
/// Node label for concept nodes.
pub const CONCEPT_LABEL: &str = "Concept";
/// Relationship type linking a chunk to a concept it contains.
pub const MENTIONS_REL: &str = "MENTIONS";
/// Evidence carried on a relation candidate is capped at this many characters.
pub const EVIDENCE_LIMIT: usize = 500;

/// Character offsets into the source document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub start: i64,
    pub end: i64,
}

/// An immutable unit of ingest. Created by the parse stage from one input
/// record; never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    #[serde(rename = "chunkId")]
    pub chunk_id: String,
    #[serde(rename = "docId")]
    pub doc_id: String,
    pub span: Span,
    pub text: String,
    #[serde(rename = "sourceUri")]
    pub source_uri: String,
    pub hash: String,
}

/// A canonical entity extracted from a chunk.
///
/// `concept_id` is a pure function of `lemma` (see [`concept_id`]); `surface`
/// is the text as it first appeared; `origin` tags the extraction method
/// (`NER_<TYPE>`, `POS_<TAG>`, `NER`, `camelCase`, `acronym`, `technicalTerm`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Concept {
    pub concept_id: String,
    pub lemma: String,
    pub surface: String,
    pub origin: String,
}

impl Concept {
    /// Build a concept from a raw surface/lemma candidate. The lemma is
    /// normalized and the id derived from it.
    pub fn new(lemma_source: &str, surface: impl Into<String>, origin: impl Into<String>) -> Self {
        let lemma = normalize_lemma(lemma_source);
        let concept_id = concept_id(&lemma);
        Self {
            concept_id,
            lemma,
            surface: surface.into(),
            origin: origin.into(),
        }
    }
}

/// A chunk→concept containment edge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mention {
    pub chunk_id: String,
    pub concept: Concept,
}

/// An unordered pair of distinct concepts co-observed in one chunk.
///
/// Canonical ordering: the concept with the lexicographically smaller
/// `concept_id` is `a`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoOccurrence {
    pub a: Concept,
    pub b: Concept,
    /// The originating chunk's id.
    pub window_id: String,
    /// One observation per chunk, pre-aggregation.
    pub freq: u64,
}

impl CoOccurrence {
    /// Pair two concepts, swapping into canonical order.
    pub fn new(x: Concept, y: Concept, window_id: impl Into<String>) -> Self {
        let (a, b) = if x.concept_id <= y.concept_id {
            (x, y)
        } else {
            (y, x)
        };
        Self {
            a,
            b,
            window_id: window_id.into(),
            freq: 1,
        }
    }
}

/// A co-occurrence enriched with the textual evidence the scorer will see.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationCandidate {
    pub pair: CoOccurrence,
    /// The originating chunk's text, truncated to [`EVIDENCE_LIMIT`] characters.
    pub evidence: String,
}

impl RelationCandidate {
    pub fn new(pair: CoOccurrence, chunk_text: &str) -> Self {
        Self {
            pair,
            evidence: truncate_chars(chunk_text, EVIDENCE_LIMIT),
        }
    }
}

/// Truncate to at most `limit` characters, respecting char boundaries.
pub fn truncate_chars(text: &str, limit: usize) -> String {
    text.chars().take(limit).collect()
}

/// The LLM's judgment for one relation candidate.
#[derive(Debug, Clone, PartialEq)]
pub struct LlmVerdict {
    /// A predicate from the configured set (`related_to` after collapse).
    pub predicate: String,
    /// Clamped to [0, 1].
    pub confidence: f64,
    /// A short substring of the candidate's evidence.
    pub evidence: String,
    /// Provenance token, `<aLemma>_<predicate>_<bLemma>` when constructed.
    pub reference: String,
}

/// A verdict that met the confidence threshold, joined to its pair.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredRelation {
    pub a: Concept,
    pub b: Concept,
    pub predicate: String,
    pub confidence: f64,
    pub evidence: String,
}

/// A property value the sink can persist.
#[derive(Debug, Clone, PartialEq)]
pub enum PropValue {
    Str(String),
    Int(i64),
    Float(f64),
}

impl From<&str> for PropValue {
    fn from(v: &str) -> Self {
        PropValue::Str(v.to_string())
    }
}

impl From<String> for PropValue {
    fn from(v: String) -> Self {
        PropValue::Str(v)
    }
}

impl From<i64> for PropValue {
    fn from(v: i64) -> Self {
        PropValue::Int(v)
    }
}

impl From<f64> for PropValue {
    fn from(v: f64) -> Self {
        PropValue::Float(v)
    }
}

/// Property bag for a graph write. BTreeMap keeps generated query text
/// deterministic.
pub type Props = BTreeMap<String, PropValue>;

/// The sink's input command.
#[derive(Debug, Clone, PartialEq)]
pub enum GraphWrite {
    UpsertNode {
        label: String,
        id: String,
        props: Props,
    },
    UpsertEdge {
        from_label: String,
        from_id: String,
        rel: String,
        to_label: String,
        to_id: String,
        props: Props,
    },
}

impl GraphWrite {
    pub fn node(label: impl Into<String>, id: impl Into<String>, props: Props) -> Self {
        GraphWrite::UpsertNode {
            label: label.into(),
            id: id.into(),
            props,
        }
    }

    pub fn edge(
        from_label: impl Into<String>,
        from_id: impl Into<String>,
        rel: impl Into<String>,
        to_label: impl Into<String>,
        to_id: impl Into<String>,
        props: Props,
    ) -> Self {
        GraphWrite::UpsertEdge {
            from_label: from_label.into(),
            from_id: from_id.into(),
            rel: rel.into(),
            to_label: to_label.into(),
            to_id: to_id.into(),
            props,
        }
    }
}

/// Canonical relationship type: uppercased, non-`[A-Z0-9_]` replaced with `_`.
pub fn canonical_rel_type(predicate: &str) -> String {
    predicate
        .to_uppercase()
        .chars()
        .map(|c| {
            if c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}
