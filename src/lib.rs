//! Weft: concept graph ingestion engine.
//!
//! Weft tails a stream of text chunk records, extracts named concepts from
//! each chunk, discovers candidate relations between co-occurring concepts,
//! scores those candidates with an external LLM, and upserts the result into
//! a property graph. A query layer answers concept, evidence, and
//! neighborhood lookups against the populated graph.
//!
//! # Shape
//!
//! - [`model`]: chunks, concepts, pairs, verdicts, graph write commands
//! - [`extract`]: rule annotator + regex heuristics
//! - [`llm`]: the external generative client (Ollama wire protocol)
//! - [`score`]: prompt construction and lenient verdict parsing
//! - [`pipeline`]: source → parse → extract → pair → score → materialize
//! - [`sink`]: batched transactional upserters (Neo4j, in-memory)
//! - [`query`]: fixed parametric lookups
//! - [`config`]: layered configuration with environment overrides

pub mod config;
pub mod extract;
pub mod llm;
pub mod model;
pub mod pipeline;
pub mod query;
pub mod score;
pub mod sink;

pub use config::{ConfigError, WeftConfig};
pub use extract::ConceptExtractor;
pub use llm::{LlmClient, LlmError, MockLlm, OllamaClient};
pub use model::{
    Chunk, Concept, CoOccurrence, GraphWrite, LlmVerdict, Mention, PropValue, RelationCandidate,
    ScoredRelation, Span,
};
pub use pipeline::{source::LineSource, PipelineOptions, PipelineReport};
pub use query::{ConceptRecord, EvidenceRecord, NeighborRecord, QueryError, QueryService};
pub use score::RelationScorer;
pub use sink::{GraphSink, MemoryGraph, MemorySink, Neo4jSink, SinkError};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
