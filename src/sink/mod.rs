//! Graph sink (stage S7).
//!
//! The sink is the seam through which the pipeline pushes graph mutations.
//! Implementations batch commands and commit them transactionally with
//! idempotent MERGE semantics; replaying the same command stream leaves the
//! graph indistinguishable from a single run, modulo `updatedAt`.

pub mod memory;
pub mod neo4j;

pub use memory::{MemoryGraph, MemorySink};
pub use neo4j::Neo4jSink;

use crate::model::GraphWrite;
use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("sink connect failed: {0}")]
    Connect(String),
    #[error("commit failed after {attempts} attempts: {last}")]
    CommitExhausted { attempts: u32, last: String },
    #[error("sink already closed")]
    Closed,
}

/// A batching, transactional destination for graph write commands.
///
/// Sink instances are single-owner: each pipeline worker holds its own, and
/// buffers are never shared. Concurrent sinks may commit overlapping batches
/// safely because every write is commutative under MERGE plus SET.
#[async_trait]
pub trait GraphSink: Send {
    /// Buffer one command; flushes automatically when the batch fills.
    async fn submit(&mut self, write: GraphWrite) -> Result<(), SinkError>;

    /// Commit everything buffered. A no-op on an empty buffer.
    async fn flush(&mut self) -> Result<(), SinkError>;

    /// Flush the residual buffer, then release the connection. Further
    /// submits fail with [`SinkError::Closed`].
    async fn close(&mut self) -> Result<(), SinkError>;
}

/// The merge key property for a node label.
pub fn id_property(label: &str) -> &'static str {
    match label {
        "Chunk" => "chunkId",
        "Concept" => "conceptId",
        _ => "id",
    }
}
