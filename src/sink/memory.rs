//! In-memory sink with the exact MERGE+SET semantics of the production
//! upserter. Backs the end-to-end tests and the idempotence invariants.

use super::{id_property, GraphSink, SinkError};
use crate::model::{canonical_rel_type, GraphWrite, PropValue, Props};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

/// Key for an edge: (from_label, from_id, rel, to_label, to_id).
pub type EdgeKey = (String, String, String, String, String);

/// A property graph held in maps. Mutations mirror the Cypher the production
/// sink emits: MERGE by (label, id-property), then SET every prop;
/// relationship upserts always touch `updatedAt`.
#[derive(Debug, Default)]
pub struct MemoryGraph {
    nodes: BTreeMap<(String, String), Props>,
    edges: BTreeMap<EdgeKey, Props>,
}

impl MemoryGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one command at the given wall-clock instant.
    pub fn apply(&mut self, write: &GraphWrite, now_millis: i64) {
        match write {
            GraphWrite::UpsertNode { label, id, props } => {
                let entry = self.ensure_node(label, id);
                for (k, v) in props {
                    entry.insert(k.clone(), v.clone());
                }
            }
            GraphWrite::UpsertEdge {
                from_label,
                from_id,
                rel,
                to_label,
                to_id,
                props,
            } => {
                // endpoint MERGE first: an edge may arrive before its nodes
                self.ensure_node(from_label, from_id);
                self.ensure_node(to_label, to_id);

                let key = (
                    from_label.clone(),
                    from_id.clone(),
                    canonical_rel_type(rel),
                    to_label.clone(),
                    to_id.clone(),
                );
                let entry = self.edges.entry(key).or_default();
                for (k, v) in props {
                    entry.insert(k.clone(), v.clone());
                }
                entry.insert("updatedAt".to_string(), PropValue::Int(now_millis));
            }
        }
    }

    fn ensure_node(&mut self, label: &str, id: &str) -> &mut Props {
        let entry = self
            .nodes
            .entry((label.to_string(), id.to_string()))
            .or_default();
        entry
            .entry(id_property(label).to_string())
            .or_insert_with(|| PropValue::Str(id.to_string()));
        entry
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn node(&self, label: &str, id: &str) -> Option<&Props> {
        self.nodes.get(&(label.to_string(), id.to_string()))
    }

    pub fn edge(
        &self,
        from_label: &str,
        from_id: &str,
        rel: &str,
        to_label: &str,
        to_id: &str,
    ) -> Option<&Props> {
        self.edges.get(&(
            from_label.to_string(),
            from_id.to_string(),
            canonical_rel_type(rel),
            to_label.to_string(),
            to_id.to_string(),
        ))
    }

    /// Edges of a given type, as (from_id, to_id, props).
    pub fn edges_of_type(&self, rel: &str) -> Vec<(&str, &str, &Props)> {
        let wanted = canonical_rel_type(rel);
        self.edges
            .iter()
            .filter(|((_, _, r, _, _), _)| *r == wanted)
            .map(|((_, from, _, _, to), props)| (from.as_str(), to.as_str(), props))
            .collect()
    }

    /// Nodes with a given label, as (id, props).
    pub fn nodes_with_label(&self, label: &str) -> Vec<(&str, &Props)> {
        self.nodes
            .iter()
            .filter(|((l, _), _)| l == label)
            .map(|((_, id), props)| (id.as_str(), props))
            .collect()
    }

    /// Graph content with every `updatedAt` removed. Two runs over the same
    /// command stream produce equal fingerprints.
    pub fn fingerprint(&self) -> (BTreeMap<(String, String), Props>, BTreeMap<EdgeKey, Props>) {
        let edges = self
            .edges
            .iter()
            .map(|(k, props)| {
                let mut props = props.clone();
                props.remove("updatedAt");
                (k.clone(), props)
            })
            .collect();
        (self.nodes.clone(), edges)
    }
}

/// [`GraphSink`] over a shared [`MemoryGraph`]. Each sink owns its buffer;
/// many sinks may share one store.
pub struct MemorySink {
    store: Arc<Mutex<MemoryGraph>>,
    buffer: Vec<GraphWrite>,
    batch_size: usize,
    closed: bool,
}

impl MemorySink {
    pub fn new(store: Arc<Mutex<MemoryGraph>>, batch_size: usize) -> Self {
        Self {
            store,
            buffer: Vec::new(),
            batch_size: batch_size.max(1),
            closed: false,
        }
    }
}

#[async_trait]
impl GraphSink for MemorySink {
    async fn submit(&mut self, write: GraphWrite) -> Result<(), SinkError> {
        if self.closed {
            return Err(SinkError::Closed);
        }
        self.buffer.push(write);
        if self.buffer.len() >= self.batch_size {
            self.flush().await?;
        }
        Ok(())
    }

    async fn flush(&mut self) -> Result<(), SinkError> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        let now = chrono::Utc::now().timestamp_millis();
        let mut store = self.store.lock().expect("memory graph poisoned");
        for write in self.buffer.drain(..) {
            store.apply(&write, now);
        }
        Ok(())
    }

    async fn close(&mut self) -> Result<(), SinkError> {
        if self.closed {
            return Ok(());
        }
        self.flush().await?;
        self.closed = true;
        Ok(())
    }
}
