//! Neo4j sink: a batched, transactional, idempotent upserter.
//!
//! Every buffered command becomes one MERGE statement inside a single
//! explicit transaction per flush. Labels and relationship types are
//! sanitized identifiers interpolated into the statement text (Cypher cannot
//! parameterize them); every value travels as a bolt parameter. Endpoint
//! MERGE is intentional: an edge arriving before its node's full properties
//! creates a placeholder that a later node upsert completes.

use super::{id_property, GraphSink, SinkError};
use crate::config::GraphConfig;
use crate::model::{canonical_rel_type, GraphWrite, PropValue, Props};
use async_trait::async_trait;
use neo4rs::{query, ConfigBuilder, Graph, Query};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Open a bolt connection pinned to the configured database and smoke-test
/// it with `RETURN 1`. Shared with the query surface.
pub async fn connect(cfg: &GraphConfig) -> Result<Graph, SinkError> {
    let config = ConfigBuilder::default()
        .uri(&cfg.uri)
        .user(&cfg.user)
        .password(&cfg.password)
        .db(cfg.database.as_str())
        .build()
        .map_err(|e| SinkError::Connect(e.to_string()))?;
    let graph = Graph::connect(config)
        .await
        .map_err(|e| SinkError::Connect(e.to_string()))?;
    graph
        .run(query("RETURN 1"))
        .await
        .map_err(|e| SinkError::Connect(format!("smoke test failed: {e}")))?;
    Ok(graph)
}

/// Batched transactional sink over a Neo4j database.
pub struct Neo4jSink {
    graph: Graph,
    buffer: Vec<GraphWrite>,
    batch_size: usize,
    max_retries: u32,
    closed: bool,
}

impl Neo4jSink {
    /// Connect and smoke-test; failure here is fatal to the worker.
    pub async fn open(cfg: &GraphConfig) -> Result<Self, SinkError> {
        let graph = connect(cfg).await?;
        info!(uri = %cfg.uri, database = %cfg.database, "graph sink open");
        Ok(Self {
            graph,
            buffer: Vec::with_capacity(cfg.batch_size),
            batch_size: cfg.batch_size.max(1),
            max_retries: cfg.max_retries.max(1),
            closed: false,
        })
    }

    /// One transaction over the whole buffer. The buffer is kept on failure
    /// so the batch can retry.
    async fn try_commit(&mut self) -> Result<(), String> {
        let now = chrono::Utc::now().timestamp_millis();
        let mut txn = self
            .graph
            .start_txn()
            .await
            .map_err(|e| e.to_string())?;
        for write in &self.buffer {
            if let Err(e) = txn.run(to_query(write, now)).await {
                let message = e.to_string();
                let _ = txn.rollback().await;
                return Err(message);
            }
        }
        txn.commit().await.map_err(|e| e.to_string())
    }
}

#[async_trait]
impl GraphSink for Neo4jSink {
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
        let mut last = String::new();
        for attempt in 1..=self.max_retries {
            match self.try_commit().await {
                Ok(()) => {
                    debug!(commands = self.buffer.len(), "batch committed");
                    self.buffer.clear();
                    return Ok(());
                }
                Err(e) => {
                    warn!(attempt, error = %e, "batch commit failed");
                    last = e;
                    if attempt < self.max_retries {
                        tokio::time::sleep(Duration::from_secs(attempt as u64)).await;
                    }
                }
            }
        }
        Err(SinkError::CommitExhausted {
            attempts: self.max_retries,
            last,
        })
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

/// Strip anything that is not `[A-Za-z0-9_]` from a label.
fn sanitize_label(label: &str) -> String {
    label
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
        .collect()
}

/// Property names appearing in statement text get the same treatment.
fn sanitize_prop(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Statement text for a node upsert: MERGE on the id property, SET the rest.
fn node_statement(label: &str, props: &Props) -> String {
    let label = sanitize_label(label);
    let mut text = format!("MERGE (n:{} {{{}: $id}})", label, id_property(&label));
    if !props.is_empty() {
        let assignments: Vec<String> = props
            .keys()
            .enumerate()
            .map(|(i, key)| format!("n.{} = $p{}", sanitize_prop(key), i))
            .collect();
        text.push_str(" SET ");
        text.push_str(&assignments.join(", "));
    }
    text
}

/// Statement text for an edge upsert: MERGE both endpoints, MERGE the typed
/// relationship, SET props plus `updatedAt`.
fn edge_statement(from_label: &str, rel: &str, to_label: &str, props: &Props) -> String {
    let from_label = sanitize_label(from_label);
    let to_label = sanitize_label(to_label);
    let rel = canonical_rel_type(rel);
    let mut assignments: Vec<String> = props
        .keys()
        .enumerate()
        .map(|(i, key)| format!("r.{} = $p{}", sanitize_prop(key), i))
        .collect();
    assignments.push("r.updatedAt = $now".to_string());
    format!(
        "MERGE (a:{} {{{}: $from}}) MERGE (b:{} {{{}: $to}}) MERGE (a)-[r:{}]->(b) SET {}",
        from_label,
        id_property(&from_label),
        to_label,
        id_property(&to_label),
        rel,
        assignments.join(", "),
    )
}

fn with_prop(q: Query, name: String, value: &PropValue) -> Query {
    match value {
        PropValue::Str(s) => q.param(&name, s.clone()),
        PropValue::Int(i) => q.param(&name, *i),
        PropValue::Float(f) => q.param(&name, *f),
    }
}

/// Build the parameterized query for one command.
fn to_query(write: &GraphWrite, now_millis: i64) -> Query {
    match write {
        GraphWrite::UpsertNode { label, id, props } => {
            let mut q = query(&node_statement(label, props)).param("id", id.clone());
            for (i, value) in props.values().enumerate() {
                q = with_prop(q, format!("p{i}"), value);
            }
            q
        }
        GraphWrite::UpsertEdge {
            from_label,
            from_id,
            rel,
            to_label,
            to_id,
            props,
        } => {
            let mut q = query(&edge_statement(from_label, rel, to_label, props))
                .param("from", from_id.clone())
                .param("to", to_id.clone())
                .param("now", now_millis);
            for (i, value) in props.values().enumerate() {
                q = with_prop(q, format!("p{i}"), value);
            }
            q
        }
    }
}
