//! Fixed parametric lookups over a live graph connection.

use super::{ConceptRecord, Direction, EvidenceRecord, NeighborRecord, QueryError};
use neo4rs::{query, Graph, Row};
use tracing::error;

/// Default page size when the caller passes 0.
const DEFAULT_LIMIT: usize = 25;
/// Hard ceiling on any page size.
const MAX_LIMIT: usize = 1_000;

const CONCEPT_CYPHER: &str = "\
MATCH (c:Concept) WHERE c.conceptId = $key OR c.lemma = $key \
OPTIONAL MATCH (ch:Chunk)-[:MENTIONS]->(c) \
RETURN c.conceptId AS conceptId, c.lemma AS lemma, c.surface AS surface, \
       c.origin AS origin, count(ch) AS mentionCount \
LIMIT 1";

const SEARCH_CYPHER: &str = "\
MATCH (c:Concept) WHERE c.lemma CONTAINS $fragment \
OPTIONAL MATCH (ch:Chunk)-[:MENTIONS]->(c) \
RETURN c.conceptId AS conceptId, c.lemma AS lemma, c.surface AS surface, \
       c.origin AS origin, count(ch) AS mentionCount \
ORDER BY lemma LIMIT $limit";

const EVIDENCE_CYPHER: &str = "\
MATCH (ch:Chunk)-[:MENTIONS]->(c:Concept {conceptId: $id}) \
RETURN ch.chunkId AS chunkId, ch.docId AS docId, ch.text AS text, \
       ch.sourceUri AS sourceUri, ch.spanStart AS spanStart, ch.spanEnd AS spanEnd \
ORDER BY chunkId LIMIT $limit";

const NEIGHBORHOOD_CYPHER: &str = "\
MATCH (c:Concept {conceptId: $id})-[r]-(n:Concept) \
RETURN type(r) AS predicate, startNode(r) = c AS outgoing, \
       n.conceptId AS conceptId, n.lemma AS lemma, r.confidence AS confidence \
ORDER BY predicate, conceptId LIMIT $limit";

/// Clamp a caller-supplied page size into [1, MAX_LIMIT]; 0 selects the
/// default.
fn clamp_limit(limit: usize) -> i64 {
    if limit == 0 {
        DEFAULT_LIMIT as i64
    } else {
        limit.min(MAX_LIMIT) as i64
    }
}

fn internal(context: &str, e: impl std::fmt::Display) -> QueryError {
    error!(context, error = %e, "graph query failed");
    QueryError::Internal
}

/// The read side of the graph. Holds one connection; lookups are fixed
/// Cypher statements with parameters only.
pub struct QueryService {
    graph: Graph,
}

impl QueryService {
    pub fn new(graph: Graph) -> Self {
        Self { graph }
    }

    /// Look a concept up by `conceptId` or exact lemma.
    pub async fn concept(&self, key: &str) -> Result<ConceptRecord, QueryError> {
        let mut rows = self
            .graph
            .execute(query(CONCEPT_CYPHER).param("key", key))
            .await
            .map_err(|e| internal("concept", e))?;

        match rows.next().await.map_err(|e| internal("concept", e))? {
            Some(row) => concept_from_row(&row).map_err(|e| internal("concept row", e)),
            None => Err(QueryError::NotFound(key.to_string())),
        }
    }

    /// Concepts whose lemma contains the fragment.
    pub async fn search(
        &self,
        fragment: &str,
        limit: usize,
    ) -> Result<Vec<ConceptRecord>, QueryError> {
        let mut rows = self
            .graph
            .execute(
                query(SEARCH_CYPHER)
                    .param("fragment", fragment)
                    .param("limit", clamp_limit(limit)),
            )
            .await
            .map_err(|e| internal("search", e))?;

        let mut records = Vec::new();
        while let Some(row) = rows.next().await.map_err(|e| internal("search", e))? {
            records.push(concept_from_row(&row).map_err(|e| internal("search row", e))?);
        }
        Ok(records)
    }

    /// Chunks mentioning the concept, with provenance fields.
    pub async fn evidence(
        &self,
        key: &str,
        limit: usize,
    ) -> Result<Vec<EvidenceRecord>, QueryError> {
        let concept = self.concept(key).await?;

        let mut rows = self
            .graph
            .execute(
                query(EVIDENCE_CYPHER)
                    .param("id", concept.concept_id)
                    .param("limit", clamp_limit(limit)),
            )
            .await
            .map_err(|e| internal("evidence", e))?;

        let mut records = Vec::new();
        while let Some(row) = rows.next().await.map_err(|e| internal("evidence", e))? {
            records.push(evidence_from_row(&row).map_err(|e| internal("evidence row", e))?);
        }
        Ok(records)
    }

    /// Typed relations touching the concept, either direction.
    pub async fn neighborhood(
        &self,
        key: &str,
        limit: usize,
    ) -> Result<Vec<NeighborRecord>, QueryError> {
        let concept = self.concept(key).await?;

        let mut rows = self
            .graph
            .execute(
                query(NEIGHBORHOOD_CYPHER)
                    .param("id", concept.concept_id)
                    .param("limit", clamp_limit(limit)),
            )
            .await
            .map_err(|e| internal("neighborhood", e))?;

        let mut records = Vec::new();
        while let Some(row) = rows.next().await.map_err(|e| internal("neighborhood", e))? {
            records.push(neighbor_from_row(&row).map_err(|e| internal("neighborhood row", e))?);
        }
        Ok(records)
    }
}

fn column<T: serde::de::DeserializeOwned>(row: &Row, name: &str) -> Result<T, String> {
    row.get::<T>(name).map_err(|e| format!("column {name}: {e}"))
}

fn concept_from_row(row: &Row) -> Result<ConceptRecord, String> {
    Ok(ConceptRecord {
        concept_id: column(row, "conceptId")?,
        lemma: column::<Option<String>>(row, "lemma")?.unwrap_or_default(),
        surface: column::<Option<String>>(row, "surface")?.unwrap_or_default(),
        origin: column::<Option<String>>(row, "origin")?.unwrap_or_default(),
        mention_count: column(row, "mentionCount")?,
    })
}

fn evidence_from_row(row: &Row) -> Result<EvidenceRecord, String> {
    Ok(EvidenceRecord {
        chunk_id: column(row, "chunkId")?,
        doc_id: column::<Option<String>>(row, "docId")?.unwrap_or_default(),
        text: column::<Option<String>>(row, "text")?.unwrap_or_default(),
        source_uri: column::<Option<String>>(row, "sourceUri")?.unwrap_or_default(),
        span_start: column::<Option<i64>>(row, "spanStart")?.unwrap_or_default(),
        span_end: column::<Option<i64>>(row, "spanEnd")?.unwrap_or_default(),
    })
}

fn neighbor_from_row(row: &Row) -> Result<NeighborRecord, String> {
    let outgoing: bool = column(row, "outgoing")?;
    Ok(NeighborRecord {
        predicate: column(row, "predicate")?,
        direction: if outgoing {
            Direction::Outgoing
        } else {
            Direction::Incoming
        },
        concept_id: column(row, "conceptId")?,
        lemma: column::<Option<String>>(row, "lemma")?.unwrap_or_default(),
        confidence: column::<Option<f64>>(row, "confidence")?,
    })
}
