//! Materialization (stage S6): pure functions from domain values to graph
//! write commands.

use crate::model::{
    canonical_rel_type, Chunk, Concept, GraphWrite, Mention, PropValue, Props, ScoredRelation,
    CHUNK_LABEL, CONCEPT_LABEL, MENTIONS_REL,
};

pub fn chunk_node(chunk: &Chunk) -> GraphWrite {
    let mut props = Props::new();
    props.insert("chunkId".into(), chunk.chunk_id.as_str().into());
    props.insert("docId".into(), chunk.doc_id.as_str().into());
    props.insert("text".into(), chunk.text.as_str().into());
    props.insert("sourceUri".into(), chunk.source_uri.as_str().into());
    props.insert("hash".into(), chunk.hash.as_str().into());
    props.insert("spanStart".into(), PropValue::Int(chunk.span.start));
    props.insert("spanEnd".into(), PropValue::Int(chunk.span.end));
    GraphWrite::node(CHUNK_LABEL, chunk.chunk_id.clone(), props)
}

pub fn concept_node(concept: &Concept) -> GraphWrite {
    let mut props = Props::new();
    props.insert("conceptId".into(), concept.concept_id.as_str().into());
    props.insert("lemma".into(), concept.lemma.as_str().into());
    props.insert("surface".into(), concept.surface.as_str().into());
    props.insert("origin".into(), concept.origin.as_str().into());
    GraphWrite::node(CONCEPT_LABEL, concept.concept_id.clone(), props)
}

pub fn mention_edge(mention: &Mention) -> GraphWrite {
    GraphWrite::edge(
        CHUNK_LABEL,
        mention.chunk_id.clone(),
        MENTIONS_REL,
        CONCEPT_LABEL,
        mention.concept.concept_id.clone(),
        Props::new(),
    )
}

pub fn relation_edge(relation: &ScoredRelation) -> GraphWrite {
    let mut props = Props::new();
    props.insert("confidence".into(), PropValue::Float(relation.confidence));
    props.insert("evidence".into(), relation.evidence.as_str().into());
    GraphWrite::edge(
        CONCEPT_LABEL,
        relation.a.concept_id.clone(),
        canonical_rel_type(&relation.predicate),
        CONCEPT_LABEL,
        relation.b.concept_id.clone(),
        props,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Span;

    fn chunk() -> Chunk {
        Chunk {
            chunk_id: "c1".to_string(),
            doc_id: "d1".to_string(),
            span: Span { start: 5, end: 42 },
            text: "some text".to_string(),
            source_uri: "file:///x".to_string(),
            hash: "abc".to_string(),
        }
    }

    #[test]
    fn chunk_node_carries_flattened_span() {
        match chunk_node(&chunk()) {
            GraphWrite::UpsertNode { label, id, props } => {
                assert_eq!(label, "Chunk");
                assert_eq!(id, "c1");
                assert_eq!(props.get("spanStart"), Some(&PropValue::Int(5)));
                assert_eq!(props.get("spanEnd"), Some(&PropValue::Int(42)));
                assert_eq!(props.get("docId"), Some(&PropValue::Str("d1".into())));
                assert_eq!(props.len(), 7);
            }
            other => panic!("expected node, got {other:?}"),
        }
    }

    #[test]
    fn concept_node_is_keyed_by_concept_id() {
        let concept = Concept::new("neo4j", "Neo4j", "NER");
        match concept_node(&concept) {
            GraphWrite::UpsertNode { label, id, props } => {
                assert_eq!(label, "Concept");
                assert_eq!(id, concept.concept_id);
                assert_eq!(props.get("lemma"), Some(&PropValue::Str("neo4j".into())));
                assert_eq!(props.get("surface"), Some(&PropValue::Str("Neo4j".into())));
                assert_eq!(props.get("origin"), Some(&PropValue::Str("NER".into())));
            }
            other => panic!("expected node, got {other:?}"),
        }
    }

    #[test]
    fn mention_edge_links_chunk_to_concept() {
        let concept = Concept::new("api", "API", "acronym");
        let mention = Mention {
            chunk_id: "c1".to_string(),
            concept: concept.clone(),
        };
        match mention_edge(&mention) {
            GraphWrite::UpsertEdge {
                from_label,
                from_id,
                rel,
                to_label,
                to_id,
                props,
            } => {
                assert_eq!((from_label.as_str(), from_id.as_str()), ("Chunk", "c1"));
                assert_eq!(rel, "MENTIONS");
                assert_eq!(to_label, "Concept");
                assert_eq!(to_id, concept.concept_id);
                assert!(props.is_empty());
            }
            other => panic!("expected edge, got {other:?}"),
        }
    }

    #[test]
    fn relation_edge_uppercases_predicate_and_carries_verdict() {
        let relation = ScoredRelation {
            a: Concept::new("api", "API", "acronym"),
            b: Concept::new("rest", "REST", "acronym"),
            predicate: "is_a".to_string(),
            confidence: 0.9,
            evidence: "quoted".to_string(),
        };
        match relation_edge(&relation) {
            GraphWrite::UpsertEdge { rel, props, from_id, to_id, .. } => {
                assert_eq!(rel, "IS_A");
                assert_eq!(props.get("confidence"), Some(&PropValue::Float(0.9)));
                assert_eq!(props.get("evidence"), Some(&PropValue::Str("quoted".into())));
                assert!(from_id < to_id, "canonical pair order carries into the edge");
            }
            other => panic!("expected edge, got {other:?}"),
        }
    }
}
