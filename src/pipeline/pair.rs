//! Pair enumeration (stage S4).
//!
//! Shares the extraction result from S3: the same concept set feeds both the
//! mention edges and the candidate pairs, so the two views never disagree.

use crate::model::{Chunk, CoOccurrence, Concept, RelationCandidate};

/// All unordered pairs of distinct concepts in one chunk, canonically
/// ordered, each carrying the chunk's leading text as evidence. Fewer than
/// two concepts yield nothing.
pub fn enumerate_pairs(chunk: &Chunk, concepts: &[Concept]) -> Vec<RelationCandidate> {
    if concepts.len() < 2 {
        return Vec::new();
    }

    let mut candidates = Vec::with_capacity(concepts.len() * (concepts.len() - 1) / 2);
    for i in 0..concepts.len() {
        for j in (i + 1)..concepts.len() {
            let pair = CoOccurrence::new(
                concepts[i].clone(),
                concepts[j].clone(),
                chunk.chunk_id.clone(),
            );
            candidates.push(RelationCandidate::new(pair, &chunk.text));
        }
    }
    candidates
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Span, EVIDENCE_LIMIT};

    fn chunk(text: &str) -> Chunk {
        Chunk {
            chunk_id: "c1".to_string(),
            doc_id: "d1".to_string(),
            span: Span { start: 0, end: 1 },
            text: text.to_string(),
            source_uri: "s".to_string(),
            hash: "h".to_string(),
        }
    }

    fn concept(lemma: &str) -> Concept {
        Concept::new(lemma, lemma, "POS_NN")
    }

    #[test]
    fn fewer_than_two_concepts_yield_no_candidates() {
        assert!(enumerate_pairs(&chunk("t"), &[]).is_empty());
        assert!(enumerate_pairs(&chunk("t"), &[concept("alone")]).is_empty());
    }

    #[test]
    fn three_concepts_yield_three_canonical_pairs() {
        let concepts = [concept("alpha"), concept("beta"), concept("gamma")];
        let candidates = enumerate_pairs(&chunk("text"), &concepts);

        assert_eq!(candidates.len(), 3);
        for candidate in &candidates {
            assert!(candidate.pair.a.concept_id < candidate.pair.b.concept_id);
            assert_eq!(candidate.pair.window_id, "c1");
            assert_eq!(candidate.pair.freq, 1);
        }
    }

    #[test]
    fn pair_order_is_independent_of_input_order() {
        let forward = enumerate_pairs(&chunk("t"), &[concept("api"), concept("rest")]);
        let reversed = enumerate_pairs(&chunk("t"), &[concept("rest"), concept("api")]);
        assert_eq!(forward[0].pair, reversed[0].pair);
    }

    #[test]
    fn evidence_is_chunk_text_truncated() {
        let long = "z".repeat(EVIDENCE_LIMIT * 2);
        let candidates = enumerate_pairs(&chunk(&long), &[concept("a1"), concept("b1")]);
        assert_eq!(candidates[0].evidence.chars().count(), EVIDENCE_LIMIT);

        let short = enumerate_pairs(&chunk("short text"), &[concept("a1"), concept("b1")]);
        assert_eq!(short[0].evidence, "short text");
    }
}
