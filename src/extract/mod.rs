//! Concept extraction (stage S3).
//!
//! Two strategies compose:
//! - the annotator path ([`annotate`]): sentence/token/POS/NER rules, the
//!   preferred source of concepts;
//! - the heuristic path ([`heuristic`]): regex families over the raw text,
//!   always run to catch domain tokens the annotator misses.
//!
//! When the annotator produced anything, only heuristic `camelCase` and
//! `acronym` findings with novel lemmas are added; when it produced nothing
//! or failed, every heuristic finding is used. An annotator failure is
//! logged and swallowed; extraction never fails the pipeline.

pub mod annotate;
pub mod heuristic;

use crate::model::{Chunk, Concept};
use annotate::{annotate, AnnotateError, PosTag};
use heuristic::heuristic_concepts;
use std::collections::HashSet;
use std::sync::OnceLock;
use tracing::warn;

/// Stop-word surfaces an entity span may never consist of. Exact,
/// case-sensitive, shared with the heuristic capitalized family.
fn span_stop_words() -> &'static HashSet<&'static str> {
    static WORDS: OnceLock<HashSet<&'static str>> = OnceLock::new();
    WORDS.get_or_init(|| {
        [
            "The", "This", "That", "These", "Those", "They", "There", "Then", "When", "Where",
            "What", "Which", "Who", "Why", "How", "Figure", "Table", "Section", "Chapter",
            "Page", "For", "From", "With", "Without", "About",
        ]
        .into_iter()
        .collect()
    })
}

/// Stage S3: chunk text in, unique concepts out.
#[derive(Debug, Default)]
pub struct ConceptExtractor;

impl ConceptExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Extract the concept set for one chunk. Unique by lemma, first
    /// occurrence wins.
    pub fn extract(&self, chunk: &Chunk) -> Vec<Concept> {
        let annotated = match annotator_concepts(&chunk.text) {
            Ok(concepts) => concepts,
            Err(e) => {
                warn!(chunk_id = %chunk.chunk_id, error = %e, "annotator failed, heuristic fallback");
                Vec::new()
            }
        };

        let heuristics = heuristic_concepts(&chunk.text);

        let mut seen: HashSet<String> = annotated.iter().map(|c| c.lemma.clone()).collect();
        let mut concepts = annotated;

        if concepts.is_empty() {
            for concept in heuristics {
                if seen.insert(concept.lemma.clone()) {
                    concepts.push(concept);
                }
            }
        } else {
            for concept in heuristics {
                let novel_family = concept.origin == "camelCase" || concept.origin == "acronym";
                if novel_family && seen.insert(concept.lemma.clone()) {
                    concepts.push(concept);
                }
            }
        }

        concepts
    }
}

/// The annotator path: entity spans plus free-standing nouns.
fn annotator_concepts(text: &str) -> Result<Vec<Concept>, AnnotateError> {
    let annotation = annotate(text)?;

    let mut seen: HashSet<String> = HashSet::new();
    let mut concepts = Vec::new();

    for span in &annotation.entities {
        if span.surface.chars().count() <= 2 || span_stop_words().contains(span.surface.as_str()) {
            continue;
        }
        let concept = Concept::new(
            &span.surface,
            span.surface.clone(),
            format!("NER_{}", span.ner_type),
        );
        if !concept.lemma.is_empty() && seen.insert(concept.lemma.clone()) {
            concepts.push(concept);
        }
    }

    for (idx, token) in annotation.tokens.iter().enumerate() {
        if annotation.in_entity(idx) {
            continue;
        }
        if !matches!(token.tag, PosTag::Nn | PosTag::Nns | PosTag::Nnp | PosTag::Nnps) {
            continue;
        }
        if token.text.chars().count() <= 2 || token.text.chars().all(|c| c.is_ascii_digit()) {
            continue;
        }
        let concept = Concept::new(
            &token.lemma,
            token.text.clone(),
            format!("POS_{}", token.tag.symbol()),
        );
        if !concept.lemma.is_empty() && seen.insert(concept.lemma.clone()) {
            concepts.push(concept);
        }
    }

    Ok(concepts)
}
