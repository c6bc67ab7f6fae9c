//! Regex heuristics: the extraction path that catches domain tokens the
//! annotator misses.
//!
//! Four families over the raw chunk text:
//! - capitalized words/sequences → origin `NER`
//! - CamelCase identifiers → origin `camelCase`
//! - uppercase acronyms (2–6 chars) → origin `acronym`
//! - mixedCase technical terms → origin `technicalTerm`

use crate::model::Concept;
use regex::Regex;
use std::collections::HashSet;
use std::sync::OnceLock;

/// Closed stop-word set for the capitalized family. Exact, case-sensitive.
const STOP_WORDS: [&str; 25] = [
    "The", "This", "That", "These", "Those", "They", "There", "Then", "When", "Where", "What",
    "Which", "Who", "Why", "How", "Figure", "Table", "Section", "Chapter", "Page", "For", "From",
    "With", "Without", "About",
];

fn capitalized_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b[A-Z][a-z0-9]+(?:[ \t]+[A-Z][a-z0-9]+)*\b").unwrap())
}

fn camel_case_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b[A-Z][a-z0-9]+(?:[A-Z][a-z0-9]+)+\b").unwrap())
}

fn acronym_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b[A-Z][A-Z0-9]{1,5}\b").unwrap())
}

fn technical_term_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b[a-z]+[A-Z][a-zA-Z0-9]*\b").unwrap())
}

fn stop_words() -> &'static HashSet<&'static str> {
    static WORDS: OnceLock<HashSet<&'static str>> = OnceLock::new();
    WORDS.get_or_init(|| STOP_WORDS.into_iter().collect())
}

/// Run all four heuristic families over a text.
///
/// Findings are unique by lemma, first family wins. Family order:
/// capitalized, camelCase, acronym, technicalTerm.
pub fn heuristic_concepts(text: &str) -> Vec<Concept> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut found = Vec::new();

    let mut push = |surface: &str, origin: &str, found: &mut Vec<Concept>| {
        let concept = Concept::new(surface, surface, origin);
        if concept.lemma.is_empty() || !seen.insert(concept.lemma.clone()) {
            return;
        }
        found.push(concept);
    };

    for m in capitalized_re().find_iter(text) {
        // Drop leading stop words from the sequence ("The System" → "System").
        let mut words: Vec<&str> = m.as_str().split_whitespace().collect();
        while let Some(first) = words.first() {
            if stop_words().contains(first) {
                words.remove(0);
            } else {
                break;
            }
        }
        let surface = words.join(" ");
        if surface.chars().count() <= 2 {
            continue;
        }
        push(&surface, "NER", &mut found);
    }

    for m in camel_case_re().find_iter(text) {
        push(m.as_str(), "camelCase", &mut found);
    }

    for m in acronym_re().find_iter(text) {
        push(m.as_str(), "acronym", &mut found);
    }

    for m in technical_term_re().find_iter(text) {
        push(m.as_str(), "technicalTerm", &mut found);
    }

    found
}
