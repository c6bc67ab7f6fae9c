//! Rule annotator: sentence splitting, tokenization, POS-lite tagging,
//! plural lemmatization, and entity span detection.
//!
//! This is the "NER path" of extraction. It is deliberately a deterministic
//! rule system over short texts, not a statistical tagger: capitalization,
//! digit shape, and a closed function-word list drive the tags. The tag
//! vocabulary follows the classic noun set (`NN`, `NNS`, `NNP`, `NNPS`) plus
//! `CD` for numerics.

use std::collections::HashSet;
use std::sync::OnceLock;
use thiserror::Error;

/// Inputs beyond this many bytes are refused; callers fall back to the
/// heuristic path.
const MAX_INPUT_BYTES: usize = 1 << 20;

#[derive(Debug, Error)]
pub enum AnnotateError {
    #[error("input too large for annotation: {0} bytes")]
    InputTooLarge(usize),
}

/// Part-of-speech tags the annotator can assign.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PosTag {
    /// Common noun
    Nn,
    /// Plural common noun
    Nns,
    /// Proper noun
    Nnp,
    /// Plural proper noun
    Nnps,
    /// Cardinal number
    Cd,
    /// Anything else (function words, verbs, unknowns)
    Other,
}

impl PosTag {
    pub fn symbol(&self) -> &'static str {
        match self {
            PosTag::Nn => "NN",
            PosTag::Nns => "NNS",
            PosTag::Nnp => "NNP",
            PosTag::Nnps => "NNPS",
            PosTag::Cd => "CD",
            PosTag::Other => "X",
        }
    }

    pub fn is_proper(&self) -> bool {
        matches!(self, PosTag::Nnp | PosTag::Nnps)
    }

    pub fn is_noun(&self) -> bool {
        matches!(self, PosTag::Nn | PosTag::Nns | PosTag::Nnp | PosTag::Nnps)
    }
}

/// One annotated token.
#[derive(Debug, Clone)]
pub struct Token {
    /// Cleaned token text (surrounding punctuation stripped).
    pub text: String,
    /// Plural-stripped form, original case preserved.
    pub lemma: String,
    pub tag: PosTag,
    /// Index of the containing sentence.
    pub sentence: usize,
}

/// A maximal run of proper-noun tokens within one sentence.
#[derive(Debug, Clone)]
pub struct EntitySpan {
    /// Concatenated token texts, space separated.
    pub surface: String,
    /// Entity type tag; the rule annotator emits a single type.
    pub ner_type: &'static str,
    /// Token index range [start, end) into the annotation's token list.
    pub start: usize,
    pub end: usize,
}

/// The annotator's output for one text.
#[derive(Debug, Clone, Default)]
pub struct Annotation {
    pub tokens: Vec<Token>,
    pub entities: Vec<EntitySpan>,
}

impl Annotation {
    /// True if the token at `idx` lies inside any entity span.
    pub fn in_entity(&self, idx: usize) -> bool {
        self.entities.iter().any(|e| idx >= e.start && idx < e.end)
    }
}

/// Annotate a text: sentences, tokens, tags, entity spans.
pub fn annotate(text: &str) -> Result<Annotation, AnnotateError> {
    if text.len() > MAX_INPUT_BYTES {
        return Err(AnnotateError::InputTooLarge(text.len()));
    }

    let mut annotation = Annotation::default();

    for (sentence_idx, sentence) in split_sentences(text).into_iter().enumerate() {
        let sentence_start = annotation.tokens.len();
        for (word_idx, word) in sentence.split_whitespace().enumerate() {
            let clean = word.trim_matches(|c: char| !c.is_alphanumeric());
            if clean.is_empty() {
                continue;
            }
            let tag = tag_token(clean, word_idx == 0);
            annotation.tokens.push(Token {
                text: clean.to_string(),
                lemma: lemmatize(clean, tag),
                tag,
                sentence: sentence_idx,
            });
        }
        collect_entity_spans(&mut annotation, sentence_start);
    }

    Ok(annotation)
}

/// Split on terminal punctuation followed by whitespace and a capital.
fn split_sentences(text: &str) -> Vec<&str> {
    let bytes = text.as_bytes();
    let mut sentences = Vec::new();
    let mut start = 0;

    let mut i = 0;
    while i < bytes.len() {
        if matches!(bytes[i], b'.' | b'!' | b'?') {
            // look ahead: whitespace then an uppercase letter ends the sentence
            let rest = &text[i + 1..];
            let trimmed = rest.trim_start();
            let boundary = trimmed
                .chars()
                .next()
                .map(|c| c.is_uppercase())
                .unwrap_or(false);
            if boundary && trimmed.len() < rest.len() {
                sentences.push(&text[start..=i]);
                start = i + 1 + (rest.len() - trimmed.len());
                i = start;
                continue;
            }
        }
        i += 1;
    }
    if start < text.len() {
        let tail = text[start..].trim();
        if !tail.is_empty() {
            sentences.push(&text[start..]);
        }
    }
    sentences
}

fn tag_token(clean: &str, sentence_initial: bool) -> PosTag {
    if is_numeric(clean) {
        return PosTag::Cd;
    }

    let first_upper = clean.chars().next().map(|c| c.is_uppercase()).unwrap_or(false);
    let lower = clean.to_lowercase();

    if first_upper {
        // Mid-sentence capitalization marks a proper noun. A sentence-initial
        // capital is ambiguous; only tokens with an inner capital or digit
        // ("Neo4j", "McCarthy", "API") keep the proper reading there.
        if !sentence_initial || looks_proper(clean) {
            return if plural_looking(&lower) {
                PosTag::Nnps
            } else {
                PosTag::Nnp
            };
        }
        if function_words().contains(lower.as_str()) || clean.chars().count() <= 2 {
            return PosTag::Other;
        }
        return if plural_looking(&lower) {
            PosTag::Nns
        } else {
            PosTag::Nn
        };
    }

    if function_words().contains(lower.as_str()) || clean.chars().count() <= 2 {
        return PosTag::Other;
    }
    if !clean.chars().all(|c| c.is_alphanumeric()) {
        return PosTag::Other;
    }
    if plural_looking(&lower) {
        PosTag::Nns
    } else {
        PosTag::Nn
    }
}

/// A token reads as a proper name regardless of position when it carries a
/// digit or an uppercase letter past the first character.
fn looks_proper(token: &str) -> bool {
    token
        .chars()
        .skip(1)
        .any(|c| c.is_uppercase() || c.is_ascii_digit())
}

fn is_numeric(token: &str) -> bool {
    !token.is_empty()
        && token
            .chars()
            .all(|c| c.is_ascii_digit() || c == '.' || c == ',')
}

fn plural_looking(lower: &str) -> bool {
    lower.len() > 3 && lower.ends_with('s') && !lower.ends_with("ss")
}

/// Strip plural suffixes for the plural noun tags.
///
/// Case is preserved: downstream lemma normalization relies on case
/// boundaries ("parseJson" → "parse_json"), so only the suffix is touched.
fn lemmatize(clean: &str, tag: PosTag) -> String {
    if !matches!(tag, PosTag::Nns | PosTag::Nnps) {
        return clean.to_string();
    }
    let lower = clean.to_lowercase();
    if lower.len() > 4 && lower.ends_with("ies") && clean.is_ascii() {
        return format!("{}y", &clean[..clean.len() - 3]);
    }
    for suffix in ["ches", "shes", "sses", "xes", "zes"] {
        if lower.len() > suffix.len() + 1 && lower.ends_with(suffix) && clean.is_ascii() {
            return clean[..clean.len() - 2].to_string();
        }
    }
    if lower.ends_with('s') && !lower.ends_with("ss") && clean.is_ascii() {
        return clean[..clean.len() - 1].to_string();
    }
    clean.to_string()
}

/// Group consecutive proper-noun tokens (from `from` onward) into spans.
fn collect_entity_spans(annotation: &mut Annotation, from: usize) {
    let mut run_start: Option<usize> = None;
    for idx in from..=annotation.tokens.len() {
        let proper = idx < annotation.tokens.len() && annotation.tokens[idx].tag.is_proper();
        match (proper, run_start) {
            (true, None) => run_start = Some(idx),
            (false, Some(start)) => {
                let surface = annotation.tokens[start..idx]
                    .iter()
                    .map(|t| t.text.as_str())
                    .collect::<Vec<_>>()
                    .join(" ");
                annotation.entities.push(EntitySpan {
                    surface,
                    ner_type: "ENTITY",
                    start,
                    end: idx,
                });
                run_start = None;
            }
            _ => {}
        }
    }
}

/// Closed list of words that never become concept candidates on their own.
fn function_words() -> &'static HashSet<&'static str> {
    static WORDS: OnceLock<HashSet<&'static str>> = OnceLock::new();
    WORDS.get_or_init(|| {
        [
            "the", "a", "an", "and", "or", "but", "nor", "for", "of", "to", "in", "on", "at",
            "by", "with", "without", "from", "into", "onto", "upon", "about", "over", "under",
            "between", "among", "through", "during", "before", "after", "above", "below",
            "is", "are", "was", "were", "be", "been", "being", "am", "has", "have", "had",
            "having", "do", "does", "did", "done", "will", "would", "shall", "should", "can",
            "could", "may", "might", "must", "not", "no", "yes", "this", "that", "these",
            "those", "they", "them", "their", "there", "then", "than", "when", "where",
            "what", "which", "who", "whom", "whose", "why", "how", "it", "its", "he", "she",
            "his", "her", "we", "us", "our", "you", "your", "i", "me", "my", "if", "else",
            "while", "also", "just", "only", "very", "more", "most", "less", "least", "much",
            "many", "few", "some", "any", "all", "both", "each", "every", "either",
            "neither", "such", "same", "other", "another", "new", "old", "good", "great",
            "bad", "big", "small", "long", "short", "high", "low", "first", "last", "next",
            "own", "so", "too", "thus", "still", "yet", "even", "ever", "never", "always",
            "often", "here", "now", "use", "uses", "used", "using", "make", "makes", "made",
            "making", "get", "gets", "got", "take", "takes", "took", "give", "gives",
            "gave", "go", "goes", "went", "come", "comes", "came", "see", "sees", "saw",
            "say", "says", "said", "know", "knows", "knew", "think", "thinks", "thought",
            "want", "wants", "like", "likes", "well", "back", "down", "up", "out", "off",
            "again", "further", "once", "way", "ways", "thing", "things", "one", "two",
            "three", "four", "five", "six", "seven", "eight", "nine", "ten",
        ]
        .into_iter()
        .collect()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_terminal_punctuation_before_capital() {
        let sentences = split_sentences("First sentence. Second one! And a Third? done");
        assert_eq!(sentences.len(), 3);
        assert!(sentences[0].contains("First"));
        assert!(sentences[1].contains("Second"));
        assert!(sentences[2].contains("Third"));
    }

    #[test]
    fn does_not_split_without_following_capital() {
        let sentences = split_sentences("version 2.0 is stable");
        assert_eq!(sentences.len(), 1);
    }

    #[test]
    fn mid_sentence_capitals_are_proper_nouns() {
        let annotation = annotate("the engine uses Kafka heavily").unwrap();
        let kafka = annotation.tokens.iter().find(|t| t.text == "Kafka").unwrap();
        assert_eq!(kafka.tag, PosTag::Nnp);
    }

    #[test]
    fn sentence_initial_capital_is_common_noun_unless_shaped_proper() {
        let annotation = annotate("Databases store data. Neo4j is one").unwrap();
        let databases = annotation.tokens.iter().find(|t| t.text == "Databases").unwrap();
        assert_eq!(databases.tag, PosTag::Nns);
        assert_eq!(databases.lemma, "Database");

        let neo4j = annotation.tokens.iter().find(|t| t.text == "Neo4j").unwrap();
        assert_eq!(neo4j.tag, PosTag::Nnp);
    }

    #[test]
    fn function_words_and_numerics_are_not_nouns() {
        let annotation = annotate("the value is 42 and 3.14 exactly").unwrap();
        for token in &annotation.tokens {
            match token.text.as_str() {
                "42" => assert_eq!(token.tag, PosTag::Cd),
                "3.14" => assert_eq!(token.tag, PosTag::Cd),
                "the" | "is" | "and" => assert_eq!(token.tag, PosTag::Other),
                _ => {}
            }
        }
    }

    #[test]
    fn contiguous_proper_nouns_form_one_span() {
        let annotation = annotate("we deployed Apache Kafka yesterday").unwrap();
        assert_eq!(annotation.entities.len(), 1);
        assert_eq!(annotation.entities[0].surface, "Apache Kafka");
        assert_eq!(annotation.entities[0].ner_type, "ENTITY");
    }

    #[test]
    fn spans_do_not_cross_sentence_boundaries() {
        let annotation = annotate("we shipped Kafka. Redis followed").unwrap();
        let surfaces: Vec<&str> = annotation.entities.iter().map(|e| e.surface.as_str()).collect();
        assert!(surfaces.contains(&"Kafka"));
        assert!(!surfaces.iter().any(|s| s.contains("Kafka Redis")));
    }

    #[test]
    fn plural_lemmatization_preserves_case() {
        assert_eq!(lemmatize("APIs", PosTag::Nnps), "API");
        assert_eq!(lemmatize("queries", PosTag::Nns), "query");
        assert_eq!(lemmatize("boxes", PosTag::Nns), "box");
        assert_eq!(lemmatize("classes", PosTag::Nns), "class");
        assert_eq!(lemmatize("process", PosTag::Nn), "process");
        assert_eq!(lemmatize("parseJson", PosTag::Nn), "parseJson");
    }

    #[test]
    fn oversized_input_is_refused() {
        let text = "a".repeat(MAX_INPUT_BYTES + 1);
        assert!(matches!(
            annotate(&text),
            Err(AnnotateError::InputTooLarge(_))
        ));
    }

    #[test]
    fn in_entity_reflects_span_membership() {
        let annotation = annotate("the Apache Kafka broker works").unwrap();
        let span = &annotation.entities[0];
        assert!(annotation.in_entity(span.start));
        let broker_idx = annotation
            .tokens
            .iter()
            .position(|t| t.text == "broker")
            .unwrap();
        assert!(!annotation.in_entity(broker_idx));
    }
}
