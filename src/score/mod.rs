//! Relation scoring (stage S5).
//!
//! For each candidate pair the scorer builds a prompt naming both lemmas and
//! quoting the evidence, asks the LLM for a JSON verdict, and parses the
//! reply leniently: strict JSON first, regex salvage second. A candidate
//! whose client retries are exhausted is dropped, never escalated.

use crate::llm::LlmClient;
use crate::model::{truncate_chars, LlmVerdict, RelationCandidate, ScoredRelation};
use regex::Regex;
use serde::Deserialize;
use std::sync::{Arc, OnceLock};
use tracing::{debug, warn};

/// Fallback evidence is capped at this many characters.
const FALLBACK_EVIDENCE_CHARS: usize = 100;
/// Everything outside the configured predicate set collapses onto this.
pub const DEFAULT_PREDICATE: &str = "related_to";

/// The strict shape the prompt asks for. `predicate` and `confidence` are
/// required for the strict strategy to count as a success.
#[derive(Debug, Deserialize)]
struct VerdictWire {
    predicate: String,
    confidence: f64,
    #[serde(default)]
    evidence: Option<String>,
    #[serde(default, rename = "ref")]
    reference: Option<String>,
}

fn predicate_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"(?i)predicate["']?\s*:\s*["']?([a-z_]+)"#).unwrap())
}

fn confidence_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"(?i)confidence["']?\s*:\s*["']?([0-9.]+)"#).unwrap())
}

fn evidence_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"evidence["']?\s*:\s*"([^"]+)""#).unwrap())
}

/// Scores relation candidates against a configured predicate vocabulary and
/// confidence threshold.
pub struct RelationScorer {
    client: Arc<dyn LlmClient>,
    predicates: Vec<String>,
    min_confidence: f64,
}

impl RelationScorer {
    pub fn new(client: Arc<dyn LlmClient>, predicates: Vec<String>, min_confidence: f64) -> Self {
        Self {
            client,
            predicates,
            min_confidence,
        }
    }

    /// Pre-flight reachability check. A false result disables scoring for the
    /// run; that is a normal mode, not an error.
    pub async fn probe(&self) -> bool {
        self.client.is_available().await
    }

    /// The prompt sent per candidate.
    pub fn build_prompt(&self, candidate: &RelationCandidate) -> String {
        format!(
            r#"You judge whether two concepts found in the same text are semantically related.

Concept A: {a}
Concept B: {b}

Evidence text:
"{evidence}"

Allowed predicates: {predicates}

Answer with a single JSON object and nothing else:
{{"predicate": "<one allowed predicate>", "confidence": <0.0 to 1.0>, "evidence": "<short quote from the evidence>", "ref": "<provenance token>"}}"#,
            a = candidate.pair.a.lemma,
            b = candidate.pair.b.lemma,
            evidence = candidate.evidence,
            predicates = self.predicates.join(", "),
        )
    }

    /// Score one candidate. `None` means dropped: client exhaustion or a
    /// verdict below the threshold.
    pub async fn score(&self, candidate: &RelationCandidate) -> Option<ScoredRelation> {
        let prompt = self.build_prompt(candidate);
        let text = match self.client.generate(&prompt).await {
            Ok(text) => text,
            Err(e) => {
                warn!(
                    a = %candidate.pair.a.lemma,
                    b = %candidate.pair.b.lemma,
                    error = %e,
                    "candidate dropped: generation failed"
                );
                return None;
            }
        };

        let verdict = self.parse_verdict(&text, candidate);
        if verdict.confidence < self.min_confidence {
            debug!(
                a = %candidate.pair.a.lemma,
                b = %candidate.pair.b.lemma,
                confidence = verdict.confidence,
                "verdict below threshold"
            );
            return None;
        }

        Some(ScoredRelation {
            a: candidate.pair.a.clone(),
            b: candidate.pair.b.clone(),
            predicate: verdict.predicate,
            confidence: verdict.confidence,
            evidence: verdict.evidence,
        })
    }

    /// Lenient verdict parsing: strict JSON on the first `{…}` substring,
    /// then regex salvage with spec'd defaults. Unknown predicates collapse
    /// before any threshold decision.
    pub fn parse_verdict(&self, text: &str, candidate: &RelationCandidate) -> LlmVerdict {
        let fallback_evidence = truncate_chars(&candidate.evidence, FALLBACK_EVIDENCE_CHARS);

        if let Some(wire) = extract_json_object(text)
            .and_then(|json| serde_json::from_str::<VerdictWire>(json).ok())
        {
            let predicate = self.collapse(&wire.predicate);
            let reference = wire
                .reference
                .unwrap_or_else(|| self.reference(candidate, &predicate));
            return LlmVerdict {
                confidence: clamp01(wire.confidence),
                evidence: wire.evidence.unwrap_or(fallback_evidence),
                reference,
                predicate,
            };
        }

        let predicate = predicate_re()
            .captures(text)
            .map(|c| c[1].to_string())
            .unwrap_or_else(|| DEFAULT_PREDICATE.to_string());
        let predicate = self.collapse(&predicate);

        let confidence = confidence_re()
            .captures(text)
            .and_then(|c| c[1].parse::<f64>().ok())
            .unwrap_or(0.5);

        let evidence = evidence_re()
            .captures(text)
            .map(|c| c[1].to_string())
            .unwrap_or(fallback_evidence);

        LlmVerdict {
            confidence: clamp01(confidence),
            evidence,
            reference: self.reference(candidate, &predicate),
            predicate,
        }
    }

    fn collapse(&self, predicate: &str) -> String {
        if self.predicates.iter().any(|p| p == predicate) {
            predicate.to_string()
        } else {
            DEFAULT_PREDICATE.to_string()
        }
    }

    fn reference(&self, candidate: &RelationCandidate, predicate: &str) -> String {
        format!(
            "{}_{}_{}",
            candidate.pair.a.lemma, predicate, candidate.pair.b.lemma
        )
    }
}

/// The substring from the first `{` through the last `}`, if any.
fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

fn clamp01(value: f64) -> f64 {
    value.clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockLlm;
    use crate::model::{Concept, CoOccurrence};

    fn candidate() -> RelationCandidate {
        let a = Concept::new("api", "API", "acronym");
        let b = Concept::new("rest", "REST", "acronym");
        RelationCandidate::new(
            CoOccurrence::new(a, b, "c1"),
            "The API speaks REST over the wire.",
        )
    }

    fn scorer_with(client: MockLlm, min_confidence: f64) -> RelationScorer {
        RelationScorer::new(
            Arc::new(client),
            vec![
                "is_a".to_string(),
                "part_of".to_string(),
                "uses".to_string(),
                "related_to".to_string(),
            ],
            min_confidence,
        )
    }

    fn scorer() -> RelationScorer {
        scorer_with(MockLlm::failing(), 0.65)
    }

    #[test]
    fn prompt_names_lemmas_evidence_and_predicates() {
        let prompt = scorer().build_prompt(&candidate());
        assert!(prompt.contains("Concept A: api"));
        assert!(prompt.contains("Concept B: rest"));
        assert!(prompt.contains("The API speaks REST"));
        assert!(prompt.contains("is_a, part_of, uses, related_to"));
        assert!(prompt.contains(r#""predicate""#));
    }

    // --- strict strategy ---

    #[test]
    fn strict_json_verdict_is_decoded() {
        let text = r#"Here you go: {"predicate":"is_a","confidence":0.9,"evidence":"speaks REST","ref":"api_is_a_rest"} done"#;
        let verdict = scorer().parse_verdict(text, &candidate());
        assert_eq!(verdict.predicate, "is_a");
        assert_eq!(verdict.confidence, 0.9);
        assert_eq!(verdict.evidence, "speaks REST");
        assert_eq!(verdict.reference, "api_is_a_rest");
    }

    #[test]
    fn strict_confidence_is_clamped() {
        let text = r#"{"predicate":"uses","confidence":1.7,"evidence":"e","ref":"r"}"#;
        let verdict = scorer().parse_verdict(text, &candidate());
        assert_eq!(verdict.confidence, 1.0);

        let text = r#"{"predicate":"uses","confidence":-0.2,"evidence":"e","ref":"r"}"#;
        let verdict = scorer().parse_verdict(text, &candidate());
        assert_eq!(verdict.confidence, 0.0);
    }

    #[test]
    fn unknown_predicate_collapses_to_related_to() {
        let text = r#"{"predicate":"invented_by_the_model","confidence":0.8,"evidence":"e","ref":"r"}"#;
        let verdict = scorer().parse_verdict(text, &candidate());
        assert_eq!(verdict.predicate, "related_to");
    }

    #[test]
    fn strict_fills_missing_evidence_and_ref() {
        let text = r#"{"predicate":"uses","confidence":0.7}"#;
        let verdict = scorer().parse_verdict(text, &candidate());
        assert_eq!(verdict.evidence, "The API speaks REST over the wire.");
        assert_eq!(verdict.reference, "api_uses_rest");
    }

    // --- regex salvage ---

    #[test]
    fn regex_salvage_reads_loose_fields() {
        let text = "I think the Predicate: uses fits, Confidence: 0.82, evidence: \"speaks REST\"";
        let verdict = scorer().parse_verdict(text, &candidate());
        assert_eq!(verdict.predicate, "uses");
        assert_eq!(verdict.confidence, 0.82);
        assert_eq!(verdict.evidence, "speaks REST");
        assert_eq!(verdict.reference, "api_uses_rest");
    }

    #[test]
    fn regex_salvage_defaults_when_fields_absent() {
        let verdict = scorer().parse_verdict("no structure here at all", &candidate());
        assert_eq!(verdict.predicate, "related_to");
        assert_eq!(verdict.confidence, 0.5);
        assert_eq!(verdict.evidence, "The API speaks REST over the wire.");
        assert_eq!(verdict.reference, "api_related_to_rest");
    }

    #[test]
    fn regex_salvage_clamps_and_collapses() {
        let text = "predicate: nonsense confidence: 3.5";
        let verdict = scorer().parse_verdict(text, &candidate());
        assert_eq!(verdict.predicate, "related_to");
        assert_eq!(verdict.confidence, 1.0);
    }

    #[test]
    fn fallback_evidence_is_truncated() {
        let a = Concept::new("alpha", "alpha", "POS_NN");
        let b = Concept::new("beta", "beta", "POS_NN");
        let long = "y".repeat(400);
        let cand = RelationCandidate::new(CoOccurrence::new(a, b, "c1"), &long);
        let verdict = scorer().parse_verdict("nothing parseable", &cand);
        assert_eq!(verdict.evidence.chars().count(), FALLBACK_EVIDENCE_CHARS);
    }

    #[test]
    fn broken_json_falls_through_to_regex() {
        // '{' present but not valid JSON
        let text = r#"{predicate: is_a, confidence: 0.72}"#;
        let verdict = scorer().parse_verdict(text, &candidate());
        assert_eq!(verdict.predicate, "is_a");
        assert_eq!(verdict.confidence, 0.72);
    }

    // --- scoring ---

    #[tokio::test]
    async fn verdict_at_threshold_is_kept() {
        let response = r#"{"predicate":"uses","confidence":0.65,"evidence":"e","ref":"r"}"#;
        let scorer = scorer_with(MockLlm::always(response), 0.65);
        let scored = scorer.score(&candidate()).await.expect("kept at boundary");
        assert_eq!(scored.confidence, 0.65);
        assert_eq!(scored.predicate, "uses");
        assert!(scored.a.concept_id < scored.b.concept_id);
    }

    #[tokio::test]
    async fn verdict_below_threshold_is_dropped() {
        let response = r#"{"predicate":"uses","confidence":0.64,"evidence":"e","ref":"r"}"#;
        let scorer = scorer_with(MockLlm::always(response), 0.65);
        assert!(scorer.score(&candidate()).await.is_none());
    }

    #[tokio::test]
    async fn collapse_happens_before_threshold_check() {
        // unknown predicate, high confidence: must survive as related_to
        let response = r#"{"predicate":"from_outer_space","confidence":0.9,"evidence":"e","ref":"r"}"#;
        let scorer = scorer_with(MockLlm::always(response), 0.65);
        let scored = scorer.score(&candidate()).await.unwrap();
        assert_eq!(scored.predicate, "related_to");
    }

    #[tokio::test]
    async fn exhausted_client_drops_the_candidate() {
        let scorer = scorer_with(MockLlm::failing(), 0.1);
        assert!(scorer.score(&candidate()).await.is_none());
    }

    #[tokio::test]
    async fn probe_reflects_client_availability() {
        assert!(!scorer_with(MockLlm::unavailable(), 0.5).probe().await);
        assert!(scorer_with(MockLlm::always("x"), 0.5).probe().await);
    }
}
