//! Lemma normalization and concept identity.
//!
//! A concept's identity is a pure function of its lemma: the first 16 hex
//! characters of the SHA-256 digest of the UTF-8 lemma. Two extractions of
//! the same lemma always collide onto the same concept node.

use sha2::{Digest, Sha256};

/// Normalize a surface string into its canonical lemma form.
///
/// Rules, applied in order:
/// - insert `_` at every lowercase→uppercase boundary ("CamelCase" → "Camel_Case")
/// - lowercase
/// - replace every character outside `[a-z0-9_]` with `_`
/// - collapse consecutive underscores
/// - trim leading/trailing underscores
///
/// The result is stable: `normalize_lemma(normalize_lemma(s)) == normalize_lemma(s)`.
pub fn normalize_lemma(surface: &str) -> String {
    let mut boundary_marked = String::with_capacity(surface.len() + 4);
    let mut prev_lower = false;
    for ch in surface.chars() {
        if prev_lower && ch.is_uppercase() {
            boundary_marked.push('_');
        }
        prev_lower = ch.is_lowercase();
        boundary_marked.push(ch);
    }

    let lowered = boundary_marked.to_lowercase();

    let mut out = String::with_capacity(lowered.len());
    let mut prev_underscore = false;
    for ch in lowered.chars() {
        let mapped = if ch.is_ascii_lowercase() || ch.is_ascii_digit() || ch == '_' {
            ch
        } else {
            '_'
        };
        if mapped == '_' {
            if prev_underscore {
                continue;
            }
            prev_underscore = true;
        } else {
            prev_underscore = false;
        }
        out.push(mapped);
    }

    out.trim_matches('_').to_string()
}

/// The 16-character lowercase hex prefix of `SHA-256(lemma)`.
pub fn concept_id(lemma: &str) -> String {
    let digest = Sha256::digest(lemma.as_bytes());
    let mut id = String::with_capacity(16);
    for byte in digest.iter().take(8) {
        id.push_str(&format!("{:02x}", byte));
    }
    id
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn camel_case_boundary_gets_underscore() {
        assert_eq!(normalize_lemma("CamelCase"), "camel_case");
        assert_eq!(normalize_lemma("mixedCaseTerm"), "mixed_case_term");
    }

    #[test]
    fn digits_survive_without_boundaries() {
        // no lowercase→uppercase boundary in "Neo4j"
        assert_eq!(normalize_lemma("Neo4j"), "neo4j");
    }

    #[test]
    fn punctuation_and_whitespace_become_single_underscores() {
        assert_eq!(normalize_lemma("machine learning"), "machine_learning");
        assert_eq!(normalize_lemma("foo--bar  baz"), "foo_bar_baz");
    }

    #[test]
    fn leading_and_trailing_separators_are_trimmed() {
        assert_eq!(normalize_lemma("  spaced  "), "spaced");
        assert_eq!(normalize_lemma("__x__"), "x");
    }

    #[test]
    fn normalization_is_idempotent() {
        for s in ["CamelCase API", "Neo4j", "a--B__c", "Ünïcode Términos"] {
            let once = normalize_lemma(s);
            assert_eq!(normalize_lemma(&once), once, "unstable for {:?}", s);
        }
    }

    #[test]
    fn concept_id_is_sha256_prefix() {
        // known digests, 16 hex chars
        assert_eq!(concept_id("neo4j"), "13fd9e770be36698");
        assert_eq!(concept_id("api"), "14c2529eb4498c5d");
        assert_eq!(concept_id("rest"), "2e09d5210db84177");
        assert_eq!(concept_id("camel_case"), "2d662185146f0b02");
    }

    #[test]
    fn concept_id_is_deterministic() {
        assert_eq!(concept_id("machine_learning"), concept_id("machine_learning"));
        assert_ne!(concept_id("machine"), concept_id("machine_learning"));
    }
}
