//! Record decoding (stage S2).
//!
//! One JSON object per line. Malformed records are dropped with a warning;
//! they never fail the pipeline.

use crate::model::{truncate_chars, Chunk};
use tracing::warn;

/// How much of a malformed line the warning quotes.
const PREVIEW_CHARS: usize = 120;

/// Decode one record into a chunk, or drop it.
pub fn parse_record(line: &str) -> Option<Chunk> {
    match serde_json::from_str::<Chunk>(line) {
        Ok(chunk) => Some(chunk),
        Err(e) => {
            warn!(
                error = %e,
                preview = %truncate_chars(line, PREVIEW_CHARS),
                "dropping malformed record"
            );
            None
        }
    }
}
