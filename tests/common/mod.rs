//! Shared helpers for the end-to-end tests: corpus builders and pipeline
//! harness over the in-memory sink.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use weft::pipeline::{self, PipelineOptions, PipelineReport};
use weft::{ConceptExtractor, LineSource, MemoryGraph, MemorySink, RelationScorer};

/// One wire-format record.
pub fn record(chunk_id: &str, doc_id: &str, text: &str) -> String {
    serde_json::json!({
        "chunkId": chunk_id,
        "docId": doc_id,
        "span": {"start": 0, "end": text.len()},
        "text": text,
        "sourceUri": format!("file:///corpus/{doc_id}"),
        "hash": format!("h-{chunk_id}"),
    })
    .to_string()
}

/// Write lines into a `.jsonl` file inside `dir`.
pub fn write_corpus(dir: &tempfile::TempDir, name: &str, lines: &[String]) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, lines.join("\n")).expect("write corpus");
    path
}

/// Run the full pipeline over `paths` with `workers` memory sinks sharing
/// one store. Returns the report and the populated graph.
pub async fn run_pipeline(
    paths: Vec<PathBuf>,
    scorer: Option<RelationScorer>,
    workers: usize,
    batch_size: usize,
) -> (PipelineReport, Arc<Mutex<MemoryGraph>>) {
    let store = Arc::new(Mutex::new(MemoryGraph::new()));
    let report = run_pipeline_into(&store, paths, scorer, workers, batch_size).await;
    (report, store)
}

/// Same as [`run_pipeline`], targeting an existing store. Used by the replay
/// scenarios.
pub async fn run_pipeline_into(
    store: &Arc<Mutex<MemoryGraph>>,
    paths: Vec<PathBuf>,
    scorer: Option<RelationScorer>,
    workers: usize,
    batch_size: usize,
) -> PipelineReport {
    let sinks: Vec<MemorySink> = (0..workers.max(1))
        .map(|_| MemorySink::new(store.clone(), batch_size))
        .collect();

    pipeline::run(
        LineSource::from_paths(paths).expect("source"),
        Arc::new(ConceptExtractor::new()),
        scorer.map(Arc::new),
        sinks,
        PipelineOptions::default(),
    )
    .await
    .expect("pipeline run")
}

/// The default predicate vocabulary used across the scenarios.
pub fn predicates() -> Vec<String> {
    ["is_a", "part_of", "uses", "causes", "related_to"]
        .into_iter()
        .map(str::to_string)
        .collect()
}
