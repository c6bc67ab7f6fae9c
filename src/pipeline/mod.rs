//! The extraction pipeline (stages S1–S7 wired together).
//!
//! A reader task feeds raw line records into a bounded channel; `P` worker
//! tasks share the receiver. Each worker parses, extracts, materializes and
//! submits to its own sink, then scores candidate pairs when scoring is
//! enabled. Per-chunk write order within a worker: chunk node, concept
//! nodes, mention edges, then relation edges.
//!
//! Record-level failures (malformed lines, dropped candidates) are counted
//! and swallowed. A sink failure is fatal to that worker alone and surfaces
//! in the report.

pub mod materialize;
pub mod pair;
pub mod parse;
pub mod source;

use crate::extract::ConceptExtractor;
use crate::model::Mention;
use crate::score::RelationScorer;
use crate::sink::GraphSink;
use materialize::{chunk_node, concept_node, mention_edge, relation_edge};
use pair::enumerate_pairs;
use parse::parse_record;
use source::LineSource;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, Mutex};
use tracing::{error, info};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("pipeline task panicked: {0}")]
    Join(String),
}

/// Pipeline shape knobs. Parallelism is the number of sinks handed to
/// [`run`]: one worker per sink.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Bounded channel capacity between reader and workers.
    pub channel_capacity: usize,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            channel_capacity: 256,
        }
    }
}

/// What one run did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PipelineReport {
    pub lines: u64,
    pub parse_failures: u64,
    pub chunks: u64,
    pub concepts: u64,
    pub mentions: u64,
    pub candidates: u64,
    pub relations: u64,
    pub dropped_candidates: u64,
    /// One entry per worker that died on a sink failure.
    pub worker_failures: Vec<String>,
}

impl PipelineReport {
    fn absorb(&mut self, other: PipelineReport) {
        self.lines += other.lines;
        self.parse_failures += other.parse_failures;
        self.chunks += other.chunks;
        self.concepts += other.concepts;
        self.mentions += other.mentions;
        self.candidates += other.candidates;
        self.relations += other.relations;
        self.dropped_candidates += other.dropped_candidates;
        self.worker_failures.extend(other.worker_failures);
    }

    /// True when every worker survived.
    pub fn is_clean(&self) -> bool {
        self.worker_failures.is_empty()
    }
}

/// Run the pipeline: one sink per worker, `sinks.len()` workers.
///
/// When `scorer` is `None` (the LLM probe failed or scoring was disabled),
/// the run produces chunk, concept and mention writes only.
pub async fn run<S>(
    source: LineSource,
    extractor: Arc<ConceptExtractor>,
    scorer: Option<Arc<RelationScorer>>,
    sinks: Vec<S>,
    options: PipelineOptions,
) -> Result<PipelineReport, PipelineError>
where
    S: GraphSink + 'static,
{
    let (tx, rx) = mpsc::channel::<String>(options.channel_capacity.max(1));
    let rx = Arc::new(Mutex::new(rx));

    let reader = tokio::spawn(source.stream_into(tx));

    let mut workers = Vec::with_capacity(sinks.len());
    for (worker_id, sink) in sinks.into_iter().enumerate() {
        let rx = rx.clone();
        let extractor = extractor.clone();
        let scorer = scorer.clone();
        workers.push(tokio::spawn(worker_loop(
            worker_id, rx, extractor, scorer, sink,
        )));
    }

    let mut report = PipelineReport::default();
    for handle in workers {
        let worker_report = handle
            .await
            .map_err(|e| PipelineError::Join(e.to_string()))?;
        report.absorb(worker_report);
    }

    let delivered = reader
        .await
        .map_err(|e| PipelineError::Join(e.to_string()))?;
    info!(
        delivered,
        chunks = report.chunks,
        relations = report.relations,
        "pipeline finished"
    );
    Ok(report)
}

async fn worker_loop<S>(
    worker_id: usize,
    rx: Arc<Mutex<mpsc::Receiver<String>>>,
    extractor: Arc<ConceptExtractor>,
    scorer: Option<Arc<RelationScorer>>,
    mut sink: S,
) -> PipelineReport
where
    S: GraphSink,
{
    let mut report = PipelineReport::default();

    loop {
        let line = { rx.lock().await.recv().await };
        let Some(line) = line else { break };

        report.lines += 1;
        let Some(chunk) = parse_record(&line) else {
            report.parse_failures += 1;
            continue;
        };

        let concepts = extractor.extract(&chunk);
        let mentions: Vec<Mention> = concepts
            .iter()
            .map(|concept| Mention {
                chunk_id: chunk.chunk_id.clone(),
                concept: concept.clone(),
            })
            .collect();

        let mut writes = Vec::with_capacity(1 + concepts.len() * 2);
        writes.push(chunk_node(&chunk));
        for concept in &concepts {
            writes.push(concept_node(concept));
        }
        for mention in &mentions {
            writes.push(mention_edge(mention));
        }

        for write in writes {
            if let Err(e) = sink.submit(write).await {
                error!(worker_id, error = %e, "sink failed, worker stopping");
                report.worker_failures.push(format!("worker {worker_id}: {e}"));
                return report;
            }
        }
        report.chunks += 1;
        report.concepts += concepts.len() as u64;
        report.mentions += mentions.len() as u64;

        if let Some(scorer) = &scorer {
            for candidate in enumerate_pairs(&chunk, &concepts) {
                report.candidates += 1;
                match scorer.score(&candidate).await {
                    Some(relation) => {
                        if let Err(e) = sink.submit(relation_edge(&relation)).await {
                            error!(worker_id, error = %e, "sink failed, worker stopping");
                            report
                                .worker_failures
                                .push(format!("worker {worker_id}: {e}"));
                            return report;
                        }
                        report.relations += 1;
                    }
                    None => report.dropped_candidates += 1,
                }
            }
        }
    }

    if let Err(e) = sink.close().await {
        error!(worker_id, error = %e, "sink close failed");
        report
            .worker_failures
            .push(format!("worker {worker_id}: close: {e}"));
    }
    report
}
