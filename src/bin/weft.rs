//! Weft CLI — ingest chunk records and query the concept graph.
//!
//! Usage:
//!   weft ingest <PATH>... [--config FILE] [--parallelism N] [--no-llm]
//!   weft concept <KEY> [--config FILE]
//!   weft evidence <KEY> [--limit N] [--config FILE]
//!   weft neighbors <KEY> [--limit N] [--config FILE]
//!   weft search <FRAGMENT> [--limit N] [--config FILE]

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info, warn};
use weft::pipeline::{self, PipelineOptions};
use weft::sink::neo4j::connect;
use weft::{
    ConceptExtractor, LineSource, Neo4jSink, OllamaClient, QueryError, QueryService,
    RelationScorer, WeftConfig,
};

#[derive(Parser)]
#[command(name = "weft", version, about = "Concept graph ingestion engine")]
struct Cli {
    /// Config file path (TOML); WEFT_* environment variables override it
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the extraction pipeline over JSONL chunk files or directories
    Ingest {
        /// Input files or directories of .jsonl/.ndjson records
        #[arg(required = true)]
        paths: Vec<PathBuf>,
        /// Worker count; overrides pipeline.parallelism
        #[arg(long)]
        parallelism: Option<usize>,
        /// Skip the LLM probe and run without relation scoring
        #[arg(long)]
        no_llm: bool,
    },
    /// Look a concept up by id or lemma
    Concept { key: String },
    /// Chunks mentioning a concept
    Evidence {
        key: String,
        #[arg(long, default_value_t = 25)]
        limit: usize,
    },
    /// Typed relations around a concept
    Neighbors {
        key: String,
        #[arg(long, default_value_t = 25)]
        limit: usize,
    },
    /// Concepts whose lemma contains a fragment
    Search {
        fragment: String,
        #[arg(long, default_value_t = 25)]
        limit: usize,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let config = match WeftConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "configuration rejected");
            return ExitCode::FAILURE;
        }
    };

    let result = match cli.command {
        Commands::Ingest {
            paths,
            parallelism,
            no_llm,
        } => cmd_ingest(&config, paths, parallelism, no_llm).await,
        Commands::Concept { key } => cmd_concept(&config, &key).await,
        Commands::Evidence { key, limit } => cmd_evidence(&config, &key, limit).await,
        Commands::Neighbors { key, limit } => cmd_neighbors(&config, &key, limit).await,
        Commands::Search { fragment, limit } => cmd_search(&config, &fragment, limit).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(()) => ExitCode::FAILURE,
    }
}

async fn cmd_ingest(
    config: &WeftConfig,
    paths: Vec<PathBuf>,
    parallelism: Option<usize>,
    no_llm: bool,
) -> Result<(), ()> {
    let source = match LineSource::from_paths(&paths) {
        Ok(source) => source,
        Err(e) => {
            error!(error = %e, "cannot open input");
            return Err(());
        }
    };
    info!(files = source.files().len(), "ingesting");

    let scorer = if no_llm {
        info!("relation scoring disabled by flag");
        None
    } else {
        let client = match OllamaClient::new(
            &config.llm.endpoint,
            &config.llm.model,
            config.llm.temperature,
            config.llm.timeout(),
            config.llm.max_retries,
        ) {
            Ok(client) => client,
            Err(e) => {
                error!(error = %e, "cannot build LLM client");
                return Err(());
            }
        };
        let scorer = RelationScorer::new(
            Arc::new(client),
            config.relation.predicate_set.clone(),
            config.relation.min_confidence,
        );
        if scorer.probe().await {
            Some(Arc::new(scorer))
        } else {
            // a normal mode: the graph still gets chunks, concepts, mentions
            warn!(endpoint = %config.llm.endpoint, "LLM unreachable, scoring disabled for this run");
            None
        }
    };

    let parallelism = parallelism.unwrap_or(config.pipeline.parallelism).max(1);
    let mut sinks = Vec::with_capacity(parallelism);
    for _ in 0..parallelism {
        match Neo4jSink::open(&config.graph).await {
            Ok(sink) => sinks.push(sink),
            Err(e) => {
                error!(error = %e, "cannot open graph sink");
                return Err(());
            }
        }
    }

    let report = match pipeline::run(
        source,
        Arc::new(ConceptExtractor::new()),
        scorer,
        sinks,
        PipelineOptions {
            channel_capacity: config.pipeline.channel_capacity,
        },
    )
    .await
    {
        Ok(report) => report,
        Err(e) => {
            error!(error = %e, "pipeline failed");
            return Err(());
        }
    };

    info!(
        lines = report.lines,
        chunks = report.chunks,
        concepts = report.concepts,
        mentions = report.mentions,
        candidates = report.candidates,
        relations = report.relations,
        dropped = report.dropped_candidates,
        parse_failures = report.parse_failures,
        "ingest complete"
    );

    if report.is_clean() {
        Ok(())
    } else {
        for failure in &report.worker_failures {
            error!(%failure, "worker failed");
        }
        Err(())
    }
}

async fn query_service(config: &WeftConfig) -> Result<QueryService, ()> {
    match connect(&config.graph).await {
        Ok(graph) => Ok(QueryService::new(graph)),
        Err(e) => {
            error!(error = %e, "cannot reach graph database");
            Err(())
        }
    }
}

fn render<T: serde::Serialize>(value: &T) -> Result<(), ()> {
    match serde_json::to_string_pretty(value) {
        Ok(text) => {
            println!("{text}");
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "cannot render result");
            Err(())
        }
    }
}

fn report_query_error(e: QueryError) -> Result<(), ()> {
    match e {
        QueryError::NotFound(key) => {
            eprintln!("not found: {key}");
        }
        QueryError::Internal => {
            eprintln!("internal graph query error");
        }
    }
    Err(())
}

async fn cmd_concept(config: &WeftConfig, key: &str) -> Result<(), ()> {
    let service = query_service(config).await?;
    match service.concept(key).await {
        Ok(record) => render(&record),
        Err(e) => report_query_error(e),
    }
}

async fn cmd_evidence(config: &WeftConfig, key: &str, limit: usize) -> Result<(), ()> {
    let service = query_service(config).await?;
    match service.evidence(key, limit).await {
        Ok(records) => render(&records),
        Err(e) => report_query_error(e),
    }
}

async fn cmd_neighbors(config: &WeftConfig, key: &str, limit: usize) -> Result<(), ()> {
    let service = query_service(config).await?;
    match service.neighborhood(key, limit).await {
        Ok(records) => render(&records),
        Err(e) => report_query_error(e),
    }
}

async fn cmd_search(config: &WeftConfig, fragment: &str, limit: usize) -> Result<(), ()> {
    let service = query_service(config).await?;
    match service.search(fragment, limit).await {
        Ok(records) => render(&records),
        Err(e) => report_query_error(e),
    }
}
