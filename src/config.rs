//! Configuration.
//!
//! Layered: built-in defaults, then an optional config file, then `WEFT_*`
//! environment variables (`__` separates sections, e.g. `WEFT_GRAPH__URI`,
//! `WEFT_GRAPH__PASSWORD`). Credentials must never live only in files, so the
//! environment layer always wins. Validation failures are fatal before any
//! stage starts.

use config::{Config, Environment, File};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("configuration error: {0}")]
    Load(String),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Graph database connection and sink behavior.
#[derive(Debug, Clone, Deserialize)]
pub struct GraphConfig {
    /// Connection URL; the scheme selects TLS (`neo4j+s://…`).
    pub uri: String,
    pub user: String,
    pub password: String,
    /// Named database inside the server.
    pub database: String,
    /// Commands per commit.
    pub batch_size: usize,
    /// Commit attempts before the sink gives up.
    pub max_retries: u32,
}

/// External generative service.
#[derive(Debug, Clone, Deserialize)]
pub struct LlmConfig {
    pub endpoint: String,
    pub model: String,
    pub temperature: f64,
    /// Per-request wall clock deadline, seconds.
    pub timeout_secs: u64,
    /// Attempts per request before the candidate is dropped.
    pub max_retries: u32,
}

impl LlmConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Relation discovery knobs.
#[derive(Debug, Clone, Deserialize)]
pub struct RelationConfig {
    /// Co-occurrence window. Reserved; current semantics are per-chunk.
    pub cooccur_window: String,
    /// PMI threshold for a future aggregation stage. Recognized, not applied.
    pub min_pmi: f64,
    /// Ordered vocabulary of allowed predicates; extras collapse to
    /// `related_to`.
    pub predicate_set: Vec<String>,
    /// Verdicts below this confidence are dropped.
    pub min_confidence: f64,
}

/// Pipeline shape.
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    pub parallelism: usize,
    pub channel_capacity: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WeftConfig {
    pub graph: GraphConfig,
    pub llm: LlmConfig,
    pub relation: RelationConfig,
    pub pipeline: PipelineConfig,
}

impl WeftConfig {
    /// Load defaults, then the optional file, then the environment.
    pub fn load(file: Option<&Path>) -> Result<Self, ConfigError> {
        let raw = build_layers(file).map_err(|e| ConfigError::Load(e.to_string()))?;
        let cfg: WeftConfig = raw
            .try_deserialize()
            .map_err(|e| ConfigError::Load(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.graph.uri.trim().is_empty() {
            return Err(ConfigError::Invalid("graph.uri must not be empty".into()));
        }
        if self.graph.password.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "graph.password must be set via the config file or WEFT_GRAPH__PASSWORD".into(),
            ));
        }
        if self.graph.batch_size == 0 {
            return Err(ConfigError::Invalid("graph.batch_size must be ≥ 1".into()));
        }
        if self.graph.max_retries == 0 {
            return Err(ConfigError::Invalid("graph.max_retries must be ≥ 1".into()));
        }
        if self.llm.max_retries == 0 {
            return Err(ConfigError::Invalid("llm.max_retries must be ≥ 1".into()));
        }
        if !(0.0..=1.0).contains(&self.relation.min_confidence) {
            return Err(ConfigError::Invalid(
                "relation.min_confidence must lie in [0, 1]".into(),
            ));
        }
        if self.relation.predicate_set.is_empty() {
            return Err(ConfigError::Invalid(
                "relation.predicate_set must not be empty".into(),
            ));
        }
        if self.pipeline.parallelism == 0 {
            return Err(ConfigError::Invalid(
                "pipeline.parallelism must be ≥ 1".into(),
            ));
        }
        if self.pipeline.channel_capacity == 0 {
            return Err(ConfigError::Invalid(
                "pipeline.channel_capacity must be ≥ 1".into(),
            ));
        }
        Ok(())
    }
}

fn build_layers(file: Option<&Path>) -> Result<Config, config::ConfigError> {
    let mut builder = Config::builder()
        .set_default("graph.uri", "neo4j://localhost:7687")?
        .set_default("graph.user", "neo4j")?
        .set_default("graph.password", "")?
        .set_default("graph.database", "neo4j")?
        .set_default("graph.batch_size", 100)?
        .set_default("graph.max_retries", 3)?
        .set_default("llm.endpoint", "http://localhost:11434")?
        .set_default("llm.model", "llama3")?
        .set_default("llm.temperature", 0.2)?
        .set_default("llm.timeout_secs", 60)?
        .set_default("llm.max_retries", 3)?
        .set_default("relation.cooccur_window", "chunk")?
        .set_default("relation.min_pmi", 0.0)?
        .set_default(
            "relation.predicate_set",
            vec![
                "is_a".to_string(),
                "part_of".to_string(),
                "uses".to_string(),
                "causes".to_string(),
                "enables".to_string(),
                "contrasts_with".to_string(),
                "related_to".to_string(),
            ],
        )?
        .set_default("relation.min_confidence", 0.65)?
        .set_default("pipeline.parallelism", 4)?
        .set_default("pipeline.channel_capacity", 256)?;

    if let Some(path) = file {
        builder = builder.add_source(File::from(path.to_path_buf()));
    }

    builder = builder.add_source(
        Environment::with_prefix("WEFT")
            .separator("__")
            .try_parsing(true),
    );

    builder.build()
}
