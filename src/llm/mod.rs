//! External LLM client (stage S8).
//!
//! The scorer talks to a generative endpoint through the [`LlmClient`] seam,
//! so transport (HTTP, mock) stays out of scoring logic. The production
//! implementation speaks the Ollama wire protocol:
//!
//! - `POST <endpoint>/api/generate` with `{model, prompt, stream: false,
//!   options: {temperature}}`; the reply carries the generated text in its
//!   `response` field.
//! - `GET <endpoint>/api/tags` is used only as a reachability probe.
//!
//! Failed requests retry with linear backoff (`1s × attempt`); exhaustion is
//! reported, never panicked on.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Deadline for the availability probe.
const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("http status {0}")]
    Http(u16),
    #[error("request timed out")]
    Timeout,
    #[error("response parse error: {0}")]
    ResponseParse(String),
    #[error("gave up after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: String },
}

/// The seam between the scorer and whatever produces generations.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Cheap reachability check; scoring is disabled for the run when false.
    async fn is_available(&self) -> bool;

    /// One generation. Implementations own their retry policy.
    async fn generate(&self, prompt: &str) -> Result<String, LlmError>;
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Debug, Serialize)]
struct GenerateOptions {
    temperature: f64,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
}

/// Retrying HTTP client for an Ollama-compatible generative service.
pub struct OllamaClient {
    http: reqwest::Client,
    probe: reqwest::Client,
    endpoint: String,
    model: String,
    temperature: f64,
    max_retries: u32,
}

impl OllamaClient {
    pub fn new(
        endpoint: impl Into<String>,
        model: impl Into<String>,
        temperature: f64,
        timeout: Duration,
        max_retries: u32,
    ) -> Result<Self, LlmError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LlmError::Transport(e.to_string()))?;
        let probe = reqwest::Client::builder()
            .timeout(PROBE_TIMEOUT)
            .build()
            .map_err(|e| LlmError::Transport(e.to_string()))?;
        Ok(Self {
            http,
            probe,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            model: model.into(),
            temperature,
            max_retries: max_retries.max(1),
        })
    }

    async fn generate_once(&self, prompt: &str) -> Result<String, LlmError> {
        let body = GenerateRequest {
            model: &self.model,
            prompt,
            stream: false,
            options: GenerateOptions {
                temperature: self.temperature,
            },
        };
        let response = self
            .http
            .post(format!("{}/api/generate", self.endpoint))
            .json(&body)
            .send()
            .await
            .map_err(classify)?;
        let status = response.status();
        if !status.is_success() {
            return Err(LlmError::Http(status.as_u16()));
        }
        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| LlmError::ResponseParse(e.to_string()))?;
        Ok(parsed.response)
    }
}

fn classify(e: reqwest::Error) -> LlmError {
    if e.is_timeout() {
        LlmError::Timeout
    } else {
        LlmError::Transport(e.to_string())
    }
}

#[async_trait]
impl LlmClient for OllamaClient {
    async fn is_available(&self) -> bool {
        match self
            .probe
            .get(format!("{}/api/tags", self.endpoint))
            .send()
            .await
        {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }

    async fn generate(&self, prompt: &str) -> Result<String, LlmError> {
        let mut last = None;
        for attempt in 1..=self.max_retries {
            match self.generate_once(prompt).await {
                Ok(text) => return Ok(text),
                Err(e) => {
                    debug!(attempt, error = %e, "generation attempt failed");
                    last = Some(e);
                    if attempt < self.max_retries {
                        tokio::time::sleep(Duration::from_secs(attempt as u64)).await;
                    }
                }
            }
        }
        Err(LlmError::Exhausted {
            attempts: self.max_retries,
            last: last.map(|e| e.to_string()).unwrap_or_default(),
        })
    }
}

/// Scripted client for tests: a response queue plus an optional constant
/// fallback.
pub struct MockLlm {
    available: bool,
    queue: Mutex<VecDeque<Result<String, String>>>,
    fallback: Option<String>,
}

impl MockLlm {
    /// Every generation returns the same text.
    pub fn always(response: impl Into<String>) -> Self {
        Self {
            available: true,
            queue: Mutex::new(VecDeque::new()),
            fallback: Some(response.into()),
        }
    }

    /// Every generation fails.
    pub fn failing() -> Self {
        Self {
            available: true,
            queue: Mutex::new(VecDeque::new()),
            fallback: None,
        }
    }

    /// The probe reports unreachable.
    pub fn unavailable() -> Self {
        Self {
            available: false,
            queue: Mutex::new(VecDeque::new()),
            fallback: None,
        }
    }

    /// Queue one successful response (consumed in order before the fallback).
    pub fn with_response(self, response: impl Into<String>) -> Self {
        self.queue
            .lock()
            .unwrap()
            .push_back(Ok(response.into()));
        self
    }

    /// Queue one failure.
    pub fn with_failure(self, message: impl Into<String>) -> Self {
        self.queue
            .lock()
            .unwrap()
            .push_back(Err(message.into()));
        self
    }
}

#[async_trait]
impl LlmClient for MockLlm {
    async fn is_available(&self) -> bool {
        self.available
    }

    async fn generate(&self, _prompt: &str) -> Result<String, LlmError> {
        if let Some(next) = self.queue.lock().unwrap().pop_front() {
            return next.map_err(|msg| LlmError::Exhausted {
                attempts: 1,
                last: msg,
            });
        }
        match &self.fallback {
            Some(text) => Ok(text.clone()),
            None => Err(LlmError::Exhausted {
                attempts: 1,
                last: "mock configured to fail".to_string(),
            }),
        }
    }
}
