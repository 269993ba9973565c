// ABOUTME: Graph extraction backend: build an immutable extraction graph and execute it through a ModelRunner.
// ABOUTME: Execution payloads are shaped per graph kind; model calls themselves sit behind the runner trait.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::credentials::{BackendCredential, SecretString};
use crate::error::ExtractError;
use crate::request::{BackendKind, ExtractionRequest};

use super::api::{ensure_credential, RemoteService};
use super::{to_data, ExtractionBackend};

pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";
pub const DEFAULT_TEMPERATURE: f64 = 0.7;
pub const DEFAULT_MAX_RESULTS: u32 = 5;

const PARAM_KEYS: &[&str] = &["kind", "prompt", "model", "temperature", "max_results"];

/// What an extraction graph does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GraphKind {
    /// Prompt-driven structured extraction from one page.
    #[serde(rename = "smart_scraper")]
    StructuredExtraction,
    /// Prompt-driven web search; needs no URL.
    #[serde(rename = "search")]
    Search,
    /// Structured extraction that also processes page images.
    #[serde(rename = "omni_scraper")]
    OmniExtraction,
    #[serde(rename = "speech")]
    Speech,
    #[serde(rename = "script_creator")]
    ScriptGeneration,
}

impl GraphKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            GraphKind::StructuredExtraction => "smart_scraper",
            GraphKind::Search => "search",
            GraphKind::OmniExtraction => "omni_scraper",
            GraphKind::Speech => "speech",
            GraphKind::ScriptGeneration => "script_creator",
        }
    }

    pub fn is_supported(&self) -> bool {
        matches!(
            self,
            GraphKind::StructuredExtraction | GraphKind::Search | GraphKind::OmniExtraction
        )
    }

    pub fn requires_url(&self) -> bool {
        !matches!(self, GraphKind::Search)
    }
}

impl fmt::Display for GraphKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GraphKind {
    type Err = ExtractError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "smart_scraper" | "structured_extraction" => Ok(GraphKind::StructuredExtraction),
            "search" => Ok(GraphKind::Search),
            "omni_scraper" | "omni_extraction" => Ok(GraphKind::OmniExtraction),
            "speech" => Ok(GraphKind::Speech),
            "script_creator" | "script_generation" => Ok(GraphKind::ScriptGeneration),
            other => Err(ExtractError::invalid_request(
                other,
                "BuildGraph",
                Some(anyhow::anyhow!("unknown graph kind")),
            )),
        }
    }
}

/// Model settings for a graph. The credential never shows up in `Debug`.
#[derive(Debug, Clone)]
pub struct ModelConfig {
    pub model: String,
    pub temperature: f64,
    pub credential: SecretString,
}

impl ModelConfig {
    pub fn new(credential: impl Into<SecretString>) -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            credential: credential.into(),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn validate(&self) -> Result<(), ExtractError> {
        let problem = if self.credential.is_blank() {
            Some("model credential is empty".to_string())
        } else if self.model.trim().is_empty() {
            Some("model name is empty".to_string())
        } else if !(0.0..=2.0).contains(&self.temperature) {
            Some(format!(
                "temperature {} is outside [0, 2]",
                self.temperature
            ))
        } else {
            None
        };

        match problem {
            Some(msg) => Err(ExtractError::invalid_configuration(
                self.model.as_str(),
                "BuildGraph",
                Some(anyhow::anyhow!(msg)),
            )),
            None => Ok(()),
        }
    }
}

/// A validated, immutable graph description.
#[derive(Debug, Clone)]
pub struct ExtractionGraph {
    kind: GraphKind,
    url: Option<String>,
    prompt: String,
    max_results: Option<u32>,
    model: ModelConfig,
}

impl ExtractionGraph {
    pub fn kind(&self) -> GraphKind {
        self.kind
    }

    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    /// Result cap; only search graphs carry one.
    pub fn max_results(&self) -> Option<u32> {
        self.max_results
    }

    /// Omni-extraction graphs also process page images.
    pub fn image_processing(&self) -> bool {
        self.kind == GraphKind::OmniExtraction
    }

    pub fn model(&self) -> &ModelConfig {
        &self.model
    }

    /// Copy of a search graph with a different result cap.
    ///
    /// Only search graphs take a result cap; any other kind is an `InvalidRequest`.
    pub fn with_max_results(self, max_results: u32) -> Result<Self, ExtractError> {
        if self.kind != GraphKind::Search {
            return Err(ExtractError::invalid_request(
                self.prompt.as_str(),
                "BuildGraph",
                Some(anyhow::anyhow!(
                    "'max_results' only applies to search graphs, not {}",
                    self.kind
                )),
            ));
        }
        if max_results == 0 {
            return Err(ExtractError::invalid_request(
                self.prompt.as_str(),
                "BuildGraph",
                Some(anyhow::anyhow!("'max_results' must be at least 1")),
            ));
        }
        Ok(Self {
            max_results: Some(max_results),
            ..self
        })
    }
}

/// Build a graph after validating the model config, the kind and its inputs.
pub fn build_graph(
    kind: GraphKind,
    url: Option<&str>,
    prompt: &str,
    model: ModelConfig,
) -> Result<ExtractionGraph, ExtractError> {
    model.validate()?;

    if !kind.is_supported() {
        return Err(ExtractError::unsupported(
            kind.as_str(),
            "BuildGraph",
            Some(anyhow::anyhow!("graph kind is not supported")),
        ));
    }

    let url = url.map(str::trim).filter(|u| !u.is_empty());
    if kind.requires_url() && url.is_none() {
        return Err(ExtractError::invalid_request(
            kind.as_str(),
            "BuildGraph",
            Some(anyhow::anyhow!("a URL is required")),
        ));
    }

    let prompt = prompt.trim();
    if prompt.is_empty() {
        return Err(ExtractError::invalid_request(
            url.unwrap_or(kind.as_str()),
            "BuildGraph",
            Some(anyhow::anyhow!("a prompt is required")),
        ));
    }

    Ok(ExtractionGraph {
        kind,
        url: url.map(str::to_string),
        prompt: prompt.to_string(),
        max_results: (kind == GraphKind::Search).then_some(DEFAULT_MAX_RESULTS),
        model,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultStatus {
    Success,
    Failure,
}

/// What the model side produced for a graph.
#[derive(Debug, Clone, PartialEq)]
pub struct RunnerOutput {
    pub status: ResultStatus,
    pub payload: Value,
    pub error: Option<String>,
}

/// Outcome of executing a graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub status: ResultStatus,
    pub kind: GraphKind,
    pub payload: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Runs the model behind an extraction graph.
#[async_trait]
pub trait ModelRunner: Send + Sync {
    async fn run(&self, graph: &ExtractionGraph) -> Result<RunnerOutput, ExtractError>;
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ExecuteBody<'a> {
    kind: GraphKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    url: Option<&'a str>,
    prompt: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_results: Option<u32>,
    model_config: WireModelConfig<'a>,
}

#[derive(Debug, Serialize)]
struct WireModelConfig<'a> {
    model: &'a str,
    temperature: f64,
    credential: &'a str,
}

#[derive(Debug, Deserialize)]
struct ExecuteResponse {
    status: String,
    #[serde(default)]
    payload: Value,
    #[serde(default)]
    error: Option<String>,
}

/// Model runner backed by a remote graph execution service.
#[derive(Debug, Clone)]
pub struct HttpModelRunner {
    service: RemoteService,
}

impl HttpModelRunner {
    pub fn new(http: reqwest::Client, base_url: &str) -> Self {
        Self {
            service: RemoteService::new(http, base_url, BackendKind::Graph),
        }
    }
}

#[async_trait]
impl ModelRunner for HttpModelRunner {
    async fn run(&self, graph: &ExtractionGraph) -> Result<RunnerOutput, ExtractError> {
        let credential = BackendCredential::new(BackendKind::Graph, graph.model.credential.clone());
        let body = ExecuteBody {
            kind: graph.kind,
            url: graph.url(),
            prompt: &graph.prompt,
            max_results: graph.max_results,
            model_config: WireModelConfig {
                model: &graph.model.model,
                temperature: graph.model.temperature,
                credential: graph.model.credential.expose(),
            },
        };

        let response: ExecuteResponse = self
            .service
            .post_json(&credential, "/execute", &body, "ExecuteGraph")
            .await?;

        let status = match response.status.trim().to_lowercase().as_str() {
            "success" | "ok" | "completed" => ResultStatus::Success,
            _ => ResultStatus::Failure,
        };
        Ok(RunnerOutput {
            status,
            payload: response.payload,
            error: response.error,
        })
    }
}

/// Graph backend: builds graphs from request parameters and executes them.
#[derive(Clone)]
pub struct GraphBackend {
    runner: Arc<dyn ModelRunner>,
}

impl fmt::Debug for GraphBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GraphBackend").finish_non_exhaustive()
    }
}

impl GraphBackend {
    pub fn new(runner: Arc<dyn ModelRunner>) -> Self {
        Self { runner }
    }

    /// Run `graph` and shape the model output for its kind.
    pub async fn execute_graph(
        &self,
        graph: &ExtractionGraph,
    ) -> Result<ExtractionResult, ExtractError> {
        let payload_meta = match graph.kind {
            GraphKind::StructuredExtraction => json!({
                "url": graph.url,
                "prompt": graph.prompt,
            }),
            GraphKind::OmniExtraction => json!({
                "url": graph.url,
                "prompt": graph.prompt,
                "image_processing": true,
            }),
            GraphKind::Search => json!({
                "prompt": graph.prompt,
                "max_results": graph.max_results.unwrap_or(DEFAULT_MAX_RESULTS),
            }),
            GraphKind::Speech | GraphKind::ScriptGeneration => {
                return Err(ExtractError::unsupported(
                    graph.kind.as_str(),
                    "ExecuteGraph",
                    Some(anyhow::anyhow!("graph kind is not supported")),
                ))
            }
        };

        tracing::info!(kind = %graph.kind, model = %graph.model.model, "executing graph");
        let output = self.runner.run(graph).await?;

        let data_key = match graph.kind {
            GraphKind::Search => "results",
            _ => "extracted_data",
        };
        let mut payload = serde_json::Map::new();
        payload.insert(data_key.to_string(), output.payload);
        payload.insert("metadata".to_string(), payload_meta);

        Ok(ExtractionResult {
            status: output.status,
            kind: graph.kind,
            payload: Value::Object(payload),
            error: output.error,
        })
    }

    /// Build a graph from request parameters (`kind`, `prompt`, `model`,
    /// `temperature`, `max_results`).
    pub fn graph_from_request(
        request: &ExtractionRequest,
    ) -> Result<ExtractionGraph, ExtractError> {
        request.check_param_keys(PARAM_KEYS)?;
        let kind: GraphKind = request
            .str_param("kind")?
            .ok_or_else(|| missing_param(request, "kind"))?
            .parse()?;
        let prompt = request
            .str_param("prompt")?
            .ok_or_else(|| missing_param(request, "prompt"))?;
        let credential = ensure_credential(request.credential(), BackendKind::Graph, "BuildGraph")?;

        let mut model = ModelConfig::new(credential.secret().clone());
        if let Some(name) = request.str_param("model")? {
            model = model.with_model(name);
        }
        if let Some(temperature) = request.f64_param("temperature")? {
            model = model.with_temperature(temperature);
        }

        let graph = build_graph(kind, Some(request.url()), prompt, model)?;
        match request.u64_param("max_results")? {
            Some(n) => graph.with_max_results(u32::try_from(n).unwrap_or(u32::MAX)),
            None => Ok(graph),
        }
    }
}

fn missing_param(request: &ExtractionRequest, key: &str) -> ExtractError {
    ExtractError::invalid_request(
        request.url(),
        "ValidateParams",
        Some(anyhow::anyhow!("parameter '{}' is required", key)),
    )
}

#[async_trait]
impl ExtractionBackend for GraphBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Graph
    }

    async fn execute(&self, request: &ExtractionRequest) -> Result<Value, ExtractError> {
        let graph = Self::graph_from_request(request)?;
        let result = self.execute_graph(&graph).await?;

        if result.status == ResultStatus::Failure {
            return Err(ExtractError::backend_unavailable(
                request.url(),
                "ExecuteGraph",
                Some(anyhow::anyhow!(
                    "graph execution failed: {}",
                    result.error.as_deref().unwrap_or("no details")
                )),
            ));
        }
        to_data(&result, request.url(), "ExecuteGraph")
    }
}
