// ABOUTME: ExtractionRequest and the BackendKind selector that routes it.
// ABOUTME: Requests are built once with a fluent builder and read through accessors only.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::credentials::BackendCredential;
use crate::error::ExtractError;

/// The extraction strategy a request targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Direct fetch and HTML parsing.
    Basic,
    /// Remote crawl service driven through submit/poll.
    Crawl,
    /// Remote reader service.
    Reader,
    /// Model-backed extraction graph.
    Graph,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Basic => "basic",
            BackendKind::Crawl => "crawl",
            BackendKind::Reader => "reader",
            BackendKind::Graph => "graph",
        }
    }

    /// Backends that talk to a third-party service need a caller credential.
    pub fn requires_credential(&self) -> bool {
        match self {
            BackendKind::Basic => false,
            BackendKind::Crawl | BackendKind::Reader | BackendKind::Graph => true,
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = ExtractError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "basic" => Ok(BackendKind::Basic),
            "crawl" | "firecrawl" => Ok(BackendKind::Crawl),
            "reader" | "jina" => Ok(BackendKind::Reader),
            "graph" | "scrapegraph" => Ok(BackendKind::Graph),
            other => Err(ExtractError::invalid_request(
                other,
                "SelectBackend",
                Some(anyhow::anyhow!("unsupported backend")),
            )),
        }
    }
}

/// One extraction call: target URL, backend, backend parameters and credential.
///
/// The URL is stored as given and validated by the orchestrator.
#[derive(Debug, Clone)]
pub struct ExtractionRequest {
    url: String,
    backend: BackendKind,
    params: Map<String, Value>,
    credential: Option<BackendCredential>,
}

impl ExtractionRequest {
    pub fn builder(url: impl Into<String>, backend: BackendKind) -> ExtractionRequestBuilder {
        ExtractionRequestBuilder {
            request: ExtractionRequest {
                url: url.into(),
                backend,
                params: Map::new(),
                credential: None,
            },
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn backend(&self) -> BackendKind {
        self.backend
    }

    pub fn params(&self) -> &Map<String, Value> {
        &self.params
    }

    pub fn param(&self, key: &str) -> Option<&Value> {
        self.params.get(key)
    }

    pub fn credential(&self) -> Option<&BackendCredential> {
        self.credential.as_ref()
    }

    /// Fails with `InvalidRequest` if any parameter key is not in `allowed`.
    pub fn check_param_keys(&self, allowed: &[&str]) -> Result<(), ExtractError> {
        if let Some(key) = self.params.keys().find(|k| !allowed.contains(&k.as_str())) {
            return Err(ExtractError::invalid_request(
                &self.url,
                "ValidateParams",
                Some(anyhow::anyhow!(
                    "unknown parameter '{}' for {} backend",
                    key,
                    self.backend
                )),
            ));
        }
        Ok(())
    }

    /// Optional string parameter; non-string values are an `InvalidRequest`.
    pub fn str_param(&self, key: &str) -> Result<Option<&str>, ExtractError> {
        match self.params.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.as_str())),
            Some(_) => Err(self.bad_param(key, "a string")),
        }
    }

    /// Optional non-negative integer parameter.
    pub fn u64_param(&self, key: &str) -> Result<Option<u64>, ExtractError> {
        match self.params.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(v) => v
                .as_u64()
                .map(Some)
                .ok_or_else(|| self.bad_param(key, "a non-negative integer")),
        }
    }

    /// Optional floating point parameter.
    pub fn f64_param(&self, key: &str) -> Result<Option<f64>, ExtractError> {
        match self.params.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(v) => v
                .as_f64()
                .map(Some)
                .ok_or_else(|| self.bad_param(key, "a number")),
        }
    }

    fn bad_param(&self, key: &str, expected: &str) -> ExtractError {
        ExtractError::invalid_request(
            &self.url,
            "ValidateParams",
            Some(anyhow::anyhow!("parameter '{}' must be {}", key, expected)),
        )
    }
}

/// Builder for [`ExtractionRequest`].
#[derive(Debug, Clone)]
pub struct ExtractionRequestBuilder {
    request: ExtractionRequest,
}

impl ExtractionRequestBuilder {
    /// Set a backend-specific parameter.
    pub fn param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.request.params.insert(key.into(), value.into());
        self
    }

    /// Replace all parameters.
    pub fn params(mut self, params: Map<String, Value>) -> Self {
        self.request.params = params;
        self
    }

    /// Attach the credential for this call.
    pub fn credential(mut self, credential: BackendCredential) -> Self {
        self.request.credential = Some(credential);
        self
    }

    pub fn build(self) -> ExtractionRequest {
        self.request
    }
}
