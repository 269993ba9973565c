// ABOUTME: The Orchestrator routes an ExtractionRequest to its backend and wraps the outcome in a ResultEnvelope.
// ABOUTME: Also exposes the crawl submit/poll pair and submit-and-wait for callers driving jobs themselves.

use std::sync::Arc;

use serde_json::Value;
use url::Url;

use crate::backends::api::ensure_credential;
use crate::backends::crawl::{CrawlJob, CrawlParams};
use crate::backends::graph::{HttpModelRunner, ModelRunner};
use crate::backends::{
    BasicBackend, CrawlBackend, ExtractionBackend, GraphBackend, ReaderBackend,
};
use crate::credentials::BackendCredential;
use crate::error::ExtractError;
use crate::extractors::basic::BasicExtractor;
use crate::options::{Options, OrchestratorBuilder};
use crate::request::{BackendKind, ExtractionRequest};
use crate::resource::{build_http_client, FetchOptions, Fetcher};
use crate::result::ResultEnvelope;

/// Entry point for extraction requests.
///
/// Holds one instance of each backend. Requests share the HTTP connection
/// pool and nothing else.
#[derive(Debug, Clone)]
pub struct Orchestrator {
    basic: BasicBackend,
    crawl: CrawlBackend,
    reader: ReaderBackend,
    graph: GraphBackend,
}

impl Orchestrator {
    /// Create a new OrchestratorBuilder for configuring the orchestrator.
    pub fn builder() -> OrchestratorBuilder {
        OrchestratorBuilder::new()
    }

    /// Create an Orchestrator with the given options.
    pub fn new(opts: Options) -> Result<Self, ExtractError> {
        let http = build_http_client(&opts)?;
        let runner = Arc::new(HttpModelRunner::new(http.clone(), &opts.graph_base_url));
        Ok(Self::with_runner(opts, http, runner))
    }

    fn with_runner(opts: Options, http: reqwest::Client, runner: Arc<dyn ModelRunner>) -> Self {
        let fetch_opts = FetchOptions {
            user_agent: opts.user_agent.clone(),
            headers: opts.headers.clone(),
            allow_private_networks: opts.allow_private_networks,
        };
        let extractor = BasicExtractor::new(Fetcher::new(http.clone(), fetch_opts));

        Self {
            basic: BasicBackend::new(extractor),
            crawl: CrawlBackend::new(http.clone(), &opts.crawl_base_url, opts.poll),
            reader: ReaderBackend::new(http, &opts.reader_base_url),
            graph: GraphBackend::new(runner),
        }
    }

    /// Replace the model runner used by the graph backend.
    pub fn with_model_runner(mut self, runner: Arc<dyn ModelRunner>) -> Self {
        self.graph = GraphBackend::new(runner);
        self
    }

    pub fn crawl_backend(&self) -> &CrawlBackend {
        &self.crawl
    }

    pub fn reader_backend(&self) -> &ReaderBackend {
        &self.reader
    }

    pub fn graph_backend(&self) -> &GraphBackend {
        &self.graph
    }

    fn backend(&self, kind: BackendKind) -> &dyn ExtractionBackend {
        match kind {
            BackendKind::Basic => &self.basic,
            BackendKind::Crawl => &self.crawl,
            BackendKind::Reader => &self.reader,
            BackendKind::Graph => &self.graph,
        }
    }

    /// Run one request to completion.
    ///
    /// Never fails: every error comes back inside the envelope, unchanged.
    #[tracing::instrument(skip(self, request), fields(backend = %request.backend(), url = %request.url()))]
    pub async fn run(&self, request: &ExtractionRequest) -> ResultEnvelope {
        match self.dispatch(request).await {
            Ok(data) => {
                tracing::debug!("extraction succeeded");
                ResultEnvelope::ok(request.backend(), data)
            }
            Err(err) => {
                tracing::warn!(kind = %err.kind.as_str(), error = %err, "extraction failed");
                ResultEnvelope::err(request.backend(), &err)
            }
        }
    }

    async fn dispatch(&self, request: &ExtractionRequest) -> Result<Value, ExtractError> {
        validate_url(request.url(), "Run")?;

        let kind = request.backend();
        let backend = self.backend(kind);
        if kind.requires_credential() {
            ensure_credential(request.credential(), kind, "Run")?;
        }

        tracing::debug!(backend = %backend.kind(), "dispatching request");
        backend.execute(request).await
    }

    /// Submit a crawl job without waiting for it.
    #[tracing::instrument(skip(self, request), fields(url = %request.url()))]
    pub async fn submit_crawl(&self, request: &ExtractionRequest) -> Result<CrawlJob, ExtractError> {
        if request.backend() != BackendKind::Crawl {
            return Err(ExtractError::invalid_request(
                request.url(),
                "SubmitCrawl",
                Some(anyhow::anyhow!(
                    "request targets the {} backend",
                    request.backend()
                )),
            ));
        }
        validate_url(request.url(), "SubmitCrawl")?;
        let credential = ensure_credential(request.credential(), BackendKind::Crawl, "SubmitCrawl")?;
        let params = CrawlParams::from_request(request)?;
        self.crawl.submit(credential, request.url(), params).await
    }

    /// Fetch the latest state of a submitted crawl job.
    #[tracing::instrument(skip(self, job, credential), fields(crawl_id = %job.id()))]
    pub async fn poll_crawl(
        &self,
        job: &CrawlJob,
        credential: &BackendCredential,
    ) -> Result<CrawlJob, ExtractError> {
        ensure_credential(Some(credential), BackendKind::Crawl, "PollCrawl")?;
        self.crawl.poll(credential, job).await
    }

    /// Poll a submitted job until it completes, fails or runs out of time.
    #[tracing::instrument(skip(self, job, credential), fields(crawl_id = %job.id()))]
    pub async fn wait_for_crawl(
        &self,
        job: CrawlJob,
        credential: &BackendCredential,
    ) -> Result<CrawlJob, ExtractError> {
        ensure_credential(Some(credential), BackendKind::Crawl, "WaitForCrawl")?;
        self.crawl.wait(credential, job).await
    }
}

/// Target URLs must be absolute http(s) URLs with a host.
fn validate_url(url: &str, op: &str) -> Result<Url, ExtractError> {
    let trimmed = url.trim();
    if trimmed.is_empty() {
        return Err(ExtractError::invalid_request(
            url,
            op,
            Some(anyhow::anyhow!("URL is empty")),
        ));
    }

    let parsed = Url::parse(trimmed).map_err(|e| {
        ExtractError::invalid_request(url, op, Some(anyhow::anyhow!("malformed URL: {}", e)))
    })?;

    match parsed.scheme() {
        "http" | "https" => {}
        other => {
            return Err(ExtractError::invalid_request(
                url,
                op,
                Some(anyhow::anyhow!("unsupported URL scheme '{}'", other)),
            ))
        }
    }
    if parsed.host_str().map_or(true, str::is_empty) {
        return Err(ExtractError::invalid_request(
            url,
            op,
            Some(anyhow::anyhow!("URL has no host")),
        ));
    }
    Ok(parsed)
}
