// ABOUTME: Remote crawl backend: submit a crawl job, poll or wait on it, or extract one page against a schema.
// ABOUTME: Job identity is fixed at submit; polls only ever move a job forward.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::credentials::BackendCredential;
use crate::error::ExtractError;
use crate::options::PollPolicy;
use crate::request::{BackendKind, ExtractionRequest};

use super::api::{ensure_credential, RemoteService};
use super::{to_data, ExtractionBackend};

pub const DEFAULT_CRAWL_LIMIT: u32 = 100;
pub const MAX_CRAWL_LIMIT: u32 = 10_000;

const PARAM_KEYS: &[&str] = &["limit", "formats"];
const STRUCTURED_PARAM_KEYS: &[&str] = &["schema"];

/// Page representation the crawl service should return.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OutputFormat {
    Markdown,
    Html,
    RawHtml,
    Links,
    Screenshot,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrapeOptions {
    pub formats: Vec<OutputFormat>,
}

/// Parameters recorded on a crawl job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrawlParams {
    pub limit: u32,
    pub scrape_options: ScrapeOptions,
}

impl Default for CrawlParams {
    fn default() -> Self {
        Self {
            limit: DEFAULT_CRAWL_LIMIT,
            scrape_options: ScrapeOptions {
                formats: vec![OutputFormat::Markdown, OutputFormat::Html],
            },
        }
    }
}

impl CrawlParams {
    /// Read `limit` and `formats` from request parameters.
    ///
    /// Returns `None` when neither is given so the defaults are applied at submit.
    pub fn from_request(request: &ExtractionRequest) -> Result<Option<Self>, ExtractError> {
        request.check_param_keys(PARAM_KEYS)?;
        let limit = request.u64_param("limit")?;
        let formats = request.param("formats").filter(|v| !v.is_null());
        if limit.is_none() && formats.is_none() {
            return Ok(None);
        }

        let mut params = CrawlParams::default();
        if let Some(limit) = limit {
            params.limit = u32::try_from(limit).unwrap_or(u32::MAX);
        }
        if let Some(formats) = formats {
            params.scrape_options.formats =
                serde_json::from_value(formats.clone()).map_err(|e| {
                    ExtractError::invalid_request(
                        request.url(),
                        "ValidateParams",
                        Some(anyhow::anyhow!("invalid 'formats': {}", e)),
                    )
                })?;
        }
        params.validate(request.url())?;
        Ok(Some(params))
    }

    pub fn validate(&self, target: &str) -> Result<(), ExtractError> {
        if self.limit == 0 || self.limit > MAX_CRAWL_LIMIT {
            return Err(ExtractError::invalid_request(
                target,
                "ValidateParams",
                Some(anyhow::anyhow!(
                    "'limit' must be between 1 and {}",
                    MAX_CRAWL_LIMIT
                )),
            ));
        }
        if self.scrape_options.formats.is_empty() {
            return Err(ExtractError::invalid_request(
                target,
                "ValidateParams",
                Some(anyhow::anyhow!("'formats' needs at least one entry")),
            ));
        }
        Ok(())
    }
}

/// Lifecycle of a crawl job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CrawlStatus {
    Submitted,
    InProgress,
    Completed,
    Failed,
}

impl CrawlStatus {
    /// Map a provider status string. Anything not terminal counts as in progress.
    pub fn from_wire(status: &str) -> Self {
        match status.trim().to_lowercase().as_str() {
            "completed" | "complete" | "done" => CrawlStatus::Completed,
            "failed" | "error" | "cancelled" => CrawlStatus::Failed,
            _ => CrawlStatus::InProgress,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, CrawlStatus::Completed | CrawlStatus::Failed)
    }

    fn rank(&self) -> u8 {
        match self {
            CrawlStatus::Submitted => 0,
            CrawlStatus::InProgress => 1,
            CrawlStatus::Completed | CrawlStatus::Failed => 2,
        }
    }
}

/// A status report for a job, as decoded from a poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlUpdate {
    pub status: CrawlStatus,
    pub progress: Option<i64>,
    pub pages_crawled: Option<i64>,
}

/// A remote crawl job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrawlJob {
    #[serde(rename = "crawlId")]
    id: String,
    url: String,
    params: CrawlParams,
    status: CrawlStatus,
    progress: u8,
    pages_crawled: u64,
}

impl CrawlJob {
    fn submitted(id: String, url: &str, params: CrawlParams) -> Self {
        Self {
            id,
            url: url.to_string(),
            params,
            status: CrawlStatus::Submitted,
            progress: 0,
            pages_crawled: 0,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn params(&self) -> &CrawlParams {
        &self.params
    }

    pub fn status(&self) -> CrawlStatus {
        self.status
    }

    pub fn progress(&self) -> u8 {
        self.progress
    }

    pub fn pages_crawled(&self) -> u64 {
        self.pages_crawled
    }

    /// Apply a status report and return the resulting job.
    ///
    /// Status never moves backwards and a terminal job is frozen. Progress
    /// is clamped to [0, 100] and, like the page counter, never decreases.
    pub fn advance(&self, update: &CrawlUpdate) -> CrawlJob {
        if self.status.is_terminal() || update.status.rank() < self.status.rank() {
            return self.clone();
        }

        let reported = update.progress.map(|p| p.clamp(0, 100) as u8);
        let mut progress = reported.unwrap_or(self.progress).max(self.progress);
        if update.status == CrawlStatus::Completed && reported.is_none() {
            progress = 100;
        }
        let pages = update
            .pages_crawled
            .map(|p| p.max(0) as u64)
            .unwrap_or(self.pages_crawled)
            .max(self.pages_crawled);

        CrawlJob {
            status: update.status,
            progress,
            pages_crawled: pages,
            ..self.clone()
        }
    }
}

#[derive(Debug, Serialize)]
struct SubmitBody<'a> {
    url: &'a str,
    params: &'a CrawlParams,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubmitResponse {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    success: Option<bool>,
    #[serde(default, alias = "id")]
    crawl_id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ScrapeBody<'a> {
    url: &'a str,
    formats: [&'static str; 1],
    json_options: JsonOptions<'a>,
}

#[derive(Debug, Serialize)]
struct JsonOptions<'a> {
    schema: &'a Value,
}

#[derive(Debug, Deserialize)]
struct ScrapeResponse {
    #[serde(default)]
    success: Option<bool>,
    #[serde(default)]
    data: Option<ScrapeData>,
}

#[derive(Debug, Deserialize)]
struct ScrapeData {
    #[serde(default)]
    json: Option<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatusResponse {
    status: String,
    #[serde(default)]
    progress: Option<i64>,
    #[serde(default)]
    pages_crawled: Option<i64>,
}

/// Client for the remote crawl service.
#[derive(Debug, Clone)]
pub struct CrawlBackend {
    service: RemoteService,
    poll: PollPolicy,
}

impl CrawlBackend {
    pub fn new(http: reqwest::Client, base_url: &str, poll: PollPolicy) -> Self {
        Self {
            service: RemoteService::new(http, base_url, BackendKind::Crawl),
            poll,
        }
    }

    /// Submit a crawl. `None` params means the default limit and formats.
    pub async fn submit(
        &self,
        credential: &BackendCredential,
        url: &str,
        params: Option<CrawlParams>,
    ) -> Result<CrawlJob, ExtractError> {
        ensure_credential(Some(credential), BackendKind::Crawl, "SubmitCrawl")?;
        let params = params.unwrap_or_default();
        params.validate(url)?;

        tracing::info!(
            url = %url,
            limit = params.limit,
            "submitting crawl"
        );

        let response: SubmitResponse = self
            .service
            .post_json(
                credential,
                "/crawl",
                &SubmitBody {
                    url,
                    params: &params,
                },
                "SubmitCrawl",
            )
            .await?;

        let rejected = response.success == Some(false)
            || response
                .status
                .as_deref()
                .map(|s| CrawlStatus::from_wire(s) == CrawlStatus::Failed)
                .unwrap_or(false);
        if rejected {
            return Err(ExtractError::backend_unavailable(
                url,
                "SubmitCrawl",
                Some(anyhow::anyhow!("crawl service rejected the job")),
            ));
        }

        let id = response
            .crawl_id
            .filter(|id| !id.trim().is_empty())
            .ok_or_else(|| {
                ExtractError::backend_unavailable(
                    url,
                    "SubmitCrawl",
                    Some(anyhow::anyhow!("no crawl id returned")),
                )
            })?;

        tracing::info!(crawl_id = %id, "crawl submitted");
        Ok(CrawlJob::submitted(id, url, params))
    }

    /// Scrape one page and have the service fill in `schema`, a JSON Schema object.
    ///
    /// Returns the extracted record. A schema that is not an object is an
    /// `InvalidRequest`; a response without an object record is `BackendUnavailable`.
    pub async fn extract_structured(
        &self,
        credential: &BackendCredential,
        url: &str,
        schema: &Value,
    ) -> Result<Map<String, Value>, ExtractError> {
        ensure_credential(Some(credential), BackendKind::Crawl, "ExtractStructured")?;
        if !schema.as_object().is_some_and(|s| !s.is_empty()) {
            return Err(ExtractError::invalid_request(
                url,
                "ExtractStructured",
                Some(anyhow::anyhow!("'schema' must be a non-empty JSON object")),
            ));
        }

        tracing::info!(url = %url, "extracting structured data");

        let response: ScrapeResponse = self
            .service
            .post_json(
                credential,
                "/scrape",
                &ScrapeBody {
                    url,
                    formats: ["json"],
                    json_options: JsonOptions { schema },
                },
                "ExtractStructured",
            )
            .await?;

        if response.success == Some(false) {
            return Err(ExtractError::backend_unavailable(
                url,
                "ExtractStructured",
                Some(anyhow::anyhow!("crawl service rejected the extraction")),
            ));
        }

        match response.data.and_then(|d| d.json) {
            Some(Value::Object(record)) => Ok(record),
            other => Err(ExtractError::backend_unavailable(
                url,
                "ExtractStructured",
                Some(anyhow::anyhow!(
                    "expected an extracted object, got {}",
                    other.map_or("nothing", |v| json_type(&v))
                )),
            )),
        }
    }

    /// Fetch the current status of `job` and return the advanced job.
    ///
    /// The identifier of the returned job is always `job.id()`.
    pub async fn poll(
        &self,
        credential: &BackendCredential,
        job: &CrawlJob,
    ) -> Result<CrawlJob, ExtractError> {
        let path = format!("/crawl/{}", job.id);
        let response: StatusResponse = self
            .service
            .get_json(credential, &path, &[], "PollCrawl")
            .await?;

        let update = CrawlUpdate {
            status: CrawlStatus::from_wire(&response.status),
            progress: response.progress,
            pages_crawled: response.pages_crawled,
        };
        tracing::debug!(
            crawl_id = %job.id,
            status = %response.status,
            progress = ?response.progress,
            "crawl status"
        );
        Ok(job.advance(&update))
    }

    /// Poll `job` with backoff until it completes.
    ///
    /// A `failed` job is `BackendUnavailable`; running out of polls or
    /// passing the deadline is `Timeout`.
    pub async fn wait(
        &self,
        credential: &BackendCredential,
        job: CrawlJob,
    ) -> Result<CrawlJob, ExtractError> {
        let id = job.id.clone();
        let deadline = self.poll.timeout;
        match tokio::time::timeout(deadline, self.poll_until_terminal(credential, job)).await {
            Ok(result) => result,
            Err(_) => Err(ExtractError::timeout(
                id,
                "WaitForCrawl",
                Some(anyhow::anyhow!(
                    "no terminal status within {}",
                    format_duration(deadline)
                )),
            )),
        }
    }

    async fn poll_until_terminal(
        &self,
        credential: &BackendCredential,
        mut job: CrawlJob,
    ) -> Result<CrawlJob, ExtractError> {
        for attempt in 0..self.poll.max_polls {
            if job.status.is_terminal() {
                break;
            }
            tokio::time::sleep(self.poll.delay_for(attempt)).await;
            job = self.poll(credential, &job).await?;

            if !job.status.is_terminal() && (attempt + 1) % 6 == 0 {
                tracing::info!(
                    crawl_id = %job.id,
                    progress = job.progress,
                    pages_crawled = job.pages_crawled,
                    "crawl in progress"
                );
            }
        }

        match job.status {
            CrawlStatus::Completed => {
                tracing::info!(
                    crawl_id = %job.id,
                    pages_crawled = job.pages_crawled,
                    "crawl completed"
                );
                Ok(job)
            }
            CrawlStatus::Failed => Err(ExtractError::backend_unavailable(
                job.id,
                "WaitForCrawl",
                Some(anyhow::anyhow!("crawl job failed")),
            )),
            CrawlStatus::Submitted | CrawlStatus::InProgress => Err(ExtractError::timeout(
                job.id,
                "WaitForCrawl",
                Some(anyhow::anyhow!(
                    "still running after {} polls",
                    self.poll.max_polls
                )),
            )),
        }
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn format_duration(d: Duration) -> String {
    if d.subsec_millis() == 0 {
        format!("{}s", d.as_secs())
    } else {
        format!("{}ms", d.as_millis())
    }
}

#[async_trait]
impl ExtractionBackend for CrawlBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Crawl
    }

    async fn execute(&self, request: &ExtractionRequest) -> Result<Value, ExtractError> {
        if let Some(schema) = request.param("schema") {
            request.check_param_keys(STRUCTURED_PARAM_KEYS)?;
            let credential =
                ensure_credential(request.credential(), BackendKind::Crawl, "ExtractStructured")?;
            let record = self
                .extract_structured(credential, request.url(), schema)
                .await?;
            return Ok(Value::Object(record));
        }

        let params = CrawlParams::from_request(request)?;
        let credential = ensure_credential(request.credential(), BackendKind::Crawl, "SubmitCrawl")?;
        let job = self.submit(credential, request.url(), params).await?;
        let job = self.wait(credential, job).await?;
        to_data(&job, request.url(), "WaitForCrawl")
    }
}
