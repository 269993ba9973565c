// ABOUTME: Remote reader backend: read a page, summarize text, or list a page's images.
// ABOUTME: Each operation checks its credential before any request and fails on its own.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::credentials::BackendCredential;
use crate::error::ExtractError;
use crate::request::{BackendKind, ExtractionRequest};

use super::api::{ensure_credential, RemoteService};
use super::{to_data, ExtractionBackend};

const PARAM_KEYS: &[&str] = &["action", "max_length"];

/// One image found on a page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageRef {
    pub caption: String,
    pub image_url: String,
}

/// Operation requested through the `action` parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReaderAction {
    Read,
    Summarize { max_length: Option<u32> },
    Images,
}

impl ReaderAction {
    pub fn from_request(request: &ExtractionRequest) -> Result<Self, ExtractError> {
        request.check_param_keys(PARAM_KEYS)?;
        let max_length = request
            .u64_param("max_length")?
            .map(|n| u32::try_from(n).unwrap_or(u32::MAX));

        let action = match request.str_param("action")?.map(str::trim) {
            None | Some("read") => ReaderAction::Read,
            Some("summarize") => ReaderAction::Summarize { max_length },
            Some("images") => ReaderAction::Images,
            Some(other) => {
                return Err(ExtractError::invalid_request(
                    request.url(),
                    "ValidateParams",
                    Some(anyhow::anyhow!("unknown reader action '{}'", other)),
                ))
            }
        };

        if max_length.is_some() && !matches!(action, ReaderAction::Summarize { .. }) {
            return Err(ExtractError::invalid_request(
                request.url(),
                "ValidateParams",
                Some(anyhow::anyhow!("'max_length' only applies to summarize")),
            ));
        }
        Ok(action)
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SummarizeBody<'a> {
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_length: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct SummarizeResponse {
    #[serde(default)]
    summary: String,
}

#[derive(Debug, Deserialize)]
struct ImagesResponse {
    #[serde(default)]
    images: Vec<WireImage>,
}

#[derive(Debug, Deserialize)]
struct WireImage {
    #[serde(default)]
    text: Option<String>,
    url: String,
}

/// Client for the remote reader service.
#[derive(Debug, Clone)]
pub struct ReaderBackend {
    service: RemoteService,
}

impl ReaderBackend {
    pub fn new(http: reqwest::Client, base_url: &str) -> Self {
        Self {
            service: RemoteService::new(http, base_url, BackendKind::Reader),
        }
    }

    /// Fetch the reader's JSON rendition of `url`.
    pub async fn read_url(
        &self,
        credential: &BackendCredential,
        url: &str,
    ) -> Result<Value, ExtractError> {
        tracing::debug!(url = %url, "reader read");
        self.service
            .get_json(credential, "/read", &[("url", url)], "ReadUrl")
            .await
    }

    pub async fn summarize(
        &self,
        credential: &BackendCredential,
        text: &str,
        max_length: Option<u32>,
    ) -> Result<String, ExtractError> {
        let response: SummarizeResponse = self
            .service
            .post_json(
                credential,
                "/summarize",
                &SummarizeBody { text, max_length },
                "Summarize",
            )
            .await?;
        Ok(response.summary)
    }

    /// Images on `url`; entries without a caption get an empty one.
    pub async fn extract_images(
        &self,
        credential: &BackendCredential,
        url: &str,
    ) -> Result<Vec<ImageRef>, ExtractError> {
        let response: ImagesResponse = self
            .service
            .get_json(credential, "/images", &[("url", url)], "ExtractImages")
            .await?;

        Ok(response
            .images
            .into_iter()
            .filter(|img| !img.url.trim().is_empty())
            .map(|img| ImageRef {
                caption: img.text.unwrap_or_default().trim().to_string(),
                image_url: img.url.trim().to_string(),
            })
            .collect())
    }

    /// Read `url` and summarize the text of the reader result.
    pub async fn summarize_url(
        &self,
        credential: &BackendCredential,
        url: &str,
        max_length: Option<u32>,
    ) -> Result<String, ExtractError> {
        let page = self.read_url(credential, url).await?;
        let text = page
            .get("text")
            .or_else(|| page.pointer("/data/text"))
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| {
                ExtractError::parse(
                    url,
                    "Summarize",
                    Some(anyhow::anyhow!("reader result has no text to summarize")),
                )
            })?;
        self.summarize(credential, text, max_length).await
    }
}

#[async_trait]
impl ExtractionBackend for ReaderBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Reader
    }

    async fn execute(&self, request: &ExtractionRequest) -> Result<Value, ExtractError> {
        let action = ReaderAction::from_request(request)?;
        let credential = ensure_credential(request.credential(), BackendKind::Reader, "ReadUrl")?;
        let url = request.url();

        match action {
            ReaderAction::Read => self.read_url(credential, url).await,
            ReaderAction::Summarize { max_length } => {
                let summary = self.summarize_url(credential, url, max_length).await?;
                Ok(json!({ "summary": summary }))
            }
            ReaderAction::Images => {
                let images = self.extract_images(credential, url).await?;
                Ok(json!({ "images": to_data(&images, url, "ExtractImages")? }))
            }
        }
    }
}
