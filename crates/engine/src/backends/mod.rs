// ABOUTME: The ExtractionBackend seam plus the four backend implementations behind it.
// ABOUTME: Each backend turns a validated ExtractionRequest into the JSON payload of a ResultEnvelope.

pub(crate) mod api;
pub mod basic;
pub mod crawl;
pub mod graph;
pub mod reader;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use crate::error::ExtractError;
use crate::request::{BackendKind, ExtractionRequest};

pub use basic::BasicBackend;
pub use crawl::CrawlBackend;
pub use graph::GraphBackend;
pub use reader::ReaderBackend;

/// One extraction strategy.
///
/// Implementations check their own parameters before any I/O. The URL and
/// the credential have already been validated by the orchestrator.
#[async_trait]
pub trait ExtractionBackend: Send + Sync {
    fn kind(&self) -> BackendKind;

    async fn execute(&self, request: &ExtractionRequest) -> Result<Value, ExtractError>;
}

/// Serialize a backend result into envelope data.
pub(crate) fn to_data<T: Serialize>(value: &T, target: &str, op: &str) -> Result<Value, ExtractError> {
    serde_json::to_value(value).map_err(|e| {
        ExtractError::parse(
            target,
            op,
            Some(anyhow::Error::new(e).context("failed to serialize result")),
        )
    })
}
