// ABOUTME: Main library entry point for the siphon web content extraction engine.
// ABOUTME: Re-exports the public API: Orchestrator, ExtractionRequest, ResultEnvelope, ExtractError and the backends.

//! Siphon - multi-backend web content extraction.
//!
//! A request names a target URL and one of four backends: direct fetch and
//! parse, a remote crawl service, a remote reader service, or a model-driven
//! extraction graph. Whatever the backend, the caller gets back a
//! [`ResultEnvelope`].
//!
//! # Example
//!
//! ```no_run
//! use siphon_engine::{BackendKind, ExtractError, ExtractionRequest, Orchestrator};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), ExtractError> {
//!     let orchestrator = Orchestrator::builder().build()?;
//!     let request = ExtractionRequest::builder("https://example.com", BackendKind::Basic)
//!         .param("class", "article-title")
//!         .build();
//!     let envelope = orchestrator.run(&request).await;
//!     println!("{}", serde_json::to_string_pretty(&envelope).unwrap_or_default());
//!     Ok(())
//! }
//! ```

pub mod backends;
pub mod credentials;
pub mod dom;
pub mod error;
pub mod extractors;
pub mod options;
pub mod orchestrator;
pub mod request;
pub mod resource;
pub mod result;

pub use crate::backends::crawl::{CrawlJob, CrawlParams, CrawlStatus, OutputFormat};
pub use crate::backends::graph::{
    build_graph, ExtractionGraph, ExtractionResult, GraphKind, HttpModelRunner, ModelConfig,
    ModelRunner, ResultStatus, RunnerOutput,
};
pub use crate::backends::reader::ImageRef;
pub use crate::backends::ExtractionBackend;
pub use crate::credentials::{BackendCredential, SecretString};
pub use crate::error::{ErrorKind, ExtractError};
pub use crate::extractors::basic::{extract_html, BasicExtractor, CustomSelector};
pub use crate::options::{OrchestratorBuilder, Options, PollPolicy};
pub use crate::orchestrator::Orchestrator;
pub use crate::request::{BackendKind, ExtractionRequest};
pub use crate::resource::{FetchResult, Fetcher};
pub use crate::result::{ContentRecord, Heading, HeadingLevel, Link, ResultEnvelope};
