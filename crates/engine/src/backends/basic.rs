// ABOUTME: Basic backend: direct fetch plus local HTML extraction, no credential needed.
// ABOUTME: Accepts either a `selector` (CSS) or a `class` parameter for the custom section.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::ExtractError;
use crate::extractors::basic::{BasicExtractor, CustomSelector};
use crate::request::{BackendKind, ExtractionRequest};

use super::{to_data, ExtractionBackend};

const PARAM_KEYS: &[&str] = &["selector", "class"];

#[derive(Debug, Clone)]
pub struct BasicBackend {
    extractor: BasicExtractor,
}

impl BasicBackend {
    pub fn new(extractor: BasicExtractor) -> Self {
        Self { extractor }
    }

    /// Read the optional custom selector out of the request parameters.
    pub fn custom_selector(
        request: &ExtractionRequest,
    ) -> Result<Option<CustomSelector>, ExtractError> {
        request.check_param_keys(PARAM_KEYS)?;
        let css = request.str_param("selector")?;
        let class = request.str_param("class")?;

        match (css, class) {
            (Some(_), Some(_)) => Err(ExtractError::invalid_request(
                request.url(),
                "ValidateParams",
                Some(anyhow::anyhow!(
                    "'selector' and 'class' cannot be combined"
                )),
            )),
            (Some(css), None) => Ok(Some(CustomSelector::Css(css.to_string()))),
            (None, Some(class)) => Ok(Some(CustomSelector::Class(class.to_string()))),
            (None, None) => Ok(None),
        }
    }
}

#[async_trait]
impl ExtractionBackend for BasicBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Basic
    }

    async fn execute(&self, request: &ExtractionRequest) -> Result<Value, ExtractError> {
        let custom = Self::custom_selector(request)?;
        let record = self.extractor.extract(request.url(), custom.as_ref()).await?;

        if record.is_empty() {
            tracing::warn!(url = %request.url(), "page yielded no headings, paragraphs or links");
        }

        to_data(&record, request.url(), "BasicExtract")
    }
}
