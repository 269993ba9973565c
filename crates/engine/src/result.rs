// ABOUTME: Terminal output types: ContentRecord from the basic extractor and the ResultEnvelope.
// ABOUTME: The envelope is the single shape callers depend on, whatever backend produced it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ExtractError;
use crate::request::BackendKind;

/// Heading level retained by the basic extractor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HeadingLevel {
    H1,
    H2,
    H3,
}

impl HeadingLevel {
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag.to_ascii_lowercase().as_str() {
            "h1" => Some(HeadingLevel::H1),
            "h2" => Some(HeadingLevel::H2),
            "h3" => Some(HeadingLevel::H3),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HeadingLevel::H1 => "h1",
            HeadingLevel::H2 => "h2",
            HeadingLevel::H3 => "h3",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Heading {
    pub level: HeadingLevel,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub text: String,
    pub url: String,
}

/// Structured content pulled from one page.
///
/// Every string is trimmed and non-empty. Sections with nothing in them are
/// empty vectors; `custom` is `None` only when no custom selector was asked for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentRecord {
    pub url: String,
    pub captured_at: DateTime<Utc>,
    pub headings: Vec<Heading>,
    pub paragraphs: Vec<String>,
    pub links: Vec<Link>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom: Option<Vec<String>>,
}

impl ContentRecord {
    /// Returns true if nothing at all was extracted.
    pub fn is_empty(&self) -> bool {
        self.headings.is_empty()
            && self.paragraphs.is_empty()
            && self.links.is_empty()
            && self.custom.as_ref().map_or(true, Vec::is_empty)
    }
}

/// Error half of an envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub kind: String,
    pub message: String,
}

impl From<&ExtractError> for ErrorBody {
    fn from(err: &ExtractError) -> Self {
        Self {
            kind: err.kind.as_str().to_string(),
            message: err.message(),
        }
    }
}

/// Uniform success/error wrapper returned for every request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultEnvelope {
    pub success: bool,
    pub backend: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
}

impl ResultEnvelope {
    pub fn ok(backend: BackendKind, data: Value) -> Self {
        Self {
            success: true,
            backend: backend.as_str().to_string(),
            data: Some(data),
            error: None,
        }
    }

    pub fn err(backend: BackendKind, err: &ExtractError) -> Self {
        Self {
            success: false,
            backend: backend.as_str().to_string(),
            data: None,
            error: Some(ErrorBody::from(err)),
        }
    }

    /// Wire name of the error kind, if this envelope carries an error.
    pub fn error_kind(&self) -> Option<&str> {
        self.error.as_ref().map(|e| e.kind.as_str())
    }
}
