// ABOUTME: DocumentParser: decodes fetched bytes and exposes tag, class and CSS selection over scraper.
// ABOUTME: Text extraction collapses whitespace; empty selections are empty vectors, never errors.

//! HTML document parsing and selection.
//!
//! Parsing is lenient: anything that decodes to text is handed to the
//! html5ever-based parser, which recovers from malformed markup. Only
//! payloads that are clearly not text (declared binary content types, NUL
//! bytes near the start) are rejected with a `ParseFailure`.

pub mod selectors;

use scraper::{ElementRef, Html, Selector};

use crate::error::ExtractError;

use self::selectors::{compile, get_or_compile};

/// How many leading bytes are inspected for NUL bytes.
const BINARY_SNIFF_WINDOW: usize = 1024;

const BINARY_CONTENT_TYPES: &[&str] = &[
    "image/",
    "audio/",
    "video/",
    "font/",
    "application/pdf",
    "application/zip",
    "application/gzip",
    "application/octet-stream",
];

/// Collapse runs of whitespace into single spaces and trim.
pub fn normalize_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// A parsed HTML document.
pub struct Document {
    html: Html,
}

impl Document {
    /// Parse raw response bytes.
    ///
    /// `content_type` is the response's Content-Type header, used both to
    /// reject binary payloads and as the charset hint for decoding.
    pub fn parse(bytes: &[u8], content_type: Option<&str>) -> Result<Self, ExtractError> {
        if let Some(ct) = content_type {
            let ct = ct.trim().to_lowercase();
            if BINARY_CONTENT_TYPES.iter().any(|prefix| ct.starts_with(prefix)) {
                return Err(ExtractError::parse(
                    "",
                    "Parse",
                    Some(anyhow::anyhow!("non-HTML content type: {}", ct)),
                ));
            }
        }

        let window = &bytes[..bytes.len().min(BINARY_SNIFF_WINDOW)];
        if window.contains(&0) {
            return Err(ExtractError::parse(
                "",
                "Parse",
                Some(anyhow::anyhow!("body looks like a binary payload")),
            ));
        }

        let text = decode_body(bytes, content_type);
        Ok(Self::from_html(&text))
    }

    /// Parse an already decoded HTML string.
    pub fn from_html(html: &str) -> Self {
        Self {
            html: Html::parse_document(html),
        }
    }

    /// All elements whose tag is in `tags`, in document order.
    pub fn find_all(&self, tags: &[&str]) -> Vec<ElementRef<'_>> {
        let valid: Vec<&str> = tags
            .iter()
            .copied()
            .filter(|t| !t.is_empty() && t.chars().all(|c| c.is_ascii_alphanumeric()))
            .collect();
        if valid.is_empty() {
            return Vec::new();
        }
        match get_or_compile(&valid.join(", ")) {
            Some(selector) => self.html.select(&selector).collect(),
            None => Vec::new(),
        }
    }

    /// Elements carrying `class`, optionally restricted to one tag name.
    pub fn find_by_class(&self, tag: Option<&str>, class: &str) -> Vec<ElementRef<'_>> {
        let class = class.trim();
        if class.is_empty() {
            return Vec::new();
        }
        let candidates = match tag {
            Some(tag) => self.find_all(&[tag]),
            None => match get_or_compile("*") {
                Some(all) => self.html.select(&all).collect(),
                None => Vec::new(),
            },
        };
        candidates
            .into_iter()
            .filter(|el| el.value().classes().any(|c| c == class))
            .collect()
    }

    /// Elements matching a CSS selector, in document order.
    ///
    /// A selector that cannot be parsed is an `InvalidRequest`.
    pub fn select(&self, css: &str) -> Result<Vec<ElementRef<'_>>, ExtractError> {
        let selector: Selector = compile(css).ok_or_else(|| {
            ExtractError::invalid_request(
                css,
                "Select",
                Some(anyhow::anyhow!("invalid CSS selector")),
            )
        })?;
        Ok(self.html.select(&selector).collect())
    }

    /// Normalized text content of a node.
    pub fn text(node: &ElementRef<'_>) -> String {
        normalize_whitespace(&node.text().collect::<String>())
    }
}

/// Decode body bytes using the Content-Type charset or, failing that, detection.
pub fn decode_body(body: &[u8], content_type: Option<&str>) -> String {
    if let Some(charset) = content_type.and_then(extract_charset) {
        if let Some(encoding) = encoding_rs::Encoding::for_label(charset.as_bytes()) {
            let (decoded, _, _) = encoding.decode(body);
            return decoded.into_owned();
        }
    }

    let mut detector = chardetng::EncodingDetector::new();
    detector.feed(body, true);
    let encoding = detector.guess(None, true);
    let (decoded, _, _) = encoding.decode(body);
    decoded.into_owned()
}

fn extract_charset(content_type: &str) -> Option<String> {
    content_type
        .to_lowercase()
        .split(';')
        .find_map(|part| {
            part.trim()
                .strip_prefix("charset=")
                .map(|cs| cs.trim_matches('"').trim_matches('\'').to_string())
        })
}
