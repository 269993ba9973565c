// ABOUTME: BasicExtractor: fetch a page, parse it and build a ContentRecord of headings, paragraphs and links.
// ABOUTME: Short paragraphs and anchors missing text or href are dropped; document order is preserved.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::dom::selectors::compile;
use crate::dom::Document;
use crate::error::ExtractError;
use crate::resource::Fetcher;
use crate::result::{ContentRecord, Heading, HeadingLevel, Link};

/// Paragraphs must be strictly longer than this (in characters, after trimming).
pub const MIN_PARAGRAPH_CHARS: usize = 20;

const HEADING_TAGS: &[&str] = &["h1", "h2", "h3"];

/// Caller-chosen fragment to pull out alongside the standard sections.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CustomSelector {
    /// Any CSS selector, e.g. `article h2.title`.
    Css(String),
    /// A bare class name, e.g. `article-title`.
    Class(String),
}

impl CustomSelector {
    /// Reject unusable selectors before any I/O happens.
    pub fn validate(&self) -> Result<(), ExtractError> {
        match self {
            CustomSelector::Css(css) => {
                if css.trim().is_empty() || compile(css).is_none() {
                    return Err(ExtractError::invalid_request(
                        css.as_str(),
                        "ValidateSelector",
                        Some(anyhow::anyhow!("invalid CSS selector")),
                    ));
                }
            }
            CustomSelector::Class(class) => {
                if class.trim().is_empty() || class.trim().contains(char::is_whitespace) {
                    return Err(ExtractError::invalid_request(
                        class.as_str(),
                        "ValidateSelector",
                        Some(anyhow::anyhow!("class name must be a single non-empty token")),
                    ));
                }
            }
        }
        Ok(())
    }
}

/// Fetch-and-parse extractor used by the basic backend.
#[derive(Debug, Clone)]
pub struct BasicExtractor {
    fetcher: Fetcher,
}

impl BasicExtractor {
    pub fn new(fetcher: Fetcher) -> Self {
        Self { fetcher }
    }

    /// Fetch `url` and extract its content.
    ///
    /// Fetch and parse failures propagate unchanged; there is no partial record.
    pub async fn extract(
        &self,
        url: &str,
        custom: Option<&CustomSelector>,
    ) -> Result<ContentRecord, ExtractError> {
        if let Some(sel) = custom {
            sel.validate()?;
        }

        let fetched = self.fetcher.fetch(url).await?;
        let doc = Document::parse(&fetched.body, fetched.content_type.as_deref()).map_err(
            |mut e| {
                e.target = url.to_string();
                e
            },
        )?;

        extract_document(&doc, url, custom)
    }
}

/// Run the extraction pipeline over an HTML string that was fetched elsewhere.
pub fn extract_html(
    html: &str,
    url: &str,
    custom: Option<&CustomSelector>,
) -> Result<ContentRecord, ExtractError> {
    if let Some(sel) = custom {
        sel.validate()?;
    }
    extract_document(&Document::from_html(html), url, custom)
}

fn extract_document(
    doc: &Document,
    url: &str,
    custom: Option<&CustomSelector>,
) -> Result<ContentRecord, ExtractError> {
    let custom = match custom {
        Some(sel) => Some(extract_custom(doc, sel)?),
        None => None,
    };

    let headings = doc
        .find_all(HEADING_TAGS)
        .iter()
        .filter_map(|el| {
            let level = HeadingLevel::from_tag(el.value().name())?;
            let text = Document::text(el);
            (!text.is_empty()).then_some(Heading { level, text })
        })
        .collect();

    let paragraphs = doc
        .find_all(&["p"])
        .iter()
        .map(Document::text)
        .filter(|text| text.chars().count() > MIN_PARAGRAPH_CHARS)
        .collect();

    let links = doc
        .find_all(&["a"])
        .iter()
        .filter_map(|el| {
            let href = el.value().attr("href")?.trim();
            let text = Document::text(el);
            if href.is_empty() || text.is_empty() {
                return None;
            }
            Some(Link {
                text,
                url: href.to_string(),
            })
        })
        .collect();

    Ok(ContentRecord {
        url: url.to_string(),
        captured_at: Utc::now(),
        headings,
        paragraphs,
        links,
        custom,
    })
}

fn extract_custom(doc: &Document, sel: &CustomSelector) -> Result<Vec<String>, ExtractError> {
    let nodes = match sel {
        CustomSelector::Css(css) => doc.select(css)?,
        CustomSelector::Class(class) => doc.find_by_class(None, class),
    };
    Ok(nodes
        .iter()
        .map(Document::text)
        .filter(|text| !text.is_empty())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const SAMPLE: &str = r#"<h2 class="t">A</h2><p>short</p><p>this paragraph exceeds twenty characters easily</p><a href="/x">go</a>"#;

    #[test]
    fn sample_page_sections() {
        let record = extract_html(SAMPLE, "https://example.com", None).unwrap();

        assert_eq!(
            record.headings,
            vec![Heading {
                level: HeadingLevel::H2,
                text: "A".to_string()
            }]
        );
        assert_eq!(
            record.paragraphs,
            vec!["this paragraph exceeds twenty characters easily".to_string()]
        );
        assert_eq!(
            record.links,
            vec![Link {
                text: "go".to_string(),
                url: "/x".to_string()
            }]
        );
        assert_eq!(record.custom, None);
    }

    #[test]
    fn paragraph_threshold_is_strict() {
        let exactly_twenty = "abcdefghijklmnopqrst";
        let twenty_one = "abcdefghijklmnopqrstu";
        let html = format!(
            "<p>   {}   </p><p>{}</p><p>   </p>",
            exactly_twenty, twenty_one
        );
        let record = extract_html(&html, "https://example.com", None).unwrap();
        assert_eq!(record.paragraphs, vec![twenty_one.to_string()]);
    }

    #[test]
    fn threshold_counts_characters_not_bytes() {
        // 12 characters, 24 bytes
        let html = "<p>éééééééééééé</p>";
        let record = extract_html(html, "https://example.com", None).unwrap();
        assert!(record.paragraphs.is_empty());
    }

    #[test]
    fn anchors_need_both_text_and_href() {
        let html = r#"
            <a href="/keep">Keep me</a>
            <a href="">empty href</a>
            <a>no href</a>
            <a href="/icon"><img src="i.png"></a>
            <a href="  /spaced  ">  spaced   text </a>
        "#;
        let record = extract_html(html, "https://example.com", None).unwrap();
        assert_eq!(
            record.links,
            vec![
                Link {
                    text: "Keep me".to_string(),
                    url: "/keep".to_string()
                },
                Link {
                    text: "spaced text".to_string(),
                    url: "/spaced".to_string()
                },
            ]
        );
    }

    #[test]
    fn headings_keep_document_order_and_skip_empty() {
        let html = "<h3>three</h3><h1>one</h1><h2>  </h2><h4>four</h4><h2>two</h2>";
        let record = extract_html(html, "https://example.com", None).unwrap();
        let got: Vec<(&str, &str)> = record
            .headings
            .iter()
            .map(|h| (h.level.as_str(), h.text.as_str()))
            .collect();
        assert_eq!(got, vec![("h3", "three"), ("h1", "one"), ("h2", "two")]);
    }

    #[test]
    fn custom_css_and_class_selectors() {
        let html = r#"
            <h2 class="article-title">First story</h2>
            <h2 class="article-title"> </h2>
            <div class="article-title">Second story</div>
        "#;

        let css = CustomSelector::Css("h2.article-title".to_string());
        let record = extract_html(html, "https://example.com", Some(&css)).unwrap();
        assert_eq!(record.custom, Some(vec!["First story".to_string()]));

        let class = CustomSelector::Class("article-title".to_string());
        let record = extract_html(html, "https://example.com", Some(&class)).unwrap();
        assert_eq!(
            record.custom,
            Some(vec!["First story".to_string(), "Second story".to_string()])
        );
    }

    #[test]
    fn custom_selector_without_matches_is_empty_not_error() {
        let css = CustomSelector::Css("section.none".to_string());
        let record = extract_html(SAMPLE, "https://example.com", Some(&css)).unwrap();
        assert_eq!(record.custom, Some(vec![]));
    }

    #[test]
    fn invalid_custom_selectors_are_rejected() {
        let bad_css = CustomSelector::Css("div[".to_string());
        assert!(bad_css.validate().unwrap_err().is_invalid_request());
        assert!(!crate::dom::selectors::is_cached("div["));

        let good_css = CustomSelector::Css("main article.validated-only".to_string());
        assert!(good_css.validate().is_ok());
        assert!(!crate::dom::selectors::is_cached("main article.validated-only"));

        let bad_class = CustomSelector::Class("two words".to_string());
        assert!(bad_class.validate().unwrap_err().is_invalid_request());
    }
}
