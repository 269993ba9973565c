// ABOUTME: Local extraction strategies that run over a fetched and parsed document.
// ABOUTME: The basic extractor pulls headings, paragraphs, links and an optional custom selection.

pub mod basic;
