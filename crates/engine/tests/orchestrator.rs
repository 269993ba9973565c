// ABOUTME: Integration tests for Orchestrator::run across all four backends against mock services.
// ABOUTME: Covers envelope shape, credential preconditions, error kinds and the crawl submit/poll pair.

use std::time::Duration;

use httpmock::prelude::*;
use pretty_assertions::assert_eq;
use serde_json::json;
use siphon_engine::{
    BackendCredential, BackendKind, CrawlStatus, ExtractionRequest, Orchestrator,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn orchestrator(server: &MockServer) -> Orchestrator {
    init_tracing();
    Orchestrator::builder()
        .allow_private_networks(true)
        .crawl_base_url(server.base_url())
        .reader_base_url(server.base_url())
        .graph_base_url(server.base_url())
        .poll_interval(Duration::from_millis(1))
        .max_polls(5)
        .poll_timeout(Duration::from_secs(5))
        .build()
        .unwrap()
}

#[tokio::test]
async fn basic_backend_end_to_end() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/article");
            then.status(200)
                .header("content-type", "text/html; charset=utf-8")
                .body(r#"<h2 class="t">A</h2><p>short</p><p>this paragraph exceeds twenty characters easily</p><a href="/x">go</a>"#);
        })
        .await;

    let request = ExtractionRequest::builder(server.url("/article"), BackendKind::Basic).build();
    let envelope = orchestrator(&server).run(&request).await;

    assert!(envelope.success, "unexpected error: {:?}", envelope.error);
    assert_eq!(envelope.backend, "basic");
    let data = envelope.data.unwrap();
    assert_eq!(data["headings"], json!([{"level": "h2", "text": "A"}]));
    assert_eq!(
        data["paragraphs"],
        json!(["this paragraph exceeds twenty characters easily"])
    );
    assert_eq!(data["links"], json!([{"text": "go", "url": "/x"}]));
    assert!(data.get("custom").is_none());
}

#[tokio::test]
async fn basic_backend_with_class_selector() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/news");
            then.status(200)
                .header("content-type", "text/html")
                .body(r#"<h2 class="article-title">Rates hold steady</h2><h2>Other</h2>"#);
        })
        .await;

    let request = ExtractionRequest::builder(server.url("/news"), BackendKind::Basic)
        .param("class", "article-title")
        .build();
    let envelope = orchestrator(&server).run(&request).await;

    assert!(envelope.success);
    assert_eq!(envelope.data.unwrap()["custom"], json!(["Rates hold steady"]));
}

#[tokio::test]
async fn fetch_failure_is_reported_in_envelope() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/gone");
            then.status(404);
        })
        .await;

    let request = ExtractionRequest::builder(server.url("/gone"), BackendKind::Basic).build();
    let envelope = orchestrator(&server).run(&request).await;

    assert!(!envelope.success);
    assert!(envelope.data.is_none());
    assert_eq!(envelope.error_kind(), Some("FetchFailure"));
    assert!(envelope.error.unwrap().message.contains("404"));
}

#[tokio::test]
async fn default_orchestrator_blocks_unspecified_and_mapped_loopback() {
    init_tracing();
    let server = MockServer::start_async().await;
    let admin = server
        .mock_async(|when, then| {
            when.any_request();
            then.status(200).body("<p>internal admin console content</p>");
        })
        .await;
    let orchestrator = Orchestrator::builder().build().unwrap();

    for url in [
        format!("http://0.0.0.0:{}/admin", server.port()),
        format!("http://[::ffff:127.0.0.1]:{}/admin", server.port()),
    ] {
        let request = ExtractionRequest::builder(url.as_str(), BackendKind::Basic).build();
        let envelope = orchestrator.run(&request).await;
        assert_eq!(envelope.error_kind(), Some("FetchFailure"), "url {}", url);
        assert!(envelope.data.is_none());
    }
    admin.assert_calls_async(0).await;
}

#[tokio::test]
async fn binary_body_is_parse_failure() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/logo.png");
            then.status(200)
                .header("content-type", "image/png")
                .body(vec![0x89u8, b'P', b'N', b'G', 0, 0, 0]);
        })
        .await;

    let request =
        ExtractionRequest::builder(server.url("/logo.png"), BackendKind::Basic).build();
    let envelope = orchestrator(&server).run(&request).await;
    assert_eq!(envelope.error_kind(), Some("ParseFailure"));
}

#[tokio::test]
async fn malformed_url_is_invalid_request() {
    let server = MockServer::start_async().await;
    let orchestrator = orchestrator(&server);

    for url in ["", "example.com/no-scheme", "ftp://example.com/file"] {
        let request = ExtractionRequest::builder(url, BackendKind::Basic).build();
        let envelope = orchestrator.run(&request).await;
        assert_eq!(envelope.error_kind(), Some("InvalidRequest"), "url {:?}", url);
    }
}

#[tokio::test]
async fn missing_credential_makes_no_network_calls() {
    let server = MockServer::start_async().await;
    let any = server
        .mock_async(|when, then| {
            when.any_request();
            then.status(200).json_body(json!({}));
        })
        .await;
    let orchestrator = orchestrator(&server);

    for backend in [BackendKind::Crawl, BackendKind::Reader, BackendKind::Graph] {
        let request = ExtractionRequest::builder("https://example.com", backend)
            .param("prompt", "p")
            .build();
        let envelope = orchestrator.run(&request).await;
        assert!(!envelope.success);
        assert_eq!(envelope.error_kind(), Some("MissingCredential"), "{}", backend);
        assert_eq!(envelope.backend, backend.as_str());
    }

    let wrong = ExtractionRequest::builder("https://example.com", BackendKind::Reader)
        .credential(BackendCredential::new(BackendKind::Crawl, "fc-key"))
        .build();
    assert_eq!(
        orchestrator.run(&wrong).await.error_kind(),
        Some("MissingCredential")
    );

    any.assert_calls_async(0).await;
}

#[tokio::test]
async fn envelope_serializes_to_wire_shape() {
    let server = MockServer::start_async().await;
    let request = ExtractionRequest::builder("https://example.com", BackendKind::Crawl).build();
    let envelope = orchestrator(&server).run(&request).await;

    let value = serde_json::to_value(&envelope).unwrap();
    assert_eq!(value["success"], json!(false));
    assert_eq!(value["backend"], json!("crawl"));
    assert_eq!(value["error"]["kind"], json!("MissingCredential"));
    assert!(!value["error"]["message"].as_str().unwrap().is_empty());
    assert!(value.get("data").is_none());
}

#[tokio::test]
async fn crawl_submit_and_wait() {
    let server = MockServer::start_async().await;
    let submit = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/crawl")
                .header("authorization", "Bearer fc-key")
                .json_body(json!({
                    "url": "https://example.com",
                    "params": {"limit": 10, "scrapeOptions": {"formats": ["markdown"]}}
                }));
            then.status(200)
                .json_body(json!({"status": "submitted", "crawlId": "crawl-42"}));
        })
        .await;
    let status = server
        .mock_async(|when, then| {
            when.method(GET).path("/crawl/crawl-42");
            then.status(200).json_body(json!({
                "status": "completed",
                "progress": 100,
                "pagesCrawled": 10
            }));
        })
        .await;

    let request = ExtractionRequest::builder("https://example.com", BackendKind::Crawl)
        .param("limit", 10)
        .param("formats", json!(["markdown"]))
        .credential(BackendCredential::new(BackendKind::Crawl, "fc-key"))
        .build();
    let envelope = orchestrator(&server).run(&request).await;

    submit.assert_async().await;
    status.assert_async().await;
    assert!(envelope.success, "unexpected error: {:?}", envelope.error);
    let data = envelope.data.unwrap();
    assert_eq!(data["crawlId"], json!("crawl-42"));
    assert_eq!(data["status"], json!("completed"));
    assert_eq!(data["pagesCrawled"], json!(10));
}

#[tokio::test]
async fn crawl_schema_extraction_end_to_end() {
    let server = MockServer::start_async().await;
    let scrape = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/scrape")
                .header("authorization", "Bearer fc-key");
            then.status(200).json_body(json!({
                "success": true,
                "data": {"json": {"product_name": "Sample Product", "price": "$99.99"}}
            }));
        })
        .await;

    let schema = json!({
        "type": "object",
        "properties": {
            "product_name": {"type": "string"},
            "price": {"type": "string"}
        }
    });
    let request = ExtractionRequest::builder("https://shop.example.com/p/1", BackendKind::Crawl)
        .param("schema", schema)
        .credential(BackendCredential::new(BackendKind::Crawl, "fc-key"))
        .build();
    let envelope = orchestrator(&server).run(&request).await;

    scrape.assert_async().await;
    assert!(envelope.success, "unexpected error: {:?}", envelope.error);
    assert_eq!(envelope.backend, "crawl");
    assert_eq!(
        envelope.data.unwrap(),
        json!({"product_name": "Sample Product", "price": "$99.99"})
    );
}

#[tokio::test]
async fn crawl_that_never_finishes_times_out() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/crawl");
            then.status(200)
                .json_body(json!({"status": "submitted", "crawlId": "slow"}));
        })
        .await;
    let status = server
        .mock_async(|when, then| {
            when.method(GET).path("/crawl/slow");
            then.status(200).json_body(json!({"status": "scraping", "progress": 5}));
        })
        .await;

    let request = ExtractionRequest::builder("https://example.com", BackendKind::Crawl)
        .credential(BackendCredential::new(BackendKind::Crawl, "fc-key"))
        .build();
    let envelope = orchestrator(&server).run(&request).await;

    status.assert_calls_async(5).await;
    assert_eq!(envelope.error_kind(), Some("Timeout"));
}

#[tokio::test]
async fn crawl_submit_poll_pair_keeps_identity() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/crawl");
            then.status(200)
                .json_body(json!({"status": "submitted", "crawlId": "job-7"}));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/crawl/job-7");
            then.status(200)
                .json_body(json!({"status": "in_progress", "progress": 30, "pagesCrawled": 3}));
        })
        .await;

    let credential = BackendCredential::new(BackendKind::Crawl, "fc-key");
    let request = ExtractionRequest::builder("https://example.com", BackendKind::Crawl)
        .credential(credential.clone())
        .build();
    let orchestrator = orchestrator(&server);

    let job = orchestrator.submit_crawl(&request).await.unwrap();
    assert_eq!(job.status(), CrawlStatus::Submitted);
    assert_eq!(job.params().limit, 100);

    let first = orchestrator.poll_crawl(&job, &credential).await.unwrap();
    let second = orchestrator.poll_crawl(&first, &credential).await.unwrap();
    assert_eq!(first.id(), "job-7");
    assert_eq!(second.id(), "job-7");
    assert_eq!(second.status(), CrawlStatus::InProgress);
    assert_eq!(second.progress(), 30);
}

#[tokio::test]
async fn submit_crawl_rejects_other_backends() {
    let server = MockServer::start_async().await;
    let request = ExtractionRequest::builder("https://example.com", BackendKind::Reader)
        .credential(BackendCredential::new(BackendKind::Reader, "k"))
        .build();
    let err = orchestrator(&server).submit_crawl(&request).await.unwrap_err();
    assert!(err.is_invalid_request());
}

#[tokio::test]
async fn reader_summarize_reads_then_summarizes() {
    let server = MockServer::start_async().await;
    let read = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/read")
                .query_param("url", "https://example.com/post");
            then.status(200)
                .json_body(json!({"title": "Post", "text": "A long article body."}));
        })
        .await;
    let summarize = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/summarize")
                .json_body(json!({"text": "A long article body.", "maxLength": 40}));
            then.status(200).json_body(json!({"summary": "An article."}));
        })
        .await;

    let request = ExtractionRequest::builder("https://example.com/post", BackendKind::Reader)
        .param("action", "summarize")
        .param("max_length", 40)
        .credential(BackendCredential::new(BackendKind::Reader, "jina-key"))
        .build();
    let envelope = orchestrator(&server).run(&request).await;

    read.assert_async().await;
    summarize.assert_async().await;
    assert!(envelope.success, "unexpected error: {:?}", envelope.error);
    assert_eq!(envelope.data.unwrap(), json!({"summary": "An article."}));
}

#[tokio::test]
async fn reader_images_action() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/images");
            then.status(200).json_body(json!({
                "images": [{"text": "Chart", "url": "https://cdn.example.com/c.png"}]
            }));
        })
        .await;

    let request = ExtractionRequest::builder("https://example.com", BackendKind::Reader)
        .param("action", "images")
        .credential(BackendCredential::new(BackendKind::Reader, "jina-key"))
        .build();
    let envelope = orchestrator(&server).run(&request).await;

    assert_eq!(
        envelope.data.unwrap(),
        json!({"images": [{"caption": "Chart", "imageUrl": "https://cdn.example.com/c.png"}]})
    );
}

#[tokio::test]
async fn reader_outage_is_backend_unavailable() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/read");
            then.status(502);
        })
        .await;

    let request = ExtractionRequest::builder("https://example.com", BackendKind::Reader)
        .credential(BackendCredential::new(BackendKind::Reader, "jina-key"))
        .build();
    let envelope = orchestrator(&server).run(&request).await;
    assert_eq!(envelope.error_kind(), Some("BackendUnavailable"));
}

#[tokio::test]
async fn graph_structured_extraction() {
    let server = MockServer::start_async().await;
    let execute = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/execute")
                .header("authorization", "Bearer sk-key");
            then.status(200).json_body(json!({
                "status": "success",
                "kind": "smart_scraper",
                "payload": {"products": [{"name": "Lamp"}]}
            }));
        })
        .await;

    let request = ExtractionRequest::builder("https://example.com/shop", BackendKind::Graph)
        .param("kind", "smart_scraper")
        .param("prompt", "Extract product information")
        .credential(BackendCredential::new(BackendKind::Graph, "sk-key"))
        .build();
    let envelope = orchestrator(&server).run(&request).await;

    execute.assert_async().await;
    assert!(envelope.success, "unexpected error: {:?}", envelope.error);
    assert_eq!(
        envelope.data.unwrap(),
        json!({
            "status": "success",
            "kind": "smart_scraper",
            "payload": {
                "extracted_data": {"products": [{"name": "Lamp"}]},
                "metadata": {
                    "url": "https://example.com/shop",
                    "prompt": "Extract product information"
                }
            }
        })
    );
}

#[tokio::test]
async fn graph_unsupported_kind_and_bad_model_config() {
    let server = MockServer::start_async().await;
    let execute = server
        .mock_async(|when, then| {
            when.method(POST).path("/execute");
            then.status(200).json_body(json!({"status": "success", "payload": null}));
        })
        .await;
    let orchestrator = orchestrator(&server);
    let credential = BackendCredential::new(BackendKind::Graph, "sk-key");

    let speech = ExtractionRequest::builder("https://example.com", BackendKind::Graph)
        .param("kind", "speech")
        .param("prompt", "Read it aloud")
        .credential(credential.clone())
        .build();
    assert_eq!(
        orchestrator.run(&speech).await.error_kind(),
        Some("UnsupportedOperation")
    );

    let hot = ExtractionRequest::builder("https://example.com", BackendKind::Graph)
        .param("kind", "smart_scraper")
        .param("prompt", "p")
        .param("temperature", 5.0)
        .credential(credential)
        .build();
    assert_eq!(
        orchestrator.run(&hot).await.error_kind(),
        Some("InvalidConfiguration")
    );

    execute.assert_calls_async(0).await;
}
