//! Integration tests for the HTTP backend against a mock service.

use ragview_client::{
    ArtifactFetcher, AssistantBackend, BackendConfig, BackendError, FailureKind, HttpBackend,
    QueryRequest, UploadFile,
};
use serde_json::json;
use wiremock::matchers::{body_json, body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn backend_for(server: &MockServer) -> HttpBackend {
    HttpBackend::new(BackendConfig::new(server.uri())).expect("client should build")
}

#[tokio::test]
async fn query_posts_plain_body_and_decodes_sources() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/query"))
        .and(body_json(json!({ "query": "What is the refund policy?" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "answer": "30 days.",
            "sources": [
                { "file_name": "policy.pdf", "file_type": "pdf", "page_number": 2, "score": 0.91 }
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let response = backend_for(&server)
        .query(QueryRequest::new("What is the refund policy?", None))
        .await
        .expect("query should succeed");

    assert_eq!(response.answer, "30 days.");
    assert_eq!(response.sources.len(), 1);
    assert_eq!(response.sources[0].file_name, "policy.pdf");
    assert_eq!(response.sources[0].page_number, Some(2));
}

#[tokio::test]
async fn query_with_attachment_uses_multimodal_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/query"))
        .and(body_json(json!({
            "text": "what is in this picture?",
            "imageUrl": "http://files/storage/cat.png"
        })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "answer": "a cat", "sources": [] })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let response = backend_for(&server)
        .query(QueryRequest::new(
            "what is in this picture?",
            Some("http://files/storage/cat.png".to_string()),
        ))
        .await
        .expect("multimodal query should succeed");

    assert_eq!(response.answer, "a cat");
}

#[tokio::test]
async fn non_success_status_is_a_network_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/query"))
        .respond_with(ResponseTemplate::new(503).set_body_string("warming up"))
        .mount(&server)
        .await;

    let error = backend_for(&server)
        .query(QueryRequest::new("hello", None))
        .await
        .expect_err("503 must fail");

    assert_eq!(error.kind(), FailureKind::Network);
    match error {
        BackendError::Status { status, body, .. } => {
            assert_eq!(status, 503);
            assert_eq!(body, "warming up");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn malformed_body_is_a_decode_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/query"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&server)
        .await;

    let error = backend_for(&server)
        .query(QueryRequest::new("hello", None))
        .await
        .expect_err("html must not decode");

    assert_eq!(error.kind(), FailureKind::Decode);
    assert_eq!(error.stage(), "query");
}

#[tokio::test]
async fn single_ingest_sends_file_part() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/ingest"))
        .and(body_string_contains("report.pdf"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "file": "report.pdf", "vectors_indexed": 42 })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let response = backend_for(&server)
        .ingest_single(UploadFile::new("report.pdf", b"%PDF-1.4".to_vec()))
        .await
        .expect("ingest should succeed");

    assert_eq!(response.file, "report.pdf");
    assert_eq!(response.vectors_indexed, 42);
}

#[tokio::test]
async fn batch_ingest_sends_every_file() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/ingest/batch"))
        .and(body_string_contains("a.txt"))
        .and(body_string_contains("b.png"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "files": ["a.txt", "b.png"],
            "vectors_indexed": 17
        })))
        .expect(1)
        .mount(&server)
        .await;

    let response = backend_for(&server)
        .ingest_batch(vec![
            UploadFile::new("a.txt", b"alpha".to_vec()),
            UploadFile::new("b.png", vec![0x89, b'P', b'N', b'G']),
        ])
        .await
        .expect("batch ingest should succeed");

    assert_eq!(response.files, vec!["a.txt", "b.png"]);
    assert_eq!(response.vectors_indexed, 17);
}

#[tokio::test]
async fn fetch_returns_raw_bytes_and_maps_missing_artifacts() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/storage/notes.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"hello".to_vec()))
        .mount(&server)
        .await;

    let backend = backend_for(&server);
    let found = format!("{}/storage/notes.txt", server.uri());
    let bytes = backend.fetch(&found).await.expect("artifact should load");
    assert_eq!(&bytes[..], b"hello");

    let missing = format!("{}/storage/gone.pdf", server.uri());
    let error = backend.fetch(&missing).await.expect_err("404 must fail");
    assert!(matches!(error, BackendError::Status { status: 404, .. }));
}
