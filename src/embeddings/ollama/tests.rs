use super::*;
use serde_json::json;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{body_partial_json, method, path},
};

fn embedder_for(server: &MockServer, batch_size: u32) -> OllamaEmbedder {
    let config = EmbeddingConfig {
        host: "127.0.0.1".to_string(),
        port: server.address().port(),
        model: "test-model".to_string(),
        batch_size,
        ..EmbeddingConfig::default()
    };
    OllamaEmbedder::new(&config)
        .expect("Failed to create embedder")
        .with_retry_policy(RetryPolicy::new(2).with_base_delay(Duration::from_millis(1)))
}

#[test]
fn client_configuration() {
    let config = EmbeddingConfig {
        host: "test-host".to_string(),
        port: 1234,
        model: "test-model".to_string(),
        batch_size: 128,
        retry_attempts: 4,
        ..EmbeddingConfig::default()
    };
    let client = OllamaEmbedder::new(&config).expect("Failed to create client");

    assert_eq!(client.model(), "test-model");
    assert_eq!(client.batch_size, 128);
    assert_eq!(client.base_url.host_str(), Some("test-host"));
    assert_eq!(client.base_url.port(), Some(1234));
    assert_eq!(client.retry.max_attempts, 4);
}

#[test]
fn empty_input_makes_no_request() {
    let config = EmbeddingConfig {
        host: "127.0.0.1".to_string(),
        port: 1,
        ..EmbeddingConfig::default()
    };
    let client = OllamaEmbedder::new(&config).expect("Failed to create client");
    let vectors = client.embed(&[]).expect("empty input is fine");
    assert!(vectors.is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn embeds_in_server_batches_preserving_order() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .and(body_partial_json(json!({ "input": ["a", "b"] })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "embeddings": [[1.0, 0.0], [0.0, 1.0]] })),
        )
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .and(body_partial_json(json!({ "input": ["c"] })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "embeddings": [[0.5, 0.5]] })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = embedder_for(&server, 2);
    let texts = vec!["a".to_string(), "b".to_string(), "c".to_string()];
    let vectors = client.embed(&texts).expect("embedding should succeed");

    assert_eq!(
        vectors,
        vec![vec![1.0, 0.0], vec![0.0, 1.0], vec![0.5, 0.5]]
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn rate_limit_exhaustion_is_provider_unavailable() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .respond_with(ResponseTemplate::new(429))
        .expect(2)
        .mount(&server)
        .await;

    let client = embedder_for(&server, 10);
    let err = client
        .embed(&["query".to_string()])
        .expect_err("rate limiting should exhaust retries");

    assert!(matches!(err, LoreError::ProviderUnavailable(_)));
}

#[tokio::test(flavor = "multi_thread")]
async fn short_response_is_rejected() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "embeddings": [[1.0, 0.0]] })),
        )
        .mount(&server)
        .await;

    let client = embedder_for(&server, 10);
    let texts = vec!["a".to_string(), "b".to_string()];
    assert!(client.embed(&texts).is_err());
}

#[tokio::test(flavor = "multi_thread")]
async fn health_check_requires_model() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/tags"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "models": [{ "name": "other-model" }]
        })))
        .mount(&server)
        .await;

    let client = embedder_for(&server, 10);
    assert!(client.ping().is_ok());
    assert!(matches!(
        client.health_check(),
        Err(LoreError::ProviderUnavailable(_))
    ));
}
