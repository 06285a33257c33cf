//! # AI Provider Tests
//!
//! These tests run the HTTP model clients against a `wiremock` server to check the
//! request shape each one sends and how it handles API failures.

mod common;

use crate::common::setup_tracing;
use nlsql::prompts::PromptAssembler;
use nlsql::providers::ai::{GeminiProvider, LocalAiProvider};
use nlsql::{create_ai_provider, AiProvider, ModelRequest, ProviderConfig, ProviderError};
use serde_json::{json, Value};
use wiremock::{
    matchers::{header, method, path, query_param},
    Mock, MockServer, ResponseTemplate,
};

fn request() -> ModelRequest {
    PromptAssembler::new(Some("Write SQL only.".to_string())).assemble(
        "TABLE: orders\nCOLUMNS:\n  - id (INTEGER)",
        &[],
        "How many orders?",
    )
}

#[tokio::test]
async fn test_local_provider_sends_chat_completion() {
    setup_tracing();
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer secret"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"role": "assistant", "content": "```sql\nSELECT COUNT(*) FROM orders\n```"}}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let provider = LocalAiProvider::new(
        format!("{}/v1/chat/completions", server.uri()),
        Some("secret".to_string()),
        Some("qwen2.5-coder".to_string()),
    )
    .unwrap();

    let raw = provider.generate(&request()).await.unwrap();
    assert_eq!(raw, "```sql\nSELECT COUNT(*) FROM orders\n```");

    let received = server.received_requests().await.unwrap();
    let body: Value = serde_json::from_slice(&received[0].body).unwrap();
    assert_eq!(body["model"], "qwen2.5-coder");
    assert_eq!(body["stream"], false);
    assert_eq!(body["messages"][0]["role"], "system");
    assert_eq!(body["messages"][0]["content"], "Write SQL only.");
    assert_eq!(body["messages"][1]["role"], "user");
    let user = body["messages"][1]["content"].as_str().unwrap();
    assert!(user.contains("# Schema\nTABLE: orders"));
    assert!(user.contains("# Question\nHow many orders?"));
}

#[tokio::test]
async fn test_local_provider_surfaces_api_errors() {
    setup_tracing();
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(429).set_body_string("rate limited"))
        .mount(&server)
        .await;

    let provider = LocalAiProvider::new(server.uri(), None, None).unwrap();
    let err = provider.generate(&request()).await.unwrap_err();

    assert!(matches!(err, ProviderError::AiApi(ref body) if body == "rate limited"));
}

#[tokio::test]
async fn test_gemini_provider_sends_system_instruction() {
    setup_tracing();
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-test:generateContent"))
        .and(query_param("key", "gemini-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{"content": {"parts": [{"text": "SELECT "}, {"text": "1"}]}}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let provider = GeminiProvider::new(
        format!("{}/v1beta/models/gemini-test:generateContent", server.uri()),
        "gemini-key".to_string(),
    )
    .unwrap();

    let raw = provider.generate(&request()).await.unwrap();
    assert_eq!(raw, "SELECT 1");

    let received = server.received_requests().await.unwrap();
    let body: Value = serde_json::from_slice(&received[0].body).unwrap();
    assert_eq!(
        body["system_instruction"]["parts"][0]["text"],
        "Write SQL only."
    );
    assert_eq!(body["contents"][0]["role"], "user");
}

#[tokio::test]
async fn test_factory_builds_working_local_provider() {
    setup_tracing();
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"role": "assistant", "content": "SELECT 2"}}]
        })))
        .mount(&server)
        .await;

    let provider = create_ai_provider(&ProviderConfig {
        provider: "local".to_string(),
        api_url: Some(server.uri()),
        api_key: None,
        model_name: None,
    })
    .unwrap();

    assert_eq!(provider.generate(&request()).await.unwrap(), "SELECT 2");
}
