/// Integration tests for the Ollama client against a mock `/api/chat` server.
use autotag::DebugLog;
use autotag::llm::{LlmError, LocalClient, LocalClientBuilder, TagModel, TagSuggestionRequest};
use serde_json::{Value, json};
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn chat_response(content: &str) -> Value {
    json!({
        "model": "llama3.1:8b",
        "created_at": "2024-07-01T12:00:00Z",
        "message": { "role": "assistant", "content": content },
        "done": true
    })
}

fn client(server: &MockServer, log: &DebugLog) -> LocalClient {
    LocalClientBuilder::new()
        .base_url(server.uri())
        .model("llama3.1:8b")
        .debug_log(log.clone())
        .build()
        .expect("Failed to create client")
}

#[tokio::test]
async fn structured_reply_is_parsed_into_tags() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .and(body_partial_json(json!({
            "model": "llama3.1:8b",
            "stream": false,
            "format": { "type": "object", "required": ["tags"] }
        })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(chat_response(r#"{"tags": ["rust", "async", "tokio"]}"#)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let log = DebugLog::new();
    let tags = client(&server, &log)
        .generate_tags(&TagSuggestionRequest::new("Writing async services with tokio."))
        .await
        .unwrap();

    assert_eq!(tags, vec!["rust", "async", "tokio"]);
    let entry = log.latest().unwrap();
    assert_eq!(entry.endpoint, format!("{}/api/chat", server.uri()));
    assert!(!entry.is_error());
}

#[tokio::test]
async fn prompt_messages_match_hosted_client() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_response(r#"{"tags": []}"#)))
        .mount(&server)
        .await;

    let request = TagSuggestionRequest::new("Sourdough starter notes")
        .with_known_tags(vec!["baking".to_string()]);
    client(&server, &DebugLog::new())
        .generate_tags(&request)
        .await
        .unwrap();

    let requests = server.received_requests().await.unwrap();
    let body: Value = serde_json::from_slice(&requests[0].body).unwrap();
    let user = body["messages"][1]["content"].as_str().unwrap();
    assert_eq!(body["messages"][0]["role"], "system");
    assert!(user.contains("<text>\nSourdough starter notes\n</text>"));
    assert!(user.contains("<existingTags>\nbaking\n</existingTags>"));
}

#[tokio::test]
async fn prose_reply_is_protocol_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(chat_response("Here are some tags: rust")),
        )
        .mount(&server)
        .await;

    let log = DebugLog::new();
    let result = client(&server, &log)
        .generate_tags(&TagSuggestionRequest::new("text"))
        .await;

    assert!(matches!(result, Err(LlmError::Protocol(_))), "{result:?}");
    assert!(log.latest().unwrap().is_error());
}

#[tokio::test]
async fn unknown_model_error_is_api_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(
            ResponseTemplate::new(404)
                .set_body_json(json!({ "error": "model 'llama3.1:8b' not found" })),
        )
        .mount(&server)
        .await;

    let result = client(&server, &DebugLog::new())
        .generate_tags(&TagSuggestionRequest::new("text"))
        .await;

    match result {
        Err(LlmError::Api { message, .. }) => assert!(message.contains("not found")),
        other => panic!("expected API error, got {other:?}"),
    }
}

#[tokio::test]
async fn unreachable_server_is_transport_error() {
    let log = DebugLog::new();
    let client = LocalClientBuilder::new()
        .base_url("http://127.0.0.1:1")
        .model("llama3.1:8b")
        .debug_log(log.clone())
        .build()
        .unwrap();

    let err = client
        .generate_tags(&TagSuggestionRequest::new("text"))
        .await
        .unwrap_err();

    assert!(err.is_transport(), "{err:?}");
    assert_eq!(log.latest().unwrap().request_id, err.request_id().unwrap());
}
