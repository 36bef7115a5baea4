//! Integration tests for the chat service router
//!
//! Requests are driven in-process through `tower::ServiceExt::oneshot`
//! against stub agents.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use chatvisor::agent::{Agent, AgentError};
use chatvisor::llm::ChatError;
use chatvisor::protocol::{ChatRequest, DEFAULT_MODEL_ID, DEFAULT_SYSTEM_PROMPT};
use chatvisor::server::{router, AppState};

/// Answers with a description of the request it received
#[derive(Default)]
struct EchoAgent {
    calls: AtomicUsize,
}

#[async_trait]
impl Agent for EchoAgent {
    async fn respond(&self, request: &ChatRequest) -> Result<String, AgentError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(format!(
            "{}|{}|{}|{}",
            request.query, request.model_id, request.allow_search, request.system_prompt
        ))
    }
}

struct BoomAgent;

#[async_trait]
impl Agent for BoomAgent {
    async fn respond(&self, _request: &ChatRequest) -> Result<String, AgentError> {
        Err(AgentError::Model(ChatError::Auth("boom".to_string())))
    }
}

fn app(agent: Arc<dyn Agent>) -> Router {
    router(AppState::new(agent))
}

fn post_chat(body: &str) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri("/chat")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Vec<u8>) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, bytes.to_vec())
}

async fn send_json(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let (status, bytes) = send(app, request).await;
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn test_health_is_idempotent() {
    let agent = Arc::new(EchoAgent::default());
    for _ in 0..3 {
        let request = Request::get("/health").body(Body::empty()).unwrap();
        let (status, body) = send_json(app(agent.clone()), request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"status": "ok"}));
    }
    assert_eq!(agent.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_chat_applies_defaults() {
    let agent = Arc::new(EchoAgent::default());
    let (status, body) = send_json(app(agent.clone()), post_chat(r#"{"query": "2+2?"}"#)).await;

    assert_eq!(status, StatusCode::OK);
    let expected = format!("2+2?|{}|false|{}", DEFAULT_MODEL_ID, DEFAULT_SYSTEM_PROMPT);
    assert_eq!(body, json!({ "response": expected }));
    assert_eq!(agent.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_chat_accepts_legacy_model_field() {
    let agent = Arc::new(EchoAgent::default());
    let body = r#"{"query": "hi", "llm_id": "openai/gpt-oss-120b", "allow_search": true, "system_prompt": "Be terse."}"#;
    let (status, body) = send_json(app(agent), post_chat(body)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["response"], "hi|openai/gpt-oss-120b|true|Be terse.");
}

#[tokio::test]
async fn test_agent_failure_is_500_with_cause() {
    let (status, body) = send_json(app(Arc::new(BoomAgent)), post_chat(r#"{"query": "hi"}"#)).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    let detail = body["detail"].as_str().unwrap();
    assert!(detail.contains("boom"), "detail was {:?}", detail);
}

#[tokio::test]
async fn test_invalid_requests_are_422() {
    let agent = Arc::new(EchoAgent::default());

    for body in [r#"{"query": "   "}"#, r#"{"model_id": "x"}"#, "not json", r#"{"query": 5}"#] {
        let (status, value) = send_json(app(agent.clone()), post_chat(body)).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY, "body {:?}", body);
        assert!(value["detail"].is_string(), "body {:?}", body);
    }

    assert_eq!(agent.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_cors_allows_any_origin() {
    let request = Request::builder()
        .method(Method::OPTIONS)
        .uri("/chat")
        .header(header::ORIGIN, "http://localhost:8501")
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
        .body(Body::empty())
        .unwrap();
    let response = app(Arc::new(EchoAgent::default()))
        .oneshot(request)
        .await
        .unwrap();

    assert!(response.status().is_success());
    assert_eq!(
        response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        "*"
    );
}

#[tokio::test]
async fn test_metrics_endpoint_reports_chat_requests() {
    let agent = Arc::new(EchoAgent::default());
    send(app(agent.clone()), post_chat(r#"{"query": "hi"}"#)).await;

    let request = Request::get("/metrics").body(Body::empty()).unwrap();
    let (status, body) = send(app(agent), request).await;

    assert_eq!(status, StatusCode::OK);
    let text = String::from_utf8(body).unwrap();
    assert!(text.contains("chatvisor_chat_requests_total"));
}
