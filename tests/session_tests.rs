//! Integration tests for the chat client against stub chat services

use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use serde_json::{json, Value};
use tokio::io::BufReader;

use chatvisor::client::{
    run_repl, BackendClient, ChatBackend, ChatSession, ClientError, ConversationTurn,
    SessionSettings, TurnOutcome, CONNECTION_ERROR_MESSAGE,
};
use chatvisor::protocol::ChatRequest;

type Seen = Arc<Mutex<Vec<Value>>>;

/// Serve `/chat` with a fixed status and body, recording request bodies
async fn spawn_service(status: StatusCode, reply: Value) -> (String, Seen) {
    let seen: Seen = Arc::default();
    let app = Router::new()
        .route(
            "/chat",
            post(move |State(seen): State<Seen>, Json(body): Json<Value>| {
                let reply = reply.clone();
                async move {
                    seen.lock().unwrap().push(body);
                    (status, Json(reply))
                }
            }),
        )
        .with_state(seen.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{}", addr), seen)
}

/// Serve `/chat` but only answer after `delay`
async fn spawn_slow_service(delay: Duration) -> String {
    let app = Router::new().route(
        "/chat",
        post(move || async move {
            tokio::time::sleep(delay).await;
            Json(json!({"response": "too late"}))
        }),
    );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

/// A URL nothing is listening on
async fn dead_url() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}", addr)
}

fn session(url: &str) -> ChatSession {
    let backend = BackendClient::with_timeout(url, Duration::from_secs(5)).unwrap();
    ChatSession::new(Arc::new(backend), SessionSettings::default())
}

#[tokio::test]
async fn test_round_trip_appends_both_turns() {
    let (url, seen) = spawn_service(StatusCode::OK, json!({"response": "4"})).await;
    let mut session = session(&url);

    let outcome = session.submit("2+2?").await;

    assert_eq!(outcome, TurnOutcome::Answered("4".to_string()));
    assert_eq!(
        session.transcript().turns(),
        &[ConversationTurn::user("2+2?"), ConversationTurn::assistant("4")]
    );

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0]["query"], "2+2?");
    assert_eq!(seen[0]["allow_search"], false);
    assert!(seen[0]["model_id"].is_string());
}

#[tokio::test]
async fn test_service_error_renders_detail_and_session_continues() {
    let (url, _) = spawn_service(
        StatusCode::INTERNAL_SERVER_ERROR,
        json!({"detail": "language model call failed: boom"}),
    )
    .await;
    let mut session = session(&url);

    match session.submit("hi").await {
        TurnOutcome::Failed(text) => {
            assert!(text.starts_with("Error: "));
            assert!(text.contains("boom"));
        }
        other => panic!("expected failure, got {:?}", other),
    }
    assert_eq!(session.transcript().turns(), &[ConversationTurn::user("hi")]);

    // Still usable
    session.submit("again").await;
    assert_eq!(session.transcript().len(), 2);
}

#[tokio::test]
async fn test_unreachable_backend_gives_connection_error() {
    let url = dead_url().await;
    let backend = BackendClient::with_timeout(&url, Duration::from_secs(5)).unwrap();

    let err = backend.chat(&ChatRequest::new("hi")).await.unwrap_err();
    assert!(err.is_connection());

    let mut session = session(&url);
    assert_eq!(
        session.submit("hi").await,
        TurnOutcome::Failed(CONNECTION_ERROR_MESSAGE.to_string())
    );
}

#[tokio::test]
async fn test_slow_backend_is_not_reported_as_unreachable() {
    let url = spawn_slow_service(Duration::from_secs(3)).await;
    let backend = BackendClient::with_timeout(&url, Duration::from_millis(500)).unwrap();

    let err = backend.chat(&ChatRequest::new("hi")).await.unwrap_err();
    assert!(matches!(err, ClientError::Timeout { .. }), "got {:?}", err);
    assert!(!err.is_connection());

    let mut session = ChatSession::new(Arc::new(backend), SessionSettings::default());
    let outcome = session.submit("hi").await;
    assert_ne!(
        outcome,
        TurnOutcome::Failed(CONNECTION_ERROR_MESSAGE.to_string())
    );
    match outcome {
        TurnOutcome::Failed(text) => assert!(text.starts_with("Error: "), "got {:?}", text),
        other => panic!("expected failure, got {:?}", other),
    }
}

#[tokio::test]
async fn test_undecodable_body_is_decode_error() {
    let (url, _) = spawn_service(StatusCode::OK, json!({"answer": "4"})).await;
    let backend = BackendClient::new(url).unwrap();

    let err = backend.chat(&ChatRequest::new("hi")).await.unwrap_err();
    assert!(matches!(err, ClientError::Decode(_)));
}

#[tokio::test]
async fn test_repl_conversation() {
    let (url, seen) = spawn_service(StatusCode::OK, json!({"response": "4"})).await;
    let mut session = session(&url);

    let input = b"/search on\n2+2?\n/history\n/quit\nnever sent\n";
    let mut output = Vec::new();
    run_repl(&mut session, BufReader::new(&input[..]), &mut output)
        .await
        .unwrap();

    let output = String::from_utf8(output).unwrap();
    assert!(output.contains("Web search enabled"));
    assert!(output.contains("Thinking..."));
    assert!(output.contains("You: 2+2?\nAI: 4"));

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0]["allow_search"], true);
}
