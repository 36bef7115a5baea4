//! Chat Service: stateless HTTP front end for the agent runner
//!
//! # Routes
//!
//! ```text
//! GET  /health   → {"status":"ok"}
//! POST /chat     → {"response": ...} | 422/500 {"detail": ...}
//! GET  /metrics  → Prometheus text format
//! ```

use std::future::Future;
use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use thiserror::Error;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tracing::{error, info, warn};

use crate::agent::{Agent, AgentConfig, AgentError, AgentRunner};
use crate::config::ProviderSettings;
use crate::llm::{ChatError, GroqClient};
use crate::metrics::{self, CHAT_REQUESTS};
use crate::protocol::{ChatRequest, ChatResponse, ErrorBody, HealthStatus};
use crate::search::{SearchError, SearchProvider, TavilyClient};

/// Shared state handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub agent: Arc<dyn Agent>,
}

impl AppState {
    pub fn new(agent: Arc<dyn Agent>) -> Self {
        Self { agent }
    }
}

/// Errors a handler turns into a response
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),
    #[error(transparent)]
    Agent(#[from] AgentError),
    #[error("failed to render metrics: {0}")]
    Metrics(#[from] prometheus::Error),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Agent(_) | ApiError::Metrics(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = ErrorBody {
            detail: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

/// Build the service router with permissive CORS
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/chat", post(chat))
        .route("/metrics", get(metrics_text))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health() -> Json<HealthStatus> {
    Json(HealthStatus::ok())
}

async fn chat(
    State(state): State<AppState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, ApiError> {
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => {
            CHAT_REQUESTS.with_label_values(&["invalid"]).inc();
            warn!(error = %rejection.body_text(), "Rejected malformed chat request");
            return Err(ApiError::Validation(rejection.body_text()));
        }
    };

    if request.query.trim().is_empty() {
        CHAT_REQUESTS.with_label_values(&["invalid"]).inc();
        return Err(ApiError::Validation("query must not be empty".to_string()));
    }

    info!(
        model = %request.model_id,
        allow_search = request.allow_search,
        query_len = request.query.len(),
        "Chat request"
    );

    match state.agent.respond(&request).await {
        Ok(response) => {
            CHAT_REQUESTS.with_label_values(&["ok"]).inc();
            Ok(Json(ChatResponse { response }))
        }
        Err(e) => {
            CHAT_REQUESTS.with_label_values(&["agent_error"]).inc();
            error!(error = %error_chain(&e), kind = e.kind(), "Chat request failed");
            Err(ApiError::Agent(e))
        }
    }
}

async fn metrics_text() -> Result<Response, ApiError> {
    let body = metrics::render()?;
    Ok((
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        body,
    )
        .into_response())
}

/// Join an error and all of its sources into one line
pub fn error_chain(error: &dyn std::error::Error) -> String {
    let mut chain = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        chain.push_str(": ");
        chain.push_str(&cause.to_string());
        source = cause.source();
    }
    chain
}

/// Failures while assembling or running the service
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to build language model client: {0}")]
    Model(#[from] ChatError),
    #[error("failed to build search client: {0}")]
    Search(#[from] SearchError),
    #[error("server I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Build the production agent from provider settings
///
/// Search is only wired in when a search credential is present.
pub fn build_agent(
    providers: &ProviderSettings,
    config: AgentConfig,
) -> Result<AgentRunner, ServerError> {
    let model = GroqClient::new(
        providers.groq_base_url.clone(),
        providers.groq_api_key.clone(),
        providers.request_timeout,
    )?;

    let search: Option<Arc<dyn SearchProvider>> = match &providers.tavily_api_key {
        Some(key) => Some(Arc::new(TavilyClient::new(
            providers.tavily_base_url.clone(),
            key.clone(),
            providers.request_timeout,
        )?)),
        None => {
            warn!("No search credential configured; allow_search requests will fail");
            None
        }
    };

    Ok(AgentRunner::new(Arc::new(model), search, config))
}

/// Serve the router until `shutdown` resolves
pub async fn serve<F>(listener: TcpListener, app: Router, shutdown: F) -> Result<(), ServerError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = listener.local_addr()?;
    info!(%addr, "Chat service listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;
    info!("Chat service stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_statuses() {
        assert_eq!(
            ApiError::Validation("bad".to_string()).status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            ApiError::Agent(AgentError::NoAnswer).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_error_chain_includes_sources() {
        let err = ServerError::Io(std::io::Error::new(
            std::io::ErrorKind::AddrInUse,
            "port taken",
        ));
        assert!(error_chain(&err).contains("port taken"));
    }

    #[test]
    fn test_build_agent_without_search_key() {
        let providers = ProviderSettings::from_lookup(|key| {
            (key == "GROQ_API_KEY").then(|| "gsk".to_string())
        })
        .unwrap();
        let agent = build_agent(&providers, AgentConfig::default()).unwrap();
        assert_eq!(agent.config().max_steps, 10);
    }
}
