//! Wire types shared by the chat service and its clients
//!
//! These are the JSON bodies of `POST /chat` and `GET /health`. Optional
//! request fields fall back to the defaults below when omitted.

use serde::{Deserialize, Serialize};

/// Model used when a request does not name one
pub const DEFAULT_MODEL_ID: &str = "llama-3.3-70b-versatile";

/// System prompt used when a request does not carry one
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful AI assistant.";

/// System prompt the terminal client starts with
pub const CLIENT_SYSTEM_PROMPT: &str = "You are a helpful and knowledgeable AI assistant. \
Answer the user's questions clearly and concisely.";

/// Models offered by the terminal client. The provider has the final say.
pub const KNOWN_MODELS: &[&str] = &[
    "llama-3.3-70b-versatile",
    "llama-3.2-70b-versatile",
    "openai/gpt-oss-120b",
];

/// Body of `POST /chat`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub query: String,
    /// `llm_id` is the field name older clients send
    #[serde(default = "default_model_id", alias = "llm_id")]
    pub model_id: String,
    #[serde(default)]
    pub allow_search: bool,
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
}

impl ChatRequest {
    /// Request with every optional field at its default
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            model_id: default_model_id(),
            allow_search: false,
            system_prompt: default_system_prompt(),
        }
    }

    pub fn with_model(mut self, model_id: impl Into<String>) -> Self {
        self.model_id = model_id.into();
        self
    }

    pub fn with_search(mut self, allow_search: bool) -> Self {
        self.allow_search = allow_search;
        self
    }

    pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = system_prompt.into();
        self
    }
}

/// Successful body of `POST /chat`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatResponse {
    pub response: String,
}

/// Error body for any non-2xx response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub detail: String,
}

/// Body of `GET /health`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
}

impl HealthStatus {
    pub fn ok() -> Self {
        Self {
            status: "ok".to_string(),
        }
    }
}

fn default_model_id() -> String {
    DEFAULT_MODEL_ID.to_string()
}

fn default_system_prompt() -> String {
    DEFAULT_SYSTEM_PROMPT.to_string()
}
