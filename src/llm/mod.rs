//! Language-model integration
//!
//! The agent talks to models through the [`LanguageModel`] trait. The one
//! production implementation is [`GroqClient`], an OpenAI-compatible
//! chat-completions client; tests substitute scripted models.

pub mod groq;
pub mod messages;

use async_trait::async_trait;
use thiserror::Error;

pub use groq::GroqClient;
pub use messages::{
    parse_tool_calls_from_text, AgentMessage, ModelReply, Tool, ToolCall, ToolFunction,
};

/// Error type for chat operations
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("authentication rejected by provider: {0}")]
    Auth(String),
    #[error("rate limited by provider: {0}")]
    RateLimited(String),
    #[error("provider request timed out")]
    Timeout(#[source] reqwest::Error),
    #[error("request error: {0}")]
    Request(#[source] reqwest::Error),
    #[error("provider returned {status}: {body}")]
    Api { status: u16, body: String },
    #[error("parse error: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("empty response from provider")]
    EmptyResponse,
}

impl From<reqwest::Error> for ChatError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ChatError::Timeout(e)
        } else {
            ChatError::Request(e)
        }
    }
}

/// A chat model that can answer or request tool calls
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Send the full history and the available tools, get the next reply
    ///
    /// `model` selects the provider model for this call; an empty `tools`
    /// slice means the model is offered no tools.
    async fn chat(
        &self,
        model: &str,
        messages: &[AgentMessage],
        tools: &[Tool],
    ) -> Result<ModelReply, ChatError>;
}
