//! Groq chat-completions client
//!
//! Groq serves an OpenAI-compatible `/chat/completions` endpoint, including
//! native tool calling, so the wire types below follow that format.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{AgentMessage, ChatError, LanguageModel, ModelReply, Tool, ToolCall};

/// Default Groq API base URL
pub const DEFAULT_GROQ_BASE_URL: &str = "https://api.groq.com/openai/v1";

/// Sampling temperature for every request
const TEMPERATURE: f32 = 0.7;

/// Client for Groq's `/chat/completions` endpoint with tool support
#[derive(Clone)]
pub struct GroqClient {
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl GroqClient {
    /// Create a new Groq client
    ///
    /// # Arguments
    /// * `base_url` - API base, e.g. "https://api.groq.com/openai/v1"
    /// * `api_key` - Bearer credential sent with every request
    /// * `timeout` - Per-request timeout covering connect and response
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ChatError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            client,
        })
    }
}

#[async_trait]
impl LanguageModel for GroqClient {
    async fn chat(
        &self,
        model: &str,
        messages: &[AgentMessage],
        tools: &[Tool],
    ) -> Result<ModelReply, ChatError> {
        let endpoint = format!("{}/chat/completions", self.base_url);

        let body = CompletionRequest {
            model,
            messages: messages.iter().map(WireMessage::from).collect(),
            temperature: TEMPERATURE,
            tools: (!tools.is_empty()).then_some(tools),
            tool_choice: (!tools.is_empty()).then_some("auto"),
        };

        debug!(model, messages = messages.len(), tools = tools.len(), "Sending chat completion");

        let response = self
            .client
            .post(&endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            let detail = error_message(&text);
            return Err(match status.as_u16() {
                401 | 403 => ChatError::Auth(detail),
                429 => ChatError::RateLimited(detail),
                code => ChatError::Api {
                    status: code,
                    body: detail,
                },
            });
        }

        if text.is_empty() {
            return Err(ChatError::EmptyResponse);
        }

        let completion: CompletionResponse = serde_json::from_str(&text)?;
        let message = completion
            .choices
            .into_iter()
            .next()
            .ok_or(ChatError::EmptyResponse)?
            .message;

        let tool_calls = message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(ToolCall::from)
            .collect();

        Ok(ModelReply {
            content: message.content.unwrap_or_default(),
            tool_calls,
        })
    }
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<&'a [Tool]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<&'static str>,
}

#[derive(Serialize)]
struct WireMessage {
    role: &'static str,
    content: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tool_calls: Vec<WireToolCall>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

impl From<&AgentMessage> for WireMessage {
    fn from(message: &AgentMessage) -> Self {
        match message {
            AgentMessage::System { content } => Self::plain("system", content),
            AgentMessage::Human { content } => Self::plain("user", content),
            AgentMessage::Ai {
                content,
                tool_calls,
            } => Self {
                role: "assistant",
                // content may be null only when the message carries tool calls
                content: (!content.is_empty() || tool_calls.is_empty()).then(|| content.clone()),
                tool_calls: tool_calls.iter().map(WireToolCall::from).collect(),
                tool_call_id: None,
            },
            AgentMessage::ToolObservation {
                call_id, content, ..
            } => Self {
                role: "tool",
                content: Some(content.clone()),
                tool_calls: Vec::new(),
                tool_call_id: Some(call_id.clone()),
            },
        }
    }
}

impl WireMessage {
    fn plain(role: &'static str, content: &str) -> Self {
        Self {
            role,
            content: Some(content.to_string()),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }
}

#[derive(Serialize, Deserialize)]
struct WireToolCall {
    #[serde(default)]
    id: String,
    #[serde(rename = "type", default = "function_type")]
    call_type: String,
    function: WireFunction,
}

#[derive(Serialize, Deserialize)]
struct WireFunction {
    name: String,
    /// JSON-encoded argument object, as a string
    #[serde(default)]
    arguments: String,
}

fn function_type() -> String {
    "function".to_string()
}

impl From<&ToolCall> for WireToolCall {
    fn from(call: &ToolCall) -> Self {
        Self {
            id: call.id.clone(),
            call_type: function_type(),
            function: WireFunction {
                name: call.name.clone(),
                arguments: call.arguments.to_string(),
            },
        }
    }
}

impl From<WireToolCall> for ToolCall {
    fn from(call: WireToolCall) -> Self {
        // Keep undecodable arguments as a raw string; the tool reports it
        let arguments = serde_json::from_str(&call.function.arguments)
            .unwrap_or(serde_json::Value::String(call.function.arguments));
        Self {
            id: call.id,
            name: call.function.name,
            arguments,
        }
    }
}

#[derive(Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<WireToolCall>>,
}

/// Pull `error.message` out of an OpenAI-style error body, else the raw text
fn error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
        .unwrap_or_else(|| body.trim().to_string())
}
