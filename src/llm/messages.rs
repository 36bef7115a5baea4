//! Message and tool types exchanged with the language model
//!
//! A conversation is an ordered `Vec<AgentMessage>`. The enum tag is the
//! message's role; provider clients translate it to their own wire format.

use serde::{Deserialize, Serialize};

/// One message in an agent conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum AgentMessage {
    /// Instructions for the model, always first in the history
    System { content: String },
    /// The user's query
    Human { content: String },
    /// A model reply. Non-empty `tool_calls` means the model wants to act.
    Ai {
        content: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        tool_calls: Vec<ToolCall>,
    },
    /// Output of a tool, answering the call with the same id
    ToolObservation {
        call_id: String,
        name: String,
        content: String,
    },
}

impl AgentMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self::System {
            content: content.into(),
        }
    }

    pub fn human(content: impl Into<String>) -> Self {
        Self::Human {
            content: content.into(),
        }
    }

    pub fn ai(content: impl Into<String>) -> Self {
        Self::Ai {
            content: content.into(),
            tool_calls: Vec::new(),
        }
    }

    pub fn ai_with_calls(content: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self::Ai {
            content: content.into(),
            tool_calls,
        }
    }

    pub fn observation(call: &ToolCall, content: impl Into<String>) -> Self {
        Self::ToolObservation {
            call_id: call.id.clone(),
            name: call.name.clone(),
            content: content.into(),
        }
    }

    pub fn content(&self) -> &str {
        match self {
            Self::System { content }
            | Self::Human { content }
            | Self::Ai { content, .. }
            | Self::ToolObservation { content, .. } => content,
        }
    }
}

/// A tool call requested by the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Provider-assigned id; observations echo it back
    pub id: String,
    pub name: String,
    pub arguments: serde_json::Value,
}

/// The model's reply to one step
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelReply {
    pub content: String,
    pub tool_calls: Vec<ToolCall>,
}

impl ModelReply {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            tool_calls: Vec::new(),
        }
    }
}

/// Tool definition advertised to the model
#[derive(Debug, Clone, Serialize)]
pub struct Tool {
    #[serde(rename = "type")]
    pub tool_type: String, // Always "function"
    pub function: ToolFunction,
}

/// Function specification for a tool
#[derive(Debug, Clone, Serialize)]
pub struct ToolFunction {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value, // JSON Schema
}

impl Tool {
    pub fn function(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: serde_json::Value,
    ) -> Self {
        Self {
            tool_type: "function".to_string(),
            function: ToolFunction {
                name: name.into(),
                description: description.into(),
                parameters,
            },
        }
    }
}

/// Recover tool calls that a model wrote into its reply text
///
/// Some models print `{"name": ..., "arguments": {...}}` instead of using the
/// native tool-call field. Only calls naming one of `known_tools` are kept, so
/// an answer that merely contains JSON is not mistaken for an action.
pub fn parse_tool_calls_from_text(content: &str, known_tools: &[&str]) -> Vec<ToolCall> {
    let content = content.trim();
    let mut tool_calls = Vec::new();

    // Whole reply is a single call
    if let Some(call) = try_parse_tool_call(content, known_tools, 0) {
        tool_calls.push(call);
        return tool_calls;
    }

    // Otherwise scan for balanced top-level {...} objects
    let mut depth = 0usize;
    let mut start = None;

    for (i, c) in content.char_indices() {
        match c {
            '{' => {
                if depth == 0 {
                    start = Some(i);
                }
                depth += 1;
            }
            '}' if depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    if let Some(s) = start.take() {
                        let index = tool_calls.len();
                        if let Some(call) = try_parse_tool_call(&content[s..=i], known_tools, index) {
                            tool_calls.push(call);
                        }
                    }
                }
            }
            _ => {}
        }
    }

    tool_calls
}

fn try_parse_tool_call(json_str: &str, known_tools: &[&str], index: usize) -> Option<ToolCall> {
    let value = serde_json::from_str::<serde_json::Value>(json_str).ok()?;
    let name = value.get("name").and_then(|n| n.as_str())?;
    if !known_tools.contains(&name) {
        return None;
    }

    // Some models say "parameters" instead of "arguments"
    let arguments = value
        .get("arguments")
        .or_else(|| value.get("parameters"))?
        .clone();

    Some(ToolCall {
        id: format!("text_call_{}", index),
        name: name.to_string(),
        arguments,
    })
}
