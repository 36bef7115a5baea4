//! Tools the agent may call during a run
//!
//! A run gets either no tools or exactly one web-search tool. Tool failures
//! never abort the loop: they are returned to the model as observation text.

use std::sync::Arc;

use serde_json::{json, Value};
use thiserror::Error;
use tracing::{info, warn};

use crate::llm::{Tool, ToolCall};
use crate::metrics::AGENT_TOOL_CALLS;
use crate::search::{SearchError, SearchProvider};

/// Name the search tool is advertised under
pub const WEB_SEARCH_TOOL: &str = "web_search";

/// Maximum results one search invocation returns
pub const SEARCH_RESULT_CAP: usize = 5;

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("unknown tool '{0}'")]
    Unknown(String),
    #[error("missing '{0}' argument")]
    MissingArgument(&'static str),
    #[error(transparent)]
    Search(#[from] SearchError),
    #[error("could not encode tool output: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Web search backed by a [`SearchProvider`]
#[derive(Clone)]
pub struct WebSearchTool {
    provider: Arc<dyn SearchProvider>,
    max_results: usize,
}

impl WebSearchTool {
    /// Results are capped at [`SEARCH_RESULT_CAP`] whatever `max_results` says
    pub fn new(provider: Arc<dyn SearchProvider>, max_results: usize) -> Self {
        Self {
            provider,
            max_results: max_results.clamp(1, SEARCH_RESULT_CAP),
        }
    }

    pub fn max_results(&self) -> usize {
        self.max_results
    }

    pub fn definition(&self) -> Tool {
        Tool::function(
            WEB_SEARCH_TOOL,
            "Search the web for current information. Use this for recent events, \
             facts you are unsure about, or anything that needs an up-to-date source.",
            json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "The search query"
                    }
                },
                "required": ["query"]
            }),
        )
    }

    /// Run one search and format the hits as a JSON array for the model
    pub async fn invoke(&self, arguments: &Value) -> Result<String, ToolError> {
        let query = match arguments {
            Value::String(raw) => raw.as_str(),
            other => other["query"]
                .as_str()
                .ok_or(ToolError::MissingArgument("query"))?,
        };
        if query.trim().is_empty() {
            return Err(ToolError::MissingArgument("query"));
        }

        let results = self.provider.search(query, self.max_results).await?;
        info!(query, results = results.len(), "Web search completed");

        if results.is_empty() {
            return Ok("No results found.".to_string());
        }
        Ok(serde_json::to_string(&results)?)
    }
}

/// The tools offered to the model for one run
#[derive(Clone, Default)]
pub struct ToolSet {
    search: Option<WebSearchTool>,
}

impl ToolSet {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_search(tool: WebSearchTool) -> Self {
        Self { search: Some(tool) }
    }

    pub fn is_empty(&self) -> bool {
        self.search.is_none()
    }

    pub fn len(&self) -> usize {
        usize::from(self.search.is_some())
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.search.iter().map(|_| WEB_SEARCH_TOOL).collect()
    }

    pub fn definitions(&self) -> Vec<Tool> {
        self.search.iter().map(WebSearchTool::definition).collect()
    }

    /// Invoke the tool a call names and return the observation text
    pub async fn invoke(&self, call: &ToolCall) -> String {
        // Model-supplied names are unbounded; only registered ones become labels
        let label = if self.names().contains(&call.name.as_str()) {
            call.name.as_str()
        } else {
            "unknown"
        };
        AGENT_TOOL_CALLS.with_label_values(&[label]).inc();

        let result = match (call.name.as_str(), &self.search) {
            (WEB_SEARCH_TOOL, Some(search)) => search.invoke(&call.arguments).await,
            (other, _) => Err(ToolError::Unknown(other.to_string())),
        };

        result.unwrap_or_else(|e| {
            warn!(tool = %call.name, error = %e, "Tool call failed");
            format!("Error: {}", e)
        })
    }
}
