//! Agent Runner - bounded ReAct loop over a language model and its tools
//!
//! Each run starts from `[system, human]`, then alternates model steps and
//! tool observations until the model answers without calling a tool or the
//! step budget runs out.

use std::sync::Arc;
use std::time::Instant;

use thiserror::Error;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::llm::{parse_tool_calls_from_text, AgentMessage, ChatError, LanguageModel, ToolCall};
use crate::metrics::{AGENT_RUNS, AGENT_STEPS, LLM_CALL_DURATION};
use crate::search::SearchProvider;

use super::tools::{ToolSet, WebSearchTool, SEARCH_RESULT_CAP};

/// Configuration for the agent runner
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Maximum number of model calls in one run
    pub max_steps: usize,
    /// Results per search invocation (capped at 5)
    pub search_max_results: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_steps: 10,
            search_max_results: SEARCH_RESULT_CAP,
        }
    }
}

/// Result of an agent run
#[derive(Debug, Clone)]
pub struct AgentResult {
    /// Content of the last ai message
    pub answer: String,
    /// Number of model calls made
    pub steps: usize,
    /// Number of tool invocations executed
    pub tool_calls_made: usize,
    /// Unique trace ID for this run
    pub trace_id: String,
    /// Full history, system prompt first
    pub messages: Vec<AgentMessage>,
}

/// Error type for agent runs
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("web search was requested but no search provider is configured")]
    SearchUnavailable,
    #[error("language model call failed: {0}")]
    Model(#[from] ChatError),
    #[error("agent did not produce a final answer within {steps} steps")]
    LoopExhausted { steps: usize },
    #[error("agent run produced no ai message")]
    NoAnswer,
    #[error("agent returned an empty answer")]
    EmptyAnswer,
}

impl AgentError {
    /// Short label used for metrics and logs
    pub fn kind(&self) -> &'static str {
        match self {
            AgentError::SearchUnavailable => "search_unavailable",
            AgentError::Model(_) => "model_error",
            AgentError::LoopExhausted { .. } => "loop_exhausted",
            AgentError::NoAnswer => "no_answer",
            AgentError::EmptyAnswer => "empty_answer",
        }
    }
}

/// Drives agent runs against a shared model and optional search provider
#[derive(Clone)]
pub struct AgentRunner {
    model: Arc<dyn LanguageModel>,
    search: Option<Arc<dyn SearchProvider>>,
    config: AgentConfig,
}

impl AgentRunner {
    /// Create a new agent runner
    ///
    /// # Arguments
    /// * `model` - Language model client holding the provider credential
    /// * `search` - Search provider, `None` if no search credential is configured
    /// * `config` - Step budget and tool limits
    pub fn new(
        model: Arc<dyn LanguageModel>,
        search: Option<Arc<dyn SearchProvider>>,
        config: AgentConfig,
    ) -> Self {
        Self {
            model,
            search,
            config,
        }
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// Tools offered for one run
    fn tool_set(&self, allow_search: bool) -> Result<ToolSet, AgentError> {
        if !allow_search {
            return Ok(ToolSet::empty());
        }
        let provider = self.search.clone().ok_or(AgentError::SearchUnavailable)?;
        Ok(ToolSet::with_search(WebSearchTool::new(
            provider,
            self.config.search_max_results,
        )))
    }

    /// Run the agent loop for one query
    ///
    /// # Arguments
    /// * `model_id` - Provider model to use, validated by the provider
    /// * `query` - The user's question
    /// * `allow_search` - Whether the web-search tool is offered
    /// * `system_prompt` - Instructions placed before the query
    pub async fn run(
        &self,
        model_id: &str,
        query: &str,
        allow_search: bool,
        system_prompt: &str,
    ) -> Result<AgentResult, AgentError> {
        let trace_id = Uuid::now_v7().to_string();

        let root_span = info_span!(
            "agent_run",
            trace_id = %trace_id,
            model = %model_id,
            allow_search,
            otel.name = "agent_run"
        );

        async {
            info!(trace_id = %trace_id, "Starting agent run");

            let result = self
                .run_loop(&trace_id, model_id, query, allow_search, system_prompt)
                .await;

            match &result {
                Ok(run) => {
                    info!(
                        trace_id = %trace_id,
                        steps = run.steps,
                        tool_calls = run.tool_calls_made,
                        "Agent run completed"
                    );
                    AGENT_RUNS.with_label_values(&["success"]).inc();
                    AGENT_STEPS.observe(run.steps as f64);
                }
                Err(e) => {
                    warn!(trace_id = %trace_id, error = %e, "Agent run failed");
                    AGENT_RUNS.with_label_values(&[e.kind()]).inc();
                }
            }
            result
        }
        .instrument(root_span)
        .await
    }

    async fn run_loop(
        &self,
        trace_id: &str,
        model_id: &str,
        query: &str,
        allow_search: bool,
        system_prompt: &str,
    ) -> Result<AgentResult, AgentError> {
        let tools = self.tool_set(allow_search)?;
        let tool_defs = tools.definitions();
        let tool_names = tools.names();

        let mut messages = vec![AgentMessage::system(system_prompt), AgentMessage::human(query)];
        let mut budget = self.config.max_steps;
        let mut steps = 0;
        let mut tool_calls_made = 0;

        loop {
            if budget == 0 {
                warn!(trace_id, steps, "Step budget exhausted");
                AGENT_STEPS.observe(steps as f64);
                return Err(AgentError::LoopExhausted { steps });
            }
            budget -= 1;
            steps += 1;

            let llm_span = info_span!(
                "llm_call",
                trace_id,
                step = steps,
                model = %model_id,
                otel.name = "llm_call"
            );
            let call_start = Instant::now();
            let reply = self
                .model
                .chat(model_id, &messages, &tool_defs)
                .instrument(llm_span)
                .await?;
            let elapsed = call_start.elapsed();
            LLM_CALL_DURATION
                .with_label_values(&[model_id])
                .observe(elapsed.as_secs_f64());
            debug!(trace_id, step = steps, duration_ms = elapsed.as_millis() as u64, "LLM call completed");

            // Native tool calls first, then calls written into the text
            let tool_calls: Vec<ToolCall> = if tools.is_empty() {
                Vec::new()
            } else if !reply.tool_calls.is_empty() {
                reply.tool_calls
            } else {
                parse_tool_calls_from_text(&reply.content, &tool_names)
            };

            let done = tool_calls.is_empty();
            messages.push(AgentMessage::ai_with_calls(reply.content, tool_calls.clone()));

            if done {
                let answer = final_answer(&messages)?;
                return Ok(AgentResult {
                    answer,
                    steps,
                    tool_calls_made,
                    trace_id: trace_id.to_string(),
                    messages,
                });
            }

            // No step left to read the observations, so don't run the tools
            if budget == 0 {
                warn!(trace_id, steps, pending_tool_calls = tool_calls.len(), "Step budget exhausted");
                AGENT_STEPS.observe(steps as f64);
                return Err(AgentError::LoopExhausted { steps });
            }

            for call in &tool_calls {
                tool_calls_made += 1;
                let tool_span = info_span!(
                    "tool_call",
                    trace_id,
                    tool = %call.name,
                    otel.name = "tool_call"
                );
                info!(trace_id, tool = %call.name, step = steps, "Invoking tool");
                let observation = tools.invoke(call).instrument(tool_span).await;
                messages.push(AgentMessage::observation(call, observation));
            }
        }
    }
}

/// Content of the last ai message in the history
///
/// Earlier ai messages (reasoning that led to a tool call) are not part of
/// the answer.
pub fn final_answer(messages: &[AgentMessage]) -> Result<String, AgentError> {
    let last_ai = messages.iter().rev().find_map(|message| match message {
        AgentMessage::Ai { content, .. } => Some(content),
        AgentMessage::System { .. }
        | AgentMessage::Human { .. }
        | AgentMessage::ToolObservation { .. } => None,
    });

    match last_ai {
        None => Err(AgentError::NoAnswer),
        Some(content) if content.trim().is_empty() => Err(AgentError::EmptyAnswer),
        Some(content) => Ok(content.clone()),
    }
}
