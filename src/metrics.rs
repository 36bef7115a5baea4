//! Prometheus metrics for the chat service and agent runner
//!
//! All metrics live in the process-wide default registry and are rendered
//! by [`render`] for the `/metrics` endpoint.

use lazy_static::lazy_static;
use prometheus::{
    register_histogram, register_histogram_vec, register_int_counter_vec, Encoder, Histogram,
    HistogramVec, IntCounterVec, TextEncoder,
};

lazy_static! {
    // ─────────────────────────────────────────────────────────────────────────────
    // Chat Service Metrics
    // ─────────────────────────────────────────────────────────────────────────────

    /// `/chat` requests handled, by outcome.
    ///
    /// Labels:
    /// - status: "ok", "invalid" (422) or "agent_error" (500)
    pub static ref CHAT_REQUESTS: IntCounterVec = register_int_counter_vec!(
        "chatvisor_chat_requests_total",
        "Chat requests handled, by outcome",
        &["status"]
    ).expect("failed to register CHAT_REQUESTS metric");

    // ─────────────────────────────────────────────────────────────────────────────
    // Agent Metrics
    // ─────────────────────────────────────────────────────────────────────────────

    /// Agent runs, by outcome.
    ///
    /// Labels:
    /// - outcome: "success" or an `AgentError::kind` (e.g. "loop_exhausted")
    pub static ref AGENT_RUNS: IntCounterVec = register_int_counter_vec!(
        "chatvisor_agent_runs_total",
        "Agent runs, by outcome",
        &["outcome"]
    ).expect("failed to register AGENT_RUNS metric");

    /// Language-model calls made per agent run.
    pub static ref AGENT_STEPS: Histogram = register_histogram!(
        "chatvisor_agent_steps",
        "Language-model steps per agent run",
        vec![1.0, 2.0, 3.0, 4.0, 5.0, 7.0, 10.0, 15.0, 20.0]
    ).expect("failed to register AGENT_STEPS metric");

    /// Tool invocations requested by the model.
    ///
    /// Labels:
    /// - tool: A registered tool name, or "unknown" for anything else
    pub static ref AGENT_TOOL_CALLS: IntCounterVec = register_int_counter_vec!(
        "chatvisor_agent_tool_calls_total",
        "Tool invocations, by tool",
        &["tool"]
    ).expect("failed to register AGENT_TOOL_CALLS metric");

    // ─────────────────────────────────────────────────────────────────────────────
    // Provider Metrics
    // ─────────────────────────────────────────────────────────────────────────────

    /// Latency of a single language-model call.
    ///
    /// Labels:
    /// - model: The model id the request asked for
    pub static ref LLM_CALL_DURATION: HistogramVec = register_histogram_vec!(
        "chatvisor_llm_call_duration_seconds",
        "Duration of one language-model call",
        &["model"],
        vec![0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0]
    ).expect("failed to register LLM_CALL_DURATION metric");
}

/// Render every registered metric in the Prometheus text format
pub fn render() -> Result<String, prometheus::Error> {
    let mut buffer = Vec::new();
    TextEncoder::new().encode(&prometheus::gather(), &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
}
