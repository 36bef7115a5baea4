//! Agent module for LLM-driven question answering
//!
//! # Architecture
//!
//! ```text
//! ChatRequest → AgentRunner → LanguageModel (Groq /chat/completions)
//!                   ↓
//!            Tool call: web_search (only when allow_search)
//!                   ↓
//!            SearchProvider (Tavily) → observation
//!                   ↓
//!            Feed observation back → loop or final answer
//! ```

pub mod runner;
pub mod tools;

use async_trait::async_trait;

use crate::protocol::ChatRequest;

pub use runner::{final_answer, AgentConfig, AgentError, AgentResult, AgentRunner};
pub use tools::{ToolSet, WebSearchTool, SEARCH_RESULT_CAP, WEB_SEARCH_TOOL};

/// Anything that can answer a chat request
///
/// The chat service depends on this rather than on [`AgentRunner`] so it can
/// be exercised with stub agents.
#[async_trait]
pub trait Agent: Send + Sync {
    async fn respond(&self, request: &ChatRequest) -> Result<String, AgentError>;
}

#[async_trait]
impl Agent for AgentRunner {
    async fn respond(&self, request: &ChatRequest) -> Result<String, AgentError> {
        let result = self
            .run(
                &request.model_id,
                &request.query,
                request.allow_search,
                &request.system_prompt,
            )
            .await?;
        Ok(result.answer)
    }
}
