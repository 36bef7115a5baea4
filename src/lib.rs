//! chatvisor - LLM chat agent with optional web search, served over HTTP
//!
//! The library backs three binaries: the chat service, the terminal chat
//! client, and a supervisor that runs the two together.
//!
//! # Modules
//!
//! - `llm` - Language-model client (Groq, OpenAI-compatible) and message types
//! - `search` - Web search client (Tavily)
//! - `agent` - Bounded ReAct loop over the model and the search tool
//! - `server` - HTTP chat service (`/health`, `/chat`, `/metrics`)
//! - `client` - Chat session, backend client and REPL
//! - `supervisor` - Starts and watches the service and the client
//! - `config` - Settings read from the environment
//! - `metrics` - Prometheus metrics for observability
//! - `telemetry` - tracing subscriber and OpenTelemetry export
//!
//! # Quick Start
//!
//! ```ignore
//! use chatvisor::agent::{AgentConfig, AgentRunner};
//!
//! let runner = AgentRunner::new(model, None, AgentConfig::default());
//! let result = runner.run("llama-3.3-70b-versatile", "What is 2+2?", false, "Be brief.").await?;
//! println!("{}", result.answer);
//! ```

pub mod agent;
pub mod client;
pub mod config;
pub mod llm;
pub mod metrics;
pub mod protocol;
pub mod search;
pub mod server;
pub mod shutdown;
pub mod supervisor;
pub mod telemetry;

// Re-export commonly used types at crate root for convenience
pub use agent::{Agent, AgentConfig, AgentError, AgentRunner};
pub use protocol::{ChatRequest, ChatResponse};
pub use supervisor::{Supervisor, SupervisorConfig, SupervisorReport};
