//! chatvisor-chat: interactive terminal client for the chat service
//!
//! Usage:
//!   chatvisor-chat
//!   chatvisor-chat --backend-url http://127.0.0.1:9000 --search

use std::sync::Arc;

use clap::Parser;
use tokio::io::BufReader;

use chatvisor::client::{run_repl, BackendClient, ChatSession, SessionSettings};
use chatvisor::config::ClientSettings;
use chatvisor::protocol::DEFAULT_MODEL_ID;
use chatvisor::telemetry::{init_tracing, TelemetryOptions};

#[derive(Parser)]
#[command(name = "chatvisor-chat")]
#[command(version, about = "Chat with the agent from the terminal")]
struct Cli {
    /// Chat service URL (overrides BACKEND_API_URL)
    #[arg(long)]
    backend_url: Option<String>,

    /// Model to start with
    #[arg(short, long, default_value = DEFAULT_MODEL_ID)]
    model: String,

    /// Allow web search from the first turn
    #[arg(long)]
    search: bool,

    /// Replace the default system prompt
    #[arg(long)]
    system_prompt: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let cli = Cli::parse();
    init_tracing(
        "chatvisor-chat",
        TelemetryOptions::from_env().with_default_filter("warn"),
    )?;

    let backend_url = cli
        .backend_url
        .unwrap_or_else(|| ClientSettings::from_env().backend_url);
    let backend = BackendClient::new(backend_url)?;

    let mut settings = SessionSettings {
        model_id: cli.model,
        allow_search: cli.search,
        ..SessionSettings::default()
    };
    if let Some(prompt) = cli.system_prompt {
        settings.system_prompt = prompt;
    }

    let mut session = ChatSession::new(Arc::new(backend), settings);
    run_repl(
        &mut session,
        BufReader::new(tokio::io::stdin()),
        tokio::io::stdout(),
    )
    .await?;

    Ok(())
}
