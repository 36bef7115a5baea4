//! chatvisor-server: the HTTP chat service
//!
//! Usage:
//!   GROQ_API_KEY=... chatvisor-server
//!   GROQ_API_KEY=... TAVILY_API_KEY=... chatvisor-server --bind 127.0.0.1:9000

use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;

use chatvisor::config::{ConfigError, ServerSettings};
use chatvisor::server::{build_agent, router, serve, AppState};
use chatvisor::shutdown::shutdown_signal;
use chatvisor::telemetry::{init_tracing, shutdown_tracing, TelemetryOptions};

#[derive(Parser)]
#[command(name = "chatvisor-server")]
#[command(version, about = "HTTP chat service backed by an LLM agent")]
struct Cli {
    /// Listen address (overrides CHATVISOR_BIND)
    #[arg(long)]
    bind: Option<SocketAddr>,

    /// Maximum model calls per request (overrides CHATVISOR_MAX_STEPS)
    #[arg(long)]
    max_steps: Option<usize>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let cli = Cli::parse();
    init_tracing("chatvisor-server", TelemetryOptions::from_env())?;

    let mut settings = ServerSettings::from_env()?;
    if let Some(bind) = cli.bind {
        settings.bind = bind;
    }
    if let Some(max_steps) = cli.max_steps {
        if max_steps == 0 {
            return Err(ConfigError::Invalid {
                var: "--max-steps",
                value: "0".to_string(),
                reason: "must be at least 1".to_string(),
            }
            .into());
        }
        settings.agent.max_steps = max_steps;
    }
    tracing::debug!(?settings, "Loaded settings");

    let agent = build_agent(&settings.providers, settings.agent.clone())?;
    let app = router(AppState::new(Arc::new(agent)));

    let listener = TcpListener::bind(settings.bind).await?;
    serve(listener, app, shutdown_signal()).await?;

    shutdown_tracing();
    Ok(())
}
