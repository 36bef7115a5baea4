//! chatvisor: launches the chat service and the chat client together
//!
//! The service starts first and gets a short head start; the client then
//! takes over the terminal. If either exits, the other is stopped. Ctrl+C
//! stops both.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Parser;

use chatvisor::config::{backend_url_for, resolve_bind};
use chatvisor::shutdown::shutdown_signal;
use chatvisor::supervisor::{OutputMode, Outcome, ServiceSpec, Supervisor, SupervisorConfig};
use chatvisor::telemetry::{init_tracing, shutdown_tracing, TelemetryOptions};

#[derive(Parser)]
#[command(name = "chatvisor")]
#[command(version, about = "Run the chat service and the chat client together")]
struct Cli {
    /// Chat service binary (defaults to chatvisor-server next to this one)
    #[arg(long, env = "CHATVISOR_SERVER_BIN")]
    server_bin: Option<PathBuf>,

    /// Chat client binary (defaults to chatvisor-chat next to this one)
    #[arg(long, env = "CHATVISOR_CHAT_BIN")]
    chat_bin: Option<PathBuf>,

    /// Address for the chat service; the client is pointed at it
    #[arg(long)]
    bind: Option<SocketAddr>,

    /// Append the chat service's output to this file instead of the terminal
    #[arg(long)]
    server_log: Option<PathBuf>,

    /// Seconds the service gets before the client starts
    #[arg(long, default_value_t = 2)]
    grace_secs: u64,

    /// Seconds each service gets to exit after SIGTERM
    #[arg(long, default_value_t = 10)]
    shutdown_timeout_secs: u64,
}

/// Look for `name` in the directory of the running executable
fn sibling_binary(name: &str) -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
        .map(|dir| dir.join(name))
        .unwrap_or_else(|| PathBuf::from(name))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let cli = Cli::parse();
    init_tracing(
        "chatvisor",
        TelemetryOptions::from_env().with_default_filter("info"),
    )?;

    let mut server = ServiceSpec::new(
        "chat-service",
        cli.server_bin
            .unwrap_or_else(|| sibling_binary("chatvisor-server")),
    );
    let mut client = ServiceSpec::new(
        "chat-client",
        cli.chat_bin.unwrap_or_else(|| sibling_binary("chatvisor-chat")),
    )
    .interactive(true);

    // Without --bind the service resolves CHATVISOR_BIND itself; resolve it
    // the same way here so the client is pointed at the right port
    let bind = match cli.bind {
        Some(bind) => {
            server = server.arg("--bind").arg(bind.to_string());
            bind
        }
        None => resolve_bind(|key| std::env::var(key).ok())?,
    };
    client = client.env("BACKEND_API_URL", backend_url_for(bind));
    if let Some(path) = cli.server_log {
        server = server.output(OutputMode::File(path));
    }

    println!("Starting chatvisor...");
    println!("{}", "=".repeat(50));
    println!("Chat service: {}", bind);
    println!("Press Ctrl+C to stop both services");
    println!("{}", "=".repeat(50));

    let config = SupervisorConfig {
        grace_period: Duration::from_secs(cli.grace_secs),
        shutdown_timeout: Duration::from_secs(cli.shutdown_timeout_secs),
        ..SupervisorConfig::default()
    };
    let mut supervisor = Supervisor::new(config, server, client);
    let report = supervisor.run(shutdown_signal()).await?;

    match &report.outcome {
        Outcome::Stopped => println!("All services stopped."),
        Outcome::Failed { service, status } => {
            eprintln!("{} stopped unexpectedly ({})", service, status)
        }
    }
    for service in report.services.iter().filter(|s| s.forced) {
        eprintln!("{} (pid {}) had to be killed", service.name, service.pid);
    }

    shutdown_tracing();
    std::process::exit(report.exit_code());
}
