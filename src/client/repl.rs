//! Interactive terminal front end for a [`ChatSession`]
//!
//! Plain lines are sent as queries; lines starting with `/` are commands.

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

use crate::protocol::KNOWN_MODELS;

use super::session::{ChatSession, Role, TurnOutcome};

const HELP_TEXT: &str = "\
Commands:
  /model <id>        switch the language model
  /models            list known models
  /search on|off     allow or forbid web search
  /system <prompt>   replace the system prompt
  /history           show the conversation so far
  /reset             clear the conversation
  /help              show this help
  /quit              leave";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Query(String),
    Model(String),
    Models,
    Search(bool),
    System(String),
    History,
    Reset,
    Help,
    Quit,
    Empty,
    Invalid(String),
}

impl Command {
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        if line.is_empty() {
            return Command::Empty;
        }
        if !line.starts_with('/') {
            return Command::Query(line.to_string());
        }

        let (name, rest) = match line.split_once(char::is_whitespace) {
            Some((name, rest)) => (name, rest.trim()),
            None => (line, ""),
        };

        match (name, rest) {
            ("/model", "") => Command::Invalid("usage: /model <id>".to_string()),
            ("/model", id) => Command::Model(id.to_string()),
            ("/models", _) => Command::Models,
            ("/search", "on") => Command::Search(true),
            ("/search", "off") => Command::Search(false),
            ("/search", _) => Command::Invalid("usage: /search on|off".to_string()),
            ("/system", "") => Command::Invalid("usage: /system <prompt>".to_string()),
            ("/system", prompt) => Command::System(prompt.to_string()),
            ("/history", _) => Command::History,
            ("/reset", _) => Command::Reset,
            ("/help", _) => Command::Help,
            ("/quit", _) | ("/exit", _) => Command::Quit,
            (other, _) => Command::Invalid(format!("unknown command {}, try /help", other)),
        }
    }
}

/// Run the read-eval-print loop until `/quit` or end of input
pub async fn run_repl<R, W>(
    session: &mut ChatSession,
    input: R,
    mut output: W,
) -> std::io::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = input.lines();

    output
        .write_all(b"AI Chat Agent. Type /help for commands.\n")
        .await?;

    loop {
        output.write_all(b"> ").await?;
        output.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };

        let reply = match Command::parse(&line) {
            Command::Empty => continue,
            Command::Quit => break,
            Command::Query(query) => {
                output.write_all(b"Thinking...\n").await?;
                output.flush().await?;
                match session.submit(&query).await {
                    TurnOutcome::Answered(answer) => answer,
                    TurnOutcome::Failed(error) => error,
                }
            }
            Command::Model(id) => {
                let note = if KNOWN_MODELS.contains(&id.as_str()) {
                    String::new()
                } else {
                    " (not a known model; the provider will validate it)".to_string()
                };
                let reply = format!("Model set to {}{}", id, note);
                session.settings_mut().model_id = id;
                reply
            }
            Command::Models => KNOWN_MODELS
                .iter()
                .map(|model| {
                    let marker = if *model == session.settings().model_id { "*" } else { " " };
                    format!("{} {}", marker, model)
                })
                .collect::<Vec<_>>()
                .join("\n"),
            Command::Search(enabled) => {
                session.settings_mut().allow_search = enabled;
                format!("Web search {}", if enabled { "enabled" } else { "disabled" })
            }
            Command::System(prompt) => {
                session.settings_mut().system_prompt = prompt;
                "System prompt updated".to_string()
            }
            Command::History => {
                let turns = session.transcript().turns();
                if turns.is_empty() {
                    "(no messages yet)".to_string()
                } else {
                    turns
                        .iter()
                        .map(|turn| match turn.role {
                            Role::User => format!("You: {}", turn.content),
                            Role::Assistant => format!("AI: {}", turn.content),
                        })
                        .collect::<Vec<_>>()
                        .join("\n")
                }
            }
            Command::Reset => {
                session.reset();
                "Conversation cleared".to_string()
            }
            Command::Help => HELP_TEXT.to_string(),
            Command::Invalid(message) => message,
        };

        output.write_all(reply.as_bytes()).await?;
        output.write_all(b"\n").await?;
    }

    output.flush().await?;
    Ok(())
}
