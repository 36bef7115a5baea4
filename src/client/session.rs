//! One user's conversation with the Chat Service
//!
//! Only the new query is sent on each turn; the transcript is kept locally
//! for display and is never forwarded.

use std::fmt;
use std::sync::Arc;

use tracing::warn;

use crate::protocol::{ChatRequest, CLIENT_SYSTEM_PROMPT, DEFAULT_MODEL_ID};

use super::backend::{ChatBackend, ClientError};

/// Shown when the service cannot be reached at all
pub const CONNECTION_ERROR_MESSAGE: &str = "Error: Could not connect to the backend. Is it running?";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationTurn {
    pub role: Role,
    pub content: String,
}

impl ConversationTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Append-only list of turns, in submission order
#[derive(Debug, Clone, Default)]
pub struct Transcript {
    turns: Vec<ConversationTurn>,
}

impl Transcript {
    pub fn push(&mut self, turn: ConversationTurn) {
        self.turns.push(turn);
    }

    pub fn turns(&self) -> &[ConversationTurn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    fn clear(&mut self) {
        self.turns.clear();
    }
}

/// Per-turn request settings, read fresh on every submit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSettings {
    pub model_id: String,
    pub allow_search: bool,
    pub system_prompt: String,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            model_id: DEFAULT_MODEL_ID.to_string(),
            allow_search: false,
            system_prompt: CLIENT_SYSTEM_PROMPT.to_string(),
        }
    }
}

/// What a submitted turn produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    /// Answer, already appended to the transcript
    Answered(String),
    /// Local error text to render; not stored
    Failed(String),
}

pub struct ChatSession {
    backend: Arc<dyn ChatBackend>,
    settings: SessionSettings,
    transcript: Transcript,
}

impl ChatSession {
    pub fn new(backend: Arc<dyn ChatBackend>, settings: SessionSettings) -> Self {
        Self {
            backend,
            settings,
            transcript: Transcript::default(),
        }
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    /// Changes apply to the next turn; history is untouched
    pub fn settings_mut(&mut self) -> &mut SessionSettings {
        &mut self.settings
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    /// Submit one user turn and wait for the answer
    ///
    /// The user turn is recorded before the request goes out, so it stays in
    /// the transcript even if the request fails.
    pub async fn submit(&mut self, query: &str) -> TurnOutcome {
        self.transcript.push(ConversationTurn::user(query));

        let request = ChatRequest::new(query)
            .with_model(self.settings.model_id.clone())
            .with_search(self.settings.allow_search)
            .with_system_prompt(self.settings.system_prompt.clone());

        match self.backend.chat(&request).await {
            Ok(reply) => {
                self.transcript
                    .push(ConversationTurn::assistant(reply.response.clone()));
                TurnOutcome::Answered(reply.response)
            }
            Err(e) => {
                warn!(error = %e, "Chat turn failed");
                TurnOutcome::Failed(render_error(&e))
            }
        }
    }

    /// Clear the transcript, keeping settings
    pub fn reset(&mut self) {
        self.transcript.clear();
    }
}

fn render_error(error: &ClientError) -> String {
    if error.is_connection() {
        CONNECTION_ERROR_MESSAGE.to_string()
    } else {
        format!("Error: {}", error)
    }
}
