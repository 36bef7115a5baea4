//! Chat Client: session state, the HTTP backend it talks to, and the REPL

pub mod backend;
pub mod repl;
pub mod session;

pub use backend::{BackendClient, ChatBackend, ClientError};
pub use repl::{run_repl, Command};
pub use session::{
    ChatSession, ConversationTurn, Role, SessionSettings, Transcript, TurnOutcome,
    CONNECTION_ERROR_MESSAGE,
};
