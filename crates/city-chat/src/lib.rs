//! Hosted-LLM collaborator for ARCA City.
//!
//! Everything that talks to the language model lives here:
//!
//! - [`llm`]: OpenAI-compatible chat completion client with retries
//! - [`dialogue`]: agent-to-agent conversation generation, with a canned
//!   fallback when the model is unavailable
//! - [`action`]: the actions a chat reply can trigger, as a closed enum
//! - [`session`]: per-address chat history with idle and capacity eviction
//! - [`chat`]: the user-to-agent chat service tying the above together

pub mod action;
pub mod chat;
pub mod dialogue;
pub mod error;
pub mod llm;
pub mod prompt;
pub mod session;

pub use action::{execute, parse_reply, ActionOutcome, AgentAction, ChatReply};
pub use chat::{ChatResponse, ChatService};
pub use dialogue::{
    canned_dialogue, CannedDialogue, DialogueGenerator, DialogueOutcome, LlmDialogue,
    WithFallback, DIALOGUE_LINES,
};
pub use error::ChatError;
pub use llm::{ChatMessage, LlmClient, LlmConfig, LlmProvider, LlmRequest, LlmResponse, Role};
pub use session::{ChatSession, SessionConfig, SessionStore};
