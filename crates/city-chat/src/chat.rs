//! Agent Chat
//!
//! A user talks to one of their agents; the model answers in character and
//! may trigger a wallet action, which runs immediately.

use std::time::Instant;

use serde::{Deserialize, Serialize};

use city_registry::Wallet;

use crate::action::{execute, parse_reply, ActionOutcome, AgentAction};
use crate::error::ChatError;
use crate::llm::{ChatMessage, LlmClient, LlmRequest};
use crate::prompt;
use crate::session::{SessionConfig, SessionStore};

/// Reply returned to the user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatResponse {
    pub message: String,
    pub action: AgentAction,
    pub outcome: ActionOutcome,
}

pub struct ChatService {
    client: LlmClient,
    sessions: SessionStore,
}

impl ChatService {
    pub fn new(client: LlmClient, config: SessionConfig) -> Self {
        Self {
            client,
            sessions: SessionStore::new(config),
        }
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    pub fn sessions_mut(&mut self) -> &mut SessionStore {
        &mut self.sessions
    }

    /// Record the user's message and build the model request for it
    pub fn prepare<W: Wallet + ?Sized>(
        &mut self,
        agent_name: &str,
        wallet: &W,
        text: &str,
        now: Instant,
    ) -> LlmRequest {
        let session = self.sessions.get_or_create(wallet.address(), now);
        session.push(ChatMessage::user(text));
        let system = prompt::chat_system(agent_name, wallet.address(), wallet.balance());
        self.client
            .tune(LlmRequest::with_history(system, session.history()))
            .json()
    }

    /// Interpret the model's raw reply, run its action and record the turn
    pub fn apply_reply<W: Wallet + ?Sized>(
        &mut self,
        wallet: &W,
        raw: &str,
        now: Instant,
    ) -> Result<ChatResponse, ChatError> {
        let reply = parse_reply(raw)?;
        let outcome = execute(&reply.action, wallet);

        let session = self.sessions.get_or_create(wallet.address(), now);
        session.push(ChatMessage::assistant(reply.message.clone()));

        Ok(ChatResponse {
            message: reply.message,
            action: reply.action,
            outcome,
        })
    }

    /// Full round trip: prepare, ask the model, apply
    pub async fn handle_message<W: Wallet + ?Sized>(
        &mut self,
        agent_name: &str,
        wallet: &W,
        text: &str,
    ) -> Result<ChatResponse, ChatError> {
        let request = self.prepare(agent_name, wallet, text, Instant::now());
        let response = self.client.generate(&request).await?;
        self.apply_reply(wallet, &response.text, Instant::now())
    }
}
