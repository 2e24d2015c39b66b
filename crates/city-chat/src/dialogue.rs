//! Dialogue Generation
//!
//! When two agents meet, the simulation asks a [`DialogueGenerator`] for a
//! short scripted conversation. Generation runs off the frame loop; the
//! result comes back as a fixed number of `{speaker, message, action}` lines.
//!
//! Failure policy: [`WithFallback`] substitutes [`canned_dialogue`] for any
//! failed fetch, so every conversation gets lines to play back.

use std::future::Future;

use serde::Deserialize;

use city_events::{AgentDescriptor, DialogueLine};

use crate::error::ChatError;
use crate::llm::{strip_code_fence, LlmClient, LlmRequest};
use crate::prompt;

/// Number of lines in every generated conversation
pub const DIALOGUE_LINES: usize = 10;

/// Produces a conversation between two agents.
pub trait DialogueGenerator: Send + Sync + 'static {
    fn generate(
        &self,
        first: &AgentDescriptor,
        second: &AgentDescriptor,
    ) -> impl Future<Output = Result<Vec<DialogueLine>, ChatError>> + Send;
}

/// Fixed ten-line conversation used when generation fails
pub fn canned_dialogue(first: &AgentDescriptor, second: &AgentDescriptor) -> Vec<DialogueLine> {
    let a = first.name.as_str();
    let b = second.name.as_str();
    vec![
        DialogueLine::new(a, format!("Hey {}! Fancy meeting you here.", b), "waves"),
        DialogueLine::new(b, format!("{}! Busy day on the roads?", a), "smiles"),
        DialogueLine::new(a, "Always. The tax collector came by again.", "sighs"),
        DialogueLine::new(b, "Mine too. At least the arcade is open.", "laughs"),
        DialogueLine::new(a, "I set a new high score yesterday.", "grins"),
        DialogueLine::new(b, "So that's why your reputation went up.", "nods"),
        DialogueLine::new(a, "Care to play a round later?", "points down the road"),
        DialogueLine::new(b, "Only if you don't mind losing.", "smirks"),
        DialogueLine::new(a, "We'll see about that. Take care!", "waves goodbye"),
        DialogueLine::new(b, "You too. See you around the city.", "walks off"),
    ]
}

/// Always returns the canned conversation
#[derive(Debug, Clone, Copy, Default)]
pub struct CannedDialogue;

impl DialogueGenerator for CannedDialogue {
    async fn generate(
        &self,
        first: &AgentDescriptor,
        second: &AgentDescriptor,
    ) -> Result<Vec<DialogueLine>, ChatError> {
        Ok(canned_dialogue(first, second))
    }
}

/// Generates conversations with the hosted LLM
#[derive(Debug, Clone)]
pub struct LlmDialogue {
    client: LlmClient,
}

impl LlmDialogue {
    pub fn new(client: LlmClient) -> Self {
        Self { client }
    }
}

impl DialogueGenerator for LlmDialogue {
    async fn generate(
        &self,
        first: &AgentDescriptor,
        second: &AgentDescriptor,
    ) -> Result<Vec<DialogueLine>, ChatError> {
        let request = self
            .client
            .tune(LlmRequest::new(
                prompt::DIALOGUE_SYSTEM,
                prompt::dialogue_prompt(first, second),
            ))
            .json();
        let response = self.client.generate(&request).await?;
        tracing::debug!(
            first = %first.name,
            second = %second.name,
            latency_ms = response.latency_ms,
            "Dialogue generated"
        );
        parse_dialogue(&response.text)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum DialoguePayload {
    Wrapped {
        #[serde(alias = "messages")]
        dialogue: Vec<DialogueLine>,
    },
    Bare(Vec<DialogueLine>),
}

/// Parse model output into exactly [`DIALOGUE_LINES`] lines.
///
/// Accepts `{"dialogue": [...]}`, `{"messages": [...]}` or a bare array,
/// optionally wrapped in a markdown code fence.
pub fn parse_dialogue(text: &str) -> Result<Vec<DialogueLine>, ChatError> {
    let payload: DialoguePayload = serde_json::from_str(strip_code_fence(text))
        .map_err(|e| ChatError::Parse(format!("{} — raw text: '{}'", e, text)))?;
    let lines = match payload {
        DialoguePayload::Wrapped { dialogue } => dialogue,
        DialoguePayload::Bare(lines) => lines,
    };

    if lines.len() != DIALOGUE_LINES {
        return Err(ChatError::Schema(format!(
            "expected {} dialogue lines, got {}",
            DIALOGUE_LINES,
            lines.len()
        )));
    }
    if let Some(pos) = lines
        .iter()
        .position(|l| l.speaker.trim().is_empty() || l.message.trim().is_empty())
    {
        return Err(ChatError::Schema(format!("dialogue line {} is empty", pos)));
    }
    Ok(lines)
}

/// Lines plus whether they came from the fallback
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DialogueOutcome {
    pub lines: Vec<DialogueLine>,
    pub fallback: bool,
}

/// Wraps a generator so failures turn into the canned conversation
#[derive(Debug, Clone)]
pub struct WithFallback<G> {
    inner: G,
}

impl<G: DialogueGenerator> WithFallback<G> {
    pub fn new(inner: G) -> Self {
        Self { inner }
    }

    pub async fn generate(
        &self,
        first: &AgentDescriptor,
        second: &AgentDescriptor,
    ) -> DialogueOutcome {
        match self.inner.generate(first, second).await {
            Ok(lines) => DialogueOutcome {
                lines,
                fallback: false,
            },
            Err(e) => {
                tracing::warn!(
                    first = %first.name,
                    second = %second.name,
                    error = %e,
                    "Dialogue generation failed, using canned conversation"
                );
                DialogueOutcome {
                    lines: canned_dialogue(first, second),
                    fallback: true,
                }
            }
        }
    }
}
