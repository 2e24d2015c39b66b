//! Event Types
//!
//! Everything the simulation reports about conversations and reputation.
//! One JSON object per line in the event log.

use serde::{Deserialize, Serialize};

use crate::dialogue::{ConversationKey, DialogueLine};
use crate::stamp::FrameStamp;

/// Generate an event ID from a sequence number
pub fn generate_event_id(sequence: u64) -> String {
    format!("evt_{:08}", sequence)
}

/// Why a conversation ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndReason {
    /// The fixed conversation duration ran out
    Expired,
    /// Closed from outside the simulation (e.g. a UI card)
    Dismissed,
}

/// Event payloads
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    ConversationStarted {
        key: ConversationKey,
        agents: [u32; 2],
        midpoint: (f32, f32),
    },
    DialogueReady {
        key: ConversationKey,
        lines: Vec<DialogueLine>,
        /// True when the canned conversation replaced a failed fetch
        fallback: bool,
    },
    ConversationEnded {
        key: ConversationKey,
        reason: EndReason,
    },
    ReputationChanged {
        agent_id: u32,
        previous: u8,
        current: u8,
        score: u32,
    },
}

impl EventKind {
    /// Short label used in log lines
    pub fn label(&self) -> &'static str {
        match self {
            EventKind::ConversationStarted { .. } => "conversation_started",
            EventKind::DialogueReady { .. } => "dialogue_ready",
            EventKind::ConversationEnded { .. } => "conversation_ended",
            EventKind::ReputationChanged { .. } => "reputation_changed",
        }
    }

    /// The conversation this event belongs to, if any
    pub fn conversation(&self) -> Option<ConversationKey> {
        match self {
            EventKind::ConversationStarted { key, .. }
            | EventKind::DialogueReady { key, .. }
            | EventKind::ConversationEnded { key, .. } => Some(*key),
            EventKind::ReputationChanged { .. } => None,
        }
    }
}

/// A logged simulation event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimEvent {
    pub event_id: String,
    pub stamp: FrameStamp,
    #[serde(flatten)]
    pub kind: EventKind,
}

impl SimEvent {
    pub fn new(event_id: impl Into<String>, stamp: FrameStamp, kind: EventKind) -> Self {
        Self {
            event_id: event_id.into(),
            stamp,
            kind,
        }
    }
}
