//! Dialogue Types
//!
//! What the simulation hands to the dialogue collaborator and what it gets back.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifying metadata for an agent, passed to the dialogue generator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentDescriptor {
    pub id: u32,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
}

impl AgentDescriptor {
    pub fn new(id: u32, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            owner: None,
        }
    }

    pub fn with_owner(mut self, owner: impl Into<String>) -> Self {
        self.owner = Some(owner.into());
        self
    }
}

/// One line of a scripted conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DialogueLine {
    /// Name of the speaking agent
    pub speaker: String,
    pub message: String,
    /// Stage direction, e.g. "waves", "laughs"
    #[serde(default)]
    pub action: String,
}

impl DialogueLine {
    pub fn new(
        speaker: impl Into<String>,
        message: impl Into<String>,
        action: impl Into<String>,
    ) -> Self {
        Self {
            speaker: speaker.into(),
            message: message.into(),
            action: action.into(),
        }
    }
}

/// Unordered pair of agent ids identifying a conversation.
///
/// Always stored low id first, so `(3, 7)` and `(7, 3)` are the same key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConversationKey {
    low: u32,
    high: u32,
}

impl ConversationKey {
    /// Builds a key from two agent ids. Returns `None` when both ids are the
    /// same agent.
    pub fn new(a: u32, b: u32) -> Option<Self> {
        match a.cmp(&b) {
            std::cmp::Ordering::Less => Some(Self { low: a, high: b }),
            std::cmp::Ordering::Greater => Some(Self { low: b, high: a }),
            std::cmp::Ordering::Equal => None,
        }
    }

    pub fn agents(&self) -> [u32; 2] {
        [self.low, self.high]
    }

    pub fn contains(&self, agent: u32) -> bool {
        self.low == agent || self.high == agent
    }

    /// The other member of the pair, if `agent` is a member.
    pub fn partner_of(&self, agent: u32) -> Option<u32> {
        if agent == self.low {
            Some(self.high)
        } else if agent == self.high {
            Some(self.low)
        } else {
            None
        }
    }
}

impl fmt::Display for ConversationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.low, self.high)
    }
}
