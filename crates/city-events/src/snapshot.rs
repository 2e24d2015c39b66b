//! World Snapshots
//!
//! Point-in-time view of every agent and active conversation.

use serde::{Deserialize, Serialize};

use crate::dialogue::{ConversationKey, DialogueLine};
use crate::stamp::FrameStamp;

/// Agent state at snapshot time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentSnapshot {
    pub id: u32,
    pub name: String,
    pub x: f32,
    pub y: f32,
    /// Heading in radians
    pub heading: f32,
    pub interacting: bool,
}

/// Active conversation at snapshot time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationSnapshot {
    pub key: ConversationKey,
    pub midpoint: (f32, f32),
    pub line_count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_line: Option<DialogueLine>,
    pub ends_at_ms: u64,
}

/// Complete city state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CitySnapshot {
    pub stamp: FrameStamp,
    pub agents: Vec<AgentSnapshot>,
    pub conversations: Vec<ConversationSnapshot>,
}

impl CitySnapshot {
    pub fn agent(&self, id: u32) -> Option<&AgentSnapshot> {
        self.agents.iter().find(|a| a.id == id)
    }

    pub fn interacting_count(&self) -> usize {
        self.agents.iter().filter(|a| a.interacting).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn agent(id: u32, interacting: bool) -> AgentSnapshot {
        AgentSnapshot {
            id,
            name: format!("Agent {}", id),
            x: 4.0,
            y: 6.0,
            heading: 0.0,
            interacting,
        }
    }

    #[test]
    fn test_snapshot_lookup() {
        let snapshot = CitySnapshot {
            stamp: FrameStamp::new(1, 16),
            agents: vec![agent(0, false), agent(1, true), agent(2, true)],
            conversations: vec![],
        };
        assert_eq!(snapshot.interacting_count(), 2);
        assert_eq!(snapshot.agent(2).map(|a| a.name.as_str()), Some("Agent 2"));
        assert!(snapshot.agent(9).is_none());
    }
}
