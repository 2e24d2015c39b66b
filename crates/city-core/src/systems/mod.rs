//! ECS Systems
//!
//! Motion along roads, encounter detection, and the conversation lifecycle.

pub mod conversation;
pub mod interaction;
pub mod motion;

pub use conversation::{
    apply_dialogue_replies, expire_conversations, line_index, process_dismissals, Conversation,
    Conversations, DialogueInbox, DialogueReply, DismissQueue, RecentPartners,
};
pub use interaction::{detect_encounters, DialogueOutbox, DialogueRequest};
pub use motion::{advance_agents, step_agent, StepOutcome};
