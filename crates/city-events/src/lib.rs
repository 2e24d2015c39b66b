//! Shared event types and serialization for the ARCA City simulation.
//!
//! This crate contains pure data structures with no simulation logic.
//! It is a dependency for all other crates in the workspace.

pub mod dialogue;
pub mod event;
pub mod snapshot;
pub mod stamp;

pub use dialogue::{AgentDescriptor, ConversationKey, DialogueLine};

pub use event::{generate_event_id, EndReason, EventKind, SimEvent};

pub use snapshot::{AgentSnapshot, CitySnapshot, ConversationSnapshot};

pub use stamp::FrameStamp;
