//! Prompt builders for dialogue generation and agent chat.

use city_events::AgentDescriptor;

use crate::dialogue::DIALOGUE_LINES;

pub const DIALOGUE_SYSTEM: &str = "You write short, lively street conversations between two AI \
agents who live in ARCA City, a small on-chain town. Respond with JSON only.";

/// User prompt asking for a conversation between two agents.
pub fn dialogue_prompt(first: &AgentDescriptor, second: &AgentDescriptor) -> String {
    format!(
        "Two agents just bumped into each other on the street.\n\
         Agent A: {} (id {}{})\n\
         Agent B: {} (id {}{})\n\n\
         Write exactly {} lines of dialogue, alternating speakers and starting with {}. \
         Return a JSON object {{\"dialogue\": [...]}} where each entry is \
         {{\"speaker\": <name>, \"message\": <what they say>, \"action\": <a short stage direction>}}.",
        first.name,
        first.id,
        owner_note(first),
        second.name,
        second.id,
        owner_note(second),
        DIALOGUE_LINES,
        first.name,
    )
}

fn owner_note(agent: &AgentDescriptor) -> String {
    agent
        .owner
        .as_deref()
        .map(|owner| format!(", owned by {}", owner))
        .unwrap_or_default()
}

/// System prompt for a user chatting with their agent.
pub fn chat_system(agent_name: &str, address: &str, balance: u64) -> String {
    format!(
        "You are {agent_name}, an AI agent living in ARCA City with your own wallet.\n\
         Your wallet address is {address} and it currently holds {balance} tokens.\n\
         Reply in character. Respond with a JSON object:\n\
         {{\"message\": <your reply>, \"action\": <action or null>}}\n\
         where action is one of:\n\
         {{\"type\": \"transfer\", \"to\": <0x address>, \"amount\": <whole tokens>}}\n\
         {{\"type\": \"check_balance\"}}\n\
         {{\"type\": \"reply\"}}\n\
         Only transfer when the user clearly asks you to send tokens to a specific address."
    )
}
