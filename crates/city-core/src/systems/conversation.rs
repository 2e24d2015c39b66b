//! Conversation Lifecycle
//!
//! A conversation locks two agents together for a fixed duration. Its lines
//! arrive asynchronously from the dialogue generator and are played back one
//! at a time on a fixed cadence. When the duration runs out, or the
//! conversation is dismissed, both agents are released with fresh headings.

use bevy_ecs::prelude::*;
use rand::Rng;
use std::collections::{BTreeMap, BTreeSet};

use city_events::{ConversationKey, DialogueLine, EndReason, EventKind};

use crate::components::agent::{AgentId, Heading, Interacting, TilePosition};
use crate::components::clock::SimClock;
use crate::components::map::CityMap;
use crate::events::PendingEvents;
use crate::SimRng;

/// Index of the line showing `elapsed_ms` into playback
pub fn line_index(elapsed_ms: u64, interval_ms: u64, line_count: usize) -> usize {
    if line_count == 0 || interval_ms == 0 {
        return 0;
    }
    ((elapsed_ms / interval_ms) % line_count as u64) as usize
}

/// A live pairing of two agents
#[derive(Debug, Clone, PartialEq)]
pub struct Conversation {
    pub key: ConversationKey,
    pub participants: [u32; 2],
    /// Names in participant order, for matching dialogue speakers
    pub names: [String; 2],
    pub lines: Vec<DialogueLine>,
    pub created_at_ms: u64,
    /// Set when the lines arrive; playback is timed from here
    pub started_at_ms: Option<u64>,
    pub ends_at_ms: u64,
    pub midpoint: TilePosition,
    pub used_fallback: bool,
}

impl Conversation {
    pub fn new(
        key: ConversationKey,
        names: [String; 2],
        created_at_ms: u64,
        duration_ms: u64,
        midpoint: TilePosition,
    ) -> Self {
        Self {
            key,
            participants: key.agents(),
            names,
            lines: Vec::new(),
            created_at_ms,
            started_at_ms: None,
            ends_at_ms: created_at_ms + duration_ms,
            midpoint,
            used_fallback: false,
        }
    }

    pub fn is_populated(&self) -> bool {
        self.started_at_ms.is_some() && !self.lines.is_empty()
    }

    pub fn populate(&mut self, lines: Vec<DialogueLine>, fallback: bool, now_ms: u64) {
        self.lines = lines;
        self.used_fallback = fallback;
        self.started_at_ms = Some(now_ms);
    }

    pub fn is_expired(&self, now_ms: u64) -> bool {
        now_ms >= self.ends_at_ms
    }

    /// The line on screen at `now_ms`, with its index
    pub fn current_line(&self, now_ms: u64, interval_ms: u64) -> Option<(usize, &DialogueLine)> {
        let started = self.started_at_ms?;
        if self.lines.is_empty() {
            return None;
        }
        let index = line_index(now_ms.saturating_sub(started), interval_ms, self.lines.len());
        self.lines.get(index).map(|line| (index, line))
    }

    /// Which participant says `line`; the first participant when no name matches
    pub fn speaker_of(&self, line: &DialogueLine) -> u32 {
        self.names
            .iter()
            .position(|name| name == &line.speaker)
            .map(|i| self.participants[i])
            .unwrap_or(self.participants[0])
    }
}

/// Resource: active conversations by pair
#[derive(Resource, Debug, Default)]
pub struct Conversations {
    active: BTreeMap<ConversationKey, Conversation>,
}

impl Conversations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, conversation: Conversation) {
        self.active.insert(conversation.key, conversation);
    }

    pub fn get(&self, key: &ConversationKey) -> Option<&Conversation> {
        self.active.get(key)
    }

    pub fn get_mut(&mut self, key: &ConversationKey) -> Option<&mut Conversation> {
        self.active.get_mut(key)
    }

    pub fn remove(&mut self, key: &ConversationKey) -> Option<Conversation> {
        self.active.remove(key)
    }

    pub fn contains(&self, key: &ConversationKey) -> bool {
        self.active.contains_key(key)
    }

    /// The conversation `agent` is part of, if any
    pub fn involving(&self, agent: u32) -> Option<&Conversation> {
        self.active.values().find(|c| c.key.contains(agent))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Conversation> {
        self.active.values()
    }

    pub fn len(&self) -> usize {
        self.active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }
}

/// Generated lines for a conversation
#[derive(Debug, Clone, PartialEq)]
pub struct DialogueReply {
    pub key: ConversationKey,
    /// Creation time of the conversation the lines were generated for
    pub created_at_ms: u64,
    pub lines: Vec<DialogueLine>,
    pub fallback: bool,
}

/// Resource: dialogue replies waiting to be applied this frame
#[derive(Resource, Debug, Default)]
pub struct DialogueInbox {
    replies: Vec<DialogueReply>,
}

impl DialogueInbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, reply: DialogueReply) {
        self.replies.push(reply);
    }

    pub fn drain(&mut self) -> Vec<DialogueReply> {
        std::mem::take(&mut self.replies)
    }

    pub fn is_empty(&self) -> bool {
        self.replies.is_empty()
    }
}

/// Resource: conversations closed from outside the simulation
#[derive(Resource, Debug, Default)]
pub struct DismissQueue {
    keys: Vec<ConversationKey>,
}

impl DismissQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, key: ConversationKey) {
        self.keys.push(key);
    }

    pub fn drain(&mut self) -> Vec<ConversationKey> {
        std::mem::take(&mut self.keys)
    }
}

/// Resource: pairs that just finished talking.
///
/// A pair stays here until the two agents have moved apart beyond the
/// interaction distance, so one encounter yields one conversation.
#[derive(Resource, Debug, Default)]
pub struct RecentPartners {
    pairs: BTreeSet<ConversationKey>,
}

impl RecentPartners {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: ConversationKey) {
        self.pairs.insert(key);
    }

    pub fn contains(&self, key: &ConversationKey) -> bool {
        self.pairs.contains(key)
    }

    pub fn retain(&mut self, keep: impl FnMut(&ConversationKey) -> bool) {
        self.pairs.retain(keep);
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

type ReleaseQuery<'w, 's> =
    Query<'w, 's, (&'static AgentId, &'static TilePosition, &'static mut Heading, &'static mut Interacting)>;

/// Unlock both participants and point each along its road
fn release_agents<R: Rng + ?Sized>(
    key: &ConversationKey,
    map: &CityMap,
    rng: &mut R,
    query: &mut ReleaseQuery,
) {
    for (id, position, mut heading, mut interacting) in query.iter_mut() {
        if key.contains(id.0) {
            interacting.0 = false;
            heading.0 = map.axis_at(position).sample_heading(rng);
        }
    }
}

/// System: attach generated lines to their conversations
pub fn apply_dialogue_replies(
    clock: Res<SimClock>,
    mut inbox: ResMut<DialogueInbox>,
    mut conversations: ResMut<Conversations>,
    mut events: ResMut<PendingEvents>,
) {
    for reply in inbox.drain() {
        let Some(conversation) = conversations.get_mut(&reply.key) else {
            tracing::debug!(key = %reply.key, "Dropping dialogue for a finished conversation");
            continue;
        };
        // the pair may have met again since the request went out
        if conversation.created_at_ms != reply.created_at_ms || conversation.is_populated() {
            tracing::debug!(
                key = %reply.key,
                requested_at = reply.created_at_ms,
                created_at = conversation.created_at_ms,
                "Dropping dialogue for an earlier conversation"
            );
            continue;
        }
        conversation.populate(reply.lines.clone(), reply.fallback, clock.now_ms());
        tracing::debug!(
            key = %reply.key,
            lines = reply.lines.len(),
            fallback = reply.fallback,
            "Dialogue ready"
        );
        events.record(
            clock.stamp(),
            EventKind::DialogueReady {
                key: reply.key,
                lines: reply.lines,
                fallback: reply.fallback,
            },
        );
    }
}

/// System: end conversations whose duration has run out
pub fn expire_conversations(
    clock: Res<SimClock>,
    map: Res<CityMap>,
    mut rng: ResMut<SimRng>,
    mut conversations: ResMut<Conversations>,
    mut recent: ResMut<RecentPartners>,
    mut events: ResMut<PendingEvents>,
    mut query: ReleaseQuery,
) {
    let now = clock.now_ms();
    let expired: Vec<ConversationKey> = conversations
        .iter()
        .filter(|c| c.is_expired(now))
        .map(|c| c.key)
        .collect();

    for key in expired {
        conversations.remove(&key);
        release_agents(&key, &map, &mut rng.0, &mut query);
        recent.insert(key);
        tracing::debug!(key = %key, "Conversation expired");
        events.record(
            clock.stamp(),
            EventKind::ConversationEnded {
                key,
                reason: EndReason::Expired,
            },
        );
    }
}

/// System: end conversations that were dismissed; both agents are released
pub fn process_dismissals(
    clock: Res<SimClock>,
    map: Res<CityMap>,
    mut rng: ResMut<SimRng>,
    mut queue: ResMut<DismissQueue>,
    mut conversations: ResMut<Conversations>,
    mut recent: ResMut<RecentPartners>,
    mut events: ResMut<PendingEvents>,
    mut query: ReleaseQuery,
) {
    for key in queue.drain() {
        if conversations.remove(&key).is_none() {
            continue;
        }
        release_agents(&key, &map, &mut rng.0, &mut query);
        recent.insert(key);
        tracing::debug!(key = %key, "Conversation dismissed");
        events.record(
            clock.stamp(),
            EventKind::ConversationEnded {
                key,
                reason: EndReason::Dismissed,
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(a: u32, b: u32) -> ConversationKey {
        ConversationKey::new(a, b).unwrap()
    }

    fn lines(count: usize) -> Vec<DialogueLine> {
        (0..count)
            .map(|i| {
                let speaker = if i % 2 == 0 { "Nova" } else { "Orion" };
                DialogueLine::new(speaker, format!("line {}", i), "")
            })
            .collect()
    }

    fn conversation() -> Conversation {
        Conversation::new(
            key(1, 2),
            ["Nova".into(), "Orion".into()],
            1_000,
            30_000,
            TilePosition::new(8.0, 6.1),
        )
    }

    #[test]
    fn test_line_index_formula() {
        assert_eq!(line_index(9_500, 3_000, 10), 3);
        assert_eq!(line_index(0, 3_000, 10), 0);
        assert_eq!(line_index(2_999, 3_000, 10), 0);
        assert_eq!(line_index(30_000, 3_000, 10), 0);
        assert_eq!(line_index(33_000, 3_000, 10), 1);
        assert_eq!(line_index(5_000, 3_000, 0), 0);
    }

    #[test]
    fn test_unpopulated_has_no_line() {
        let c = conversation();
        assert!(!c.is_populated());
        assert!(c.current_line(5_000, 3_000).is_none());
    }

    #[test]
    fn test_playback_times_from_population() {
        let mut c = conversation();
        c.populate(lines(10), false, 2_000);
        let (index, line) = c.current_line(2_000 + 9_500, 3_000).unwrap();
        assert_eq!(index, 3);
        assert_eq!(line.message, "line 3");
        assert_eq!(c.speaker_of(line), 2);
    }

    #[test]
    fn test_unknown_speaker_defaults_to_first() {
        let c = conversation();
        let line = DialogueLine::new("Stranger", "hello", "");
        assert_eq!(c.speaker_of(&line), 1);
    }

    #[test]
    fn test_expiry_is_measured_from_creation() {
        let c = conversation();
        assert_eq!(c.ends_at_ms, 31_000);
        assert!(!c.is_expired(30_999));
        assert!(c.is_expired(31_000));
    }

    #[test]
    fn test_conversations_lookup_by_agent() {
        let mut conversations = Conversations::new();
        conversations.insert(conversation());
        assert!(conversations.involving(2).is_some());
        assert!(conversations.involving(3).is_none());
        assert!(conversations.contains(&key(2, 1)));
    }
}
