//! Encounter Detection
//!
//! Pairs up free agents that come within talking distance of each other.
//! Pairs are visited in ascending id order and each agent joins at most one
//! new conversation per frame.

use bevy_ecs::prelude::*;
use std::collections::BTreeSet;

use city_events::{AgentDescriptor, ConversationKey, EventKind};

use crate::components::agent::{describe, AgentId, AgentName, AgentOwner, Interacting, TilePosition};
use crate::components::clock::SimClock;
use crate::config::ConversationConfig;
use crate::events::PendingEvents;
use crate::systems::conversation::{Conversation, Conversations, RecentPartners};

/// Dialogue to be generated for a new conversation
#[derive(Debug, Clone, PartialEq)]
pub struct DialogueRequest {
    pub key: ConversationKey,
    pub created_at_ms: u64,
    pub first: AgentDescriptor,
    pub second: AgentDescriptor,
}

/// Resource: requests the runner hands to the dialogue generator
#[derive(Resource, Debug, Default)]
pub struct DialogueOutbox {
    requests: Vec<DialogueRequest>,
}

impl DialogueOutbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, request: DialogueRequest) {
        self.requests.push(request);
    }

    pub fn drain(&mut self) -> Vec<DialogueRequest> {
        std::mem::take(&mut self.requests)
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }
}

struct Candidate {
    descriptor: AgentDescriptor,
    position: TilePosition,
    interacting: bool,
}

/// Pairs that should start talking, in ascending id order.
///
/// `candidates` must be sorted by id. Agents already interacting, or paired
/// earlier in the same pass, are skipped.
fn find_encounters(
    candidates: &[Candidate],
    distance: f32,
    recent: &RecentPartners,
) -> Vec<(usize, usize)> {
    let mut claimed: BTreeSet<usize> = BTreeSet::new();
    let mut pairs = Vec::new();

    for i in 0..candidates.len() {
        if candidates[i].interacting || claimed.contains(&i) {
            continue;
        }
        for j in (i + 1)..candidates.len() {
            if candidates[j].interacting || claimed.contains(&j) {
                continue;
            }
            let Some(key) =
                ConversationKey::new(candidates[i].descriptor.id, candidates[j].descriptor.id)
            else {
                continue;
            };
            if recent.contains(&key) {
                continue;
            }
            if candidates[i].position.distance_to(&candidates[j].position) < distance {
                claimed.insert(i);
                claimed.insert(j);
                pairs.push((i, j));
                break;
            }
        }
    }
    pairs
}

/// System: start conversations between agents that have met
pub fn detect_encounters(
    clock: Res<SimClock>,
    settings: Res<ConversationConfig>,
    mut conversations: ResMut<Conversations>,
    mut outbox: ResMut<DialogueOutbox>,
    mut recent: ResMut<RecentPartners>,
    mut events: ResMut<PendingEvents>,
    mut query: Query<(&AgentId, &AgentName, &AgentOwner, &TilePosition, &mut Interacting)>,
) {
    let mut candidates: Vec<Candidate> = query
        .iter()
        .map(|(id, name, owner, position, interacting)| Candidate {
            descriptor: describe(id, name, owner),
            position: *position,
            interacting: interacting.0,
        })
        .collect();
    candidates.sort_by_key(|c| c.descriptor.id);

    // Pairs that have drifted apart may meet again
    recent.retain(|key| {
        let [low, high] = key.agents();
        let position = |id: u32| {
            candidates
                .iter()
                .find(|c| c.descriptor.id == id)
                .map(|c| c.position)
        };
        match (position(low), position(high)) {
            (Some(a), Some(b)) => a.distance_to(&b) < settings.interaction_distance,
            _ => false,
        }
    });

    let pairs = find_encounters(&candidates, settings.interaction_distance, &recent);
    if pairs.is_empty() {
        return;
    }

    let now = clock.now_ms();
    let mut started: BTreeSet<u32> = BTreeSet::new();
    for (i, j) in pairs {
        let (first, second) = (&candidates[i], &candidates[j]);
        let Some(key) = ConversationKey::new(first.descriptor.id, second.descriptor.id) else {
            continue;
        };
        let midpoint = first.position.midpoint(&second.position);

        conversations.insert(Conversation::new(
            key,
            [first.descriptor.name.clone(), second.descriptor.name.clone()],
            now,
            settings.duration_ms,
            midpoint,
        ));
        outbox.push(DialogueRequest {
            key,
            created_at_ms: now,
            first: first.descriptor.clone(),
            second: second.descriptor.clone(),
        });
        events.record(
            clock.stamp(),
            EventKind::ConversationStarted {
                key,
                agents: key.agents(),
                midpoint: (midpoint.x, midpoint.y),
            },
        );
        tracing::debug!(
            key = %key,
            first = %first.descriptor.name,
            second = %second.descriptor.name,
            "Conversation started"
        );
        started.insert(first.descriptor.id);
        started.insert(second.descriptor.id);
    }

    for (id, _, _, _, mut interacting) in query.iter_mut() {
        if started.contains(&id.0) {
            interacting.0 = true;
        }
    }
}
