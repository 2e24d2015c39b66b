//! Frame-level behaviour of the city: roads, encounters and teardown.

use std::collections::BTreeMap;

use bevy_ecs::prelude::*;
use proptest::prelude::*;

use city_core::systems::{Conversations, DialogueOutbox};
use city_core::{
    build_schedule, capture_snapshot, create_world, spawn_agent_at, spawn_agents, CityConfig,
    CityMap, EventLogger, SimClock, TilePosition,
};
use city_events::{CitySnapshot, ConversationKey};

fn city(seed: u64, agents: usize) -> (World, Schedule) {
    let mut config = CityConfig::default();
    config.simulation.seed = seed;
    config.spawn.agent_count = agents;
    let mut world = create_world(&config, EventLogger::null());
    spawn_agents(&mut world, &config.spawn);
    (world, build_schedule())
}

fn scripted(agents: &[(u32, &str, f32, f32, f32)]) -> (World, Schedule) {
    let mut world = create_world(&CityConfig::default(), EventLogger::memory());
    for (id, name, x, y, heading) in agents {
        spawn_agent_at(&mut world, *id, *name, TilePosition::new(*x, *y), *heading);
    }
    (world, build_schedule())
}

/// Each agent appears in at most one conversation, and is interacting
/// exactly when it appears in one.
fn assert_pairing_consistent(snapshot: &CitySnapshot) {
    let mut membership: BTreeMap<u32, usize> = BTreeMap::new();
    for conversation in &snapshot.conversations {
        for id in conversation.key.agents() {
            *membership.entry(id).or_default() += 1;
        }
    }
    for agent in &snapshot.agents {
        let count = membership.get(&agent.id).copied().unwrap_or(0);
        assert!(count <= 1, "agent {} in {} conversations", agent.id, count);
        assert_eq!(
            agent.interacting,
            count == 1,
            "agent {} interacting flag out of sync",
            agent.id
        );
    }
}

#[test]
fn test_close_pair_starts_conversation() {
    let (mut world, mut schedule) =
        scripted(&[(0, "Nova", 8.0, 6.0, 0.0), (1, "Orion", 8.0, 6.2, 0.0)]);
    schedule.run(&mut world);

    let key = ConversationKey::new(0, 1).unwrap();
    assert!(world.resource::<Conversations>().contains(&key));
    assert_eq!(world.resource::<DialogueOutbox>().len(), 1);

    let snapshot = capture_snapshot(&mut world);
    assert_eq!(snapshot.interacting_count(), 2);
    assert_pairing_consistent(&snapshot);
}

#[test]
fn test_distant_agents_keep_walking() {
    let (mut world, mut schedule) =
        scripted(&[(0, "Nova", 8.0, 6.0, 0.0), (1, "Orion", 16.0, 2.0, 0.0)]);
    schedule.run(&mut world);

    assert!(world.resource::<Conversations>().is_empty());
    let snapshot = capture_snapshot(&mut world);
    assert_eq!(snapshot.interacting_count(), 0);
    let nova = snapshot.agent(0).unwrap();
    assert!((nova.x - 8.01).abs() < 1e-5);
    assert_eq!(nova.y, 6.0);
}

#[test]
fn test_three_way_meeting_pairs_lowest_ids() {
    let (mut world, mut schedule) = scripted(&[
        (0, "Nova", 8.0, 6.0, 0.0),
        (1, "Orion", 8.5, 6.0, 0.0),
        (2, "Lyra", 9.0, 6.0, 0.0),
    ]);
    schedule.run(&mut world);

    let conversations = world.resource::<Conversations>();
    assert_eq!(conversations.len(), 1);
    assert!(conversations.contains(&ConversationKey::new(0, 1).unwrap()));

    let snapshot = capture_snapshot(&mut world);
    assert!(!snapshot.agent(2).unwrap().interacting);
    assert_pairing_consistent(&snapshot);
}

#[test]
fn test_conversation_ends_within_duration() {
    let (mut world, mut schedule) =
        scripted(&[(0, "Nova", 8.0, 6.0, 0.0), (1, "Orion", 8.2, 6.0, 0.0)]);
    schedule.run(&mut world);

    let key = ConversationKey::new(0, 1).unwrap();
    let ends_at = world.resource::<Conversations>().get(&key).unwrap().ends_at_ms;

    // talking agents stay put
    let before = capture_snapshot(&mut world);
    for _ in 0..100 {
        schedule.run(&mut world);
    }
    let during = capture_snapshot(&mut world);
    assert_eq!(before.agents[0].x, during.agents[0].x);
    assert!(world.resource::<Conversations>().contains(&key));

    while world.resource::<SimClock>().now_ms() < ends_at {
        schedule.run(&mut world);
    }

    assert!(world.resource::<Conversations>().is_empty());
    let after = capture_snapshot(&mut world);
    assert_eq!(after.interacting_count(), 0);
}

#[test]
fn test_released_pair_does_not_rejoin_while_close() {
    let (mut world, mut schedule) =
        scripted(&[(0, "Nova", 8.0, 6.0, 0.0), (1, "Orion", 8.2, 6.0, 0.0)]);
    schedule.run(&mut world);
    let ends_at = world
        .resource::<Conversations>()
        .iter()
        .next()
        .unwrap()
        .ends_at_ms;

    while world.resource::<SimClock>().now_ms() < ends_at {
        schedule.run(&mut world);
    }
    // a few frames later the pair is still within range but free
    for _ in 0..5 {
        schedule.run(&mut world);
    }
    assert!(world.resource::<Conversations>().is_empty());
}

#[test]
fn test_pairing_stays_consistent_in_crowd() {
    let (mut world, mut schedule) = city(5, 12);
    for _ in 0..3000 {
        schedule.run(&mut world);
        let snapshot = capture_snapshot(&mut world);
        assert_pairing_consistent(&snapshot);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn prop_free_agents_stay_on_road(seed in any::<u64>(), agents in 1usize..10, frames in 1u64..1500) {
        let (mut world, mut schedule) = city(seed, agents);
        let map = world.resource::<CityMap>().clone();

        for _ in 0..frames {
            schedule.run(&mut world);
            let snapshot = capture_snapshot(&mut world);
            for agent in snapshot.agents.iter().filter(|a| !a.interacting) {
                prop_assert!(
                    map.is_on_road(agent.x, agent.y),
                    "agent {} off road at ({}, {})",
                    agent.id,
                    agent.x,
                    agent.y
                );
            }
        }
    }
}
