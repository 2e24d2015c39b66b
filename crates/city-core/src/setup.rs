//! World Setup
//!
//! Builds the ECS world from configuration and spawns the starting agents.

use bevy_ecs::prelude::*;
use rand::rngs::SmallRng;
use rand::SeedableRng;

use city_registry::AgentRecord;

use crate::components::agent::{AgentBundle, AgentId, TilePosition};
use crate::components::clock::SimClock;
use crate::components::map::CityMap;
use crate::config::{CityConfig, SpawnConfig};
use crate::events::{EventLogger, PendingEvents};
use crate::systems::conversation::{Conversations, DialogueInbox, DismissQueue, RecentPartners};
use crate::systems::interaction::DialogueOutbox;
use crate::SimRng;

/// Create a world with every simulation resource but no agents.
pub fn create_world(config: &CityConfig, logger: EventLogger) -> World {
    let mut world = World::new();

    world.insert_resource(SimRng(SmallRng::seed_from_u64(config.simulation.seed)));
    world.insert_resource(SimClock::new(config.simulation.frame_ms));
    world.insert_resource(CityMap::from_config(&config.map));
    world.insert_resource(config.motion.clone());
    world.insert_resource(config.conversation.clone());

    world.insert_resource(Conversations::new());
    world.insert_resource(DialogueInbox::new());
    world.insert_resource(DialogueOutbox::new());
    world.insert_resource(DismissQueue::new());
    world.insert_resource(RecentPartners::new());

    world.insert_resource(PendingEvents::new());
    world.insert_resource(logger);

    world
}

/// Name for the agent at `index`, cycling with a numeric suffix once the
/// list runs out
pub fn spawn_name(names: &[String], index: usize) -> String {
    if names.is_empty() {
        return format!("Agent {}", index);
    }
    let base = &names[index % names.len()];
    match index / names.len() {
        0 => base.clone(),
        round => format!("{} {}", base, round + 1),
    }
}

/// Spawn one agent at a random road point with a heading valid for that road.
pub fn spawn_agent(
    world: &mut World,
    id: u32,
    name: impl Into<String>,
    owner: Option<String>,
    rng: &mut SmallRng,
) -> Option<Entity> {
    let (position, heading) = {
        let map = world.resource::<CityMap>();
        let position = map.random_road_point(rng)?;
        let heading = map.axis_at(&position).sample_heading(rng);
        (position, heading)
    };

    let mut bundle = AgentBundle::new(id, name, position, heading);
    if let Some(owner) = owner {
        bundle = bundle.with_owner(owner);
    }
    Some(world.spawn(bundle).id())
}

/// Spawn an agent at an exact position, e.g. for scripted scenarios
pub fn spawn_agent_at(
    world: &mut World,
    id: u32,
    name: impl Into<String>,
    position: TilePosition,
    heading: f32,
) -> Entity {
    world.spawn(AgentBundle::new(id, name, position, heading)).id()
}

fn with_rng<T>(world: &mut World, f: impl FnOnce(&mut World, &mut SmallRng) -> T) -> T {
    // Take the RNG out to avoid borrow conflicts
    let mut sim_rng = match world.remove_resource::<SimRng>() {
        Some(rng) => rng,
        None => SimRng(SmallRng::seed_from_u64(0)),
    };
    let result = f(world, &mut sim_rng.0);
    world.insert_resource(sim_rng);
    result
}

/// Spawn the configured starting population with ids `0..agent_count`
pub fn spawn_agents(world: &mut World, config: &SpawnConfig) -> Vec<Entity> {
    let spawned = with_rng(world, |world, rng| {
        (0..config.agent_count)
            .filter_map(|index| {
                let name = spawn_name(&config.names, index);
                spawn_agent(world, index as u32, name, None, rng)
            })
            .collect::<Vec<_>>()
    });
    tracing::info!(count = spawned.len(), "Spawned agents");
    spawned
}

/// Spawn every live registry agent, keeping its registry id and owner
pub fn spawn_registered<'a>(
    world: &mut World,
    records: impl IntoIterator<Item = &'a AgentRecord>,
) -> Vec<Entity> {
    let spawned = with_rng(world, |world, rng| {
        records
            .into_iter()
            .filter(|record| record.alive)
            .filter_map(|record| {
                spawn_agent(
                    world,
                    record.id,
                    record.name.clone(),
                    Some(record.owner.clone()),
                    rng,
                )
            })
            .collect::<Vec<_>>()
    });
    tracing::info!(count = spawned.len(), "Spawned registered agents");
    spawned
}

/// Number of agent entities in the world
pub fn agent_count(world: &mut World) -> usize {
    world.query::<&AgentId>().iter(world).count()
}
