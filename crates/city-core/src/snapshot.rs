//! Snapshot Generation
//!
//! Captures the city as plain data for the CLI and any front end.

use bevy_ecs::prelude::*;
use std::fs;
use std::path::Path;

use city_events::{AgentSnapshot, CitySnapshot, ConversationSnapshot};

use crate::components::agent::{AgentId, AgentName, Heading, Interacting, TilePosition};
use crate::components::clock::SimClock;
use crate::config::ConversationConfig;
use crate::systems::conversation::Conversations;

/// Agents in the world, sorted by id
pub fn agent_snapshots(world: &mut World) -> Vec<AgentSnapshot> {
    let mut query = world.query::<(&AgentId, &AgentName, &TilePosition, &Heading, &Interacting)>();
    let mut agents: Vec<AgentSnapshot> = query
        .iter(world)
        .map(|(id, name, position, heading, interacting)| AgentSnapshot {
            id: id.0,
            name: name.0.clone(),
            x: position.x,
            y: position.y,
            heading: heading.0,
            interacting: interacting.0,
        })
        .collect();
    agents.sort_by_key(|a| a.id);
    agents
}

/// Capture the whole city at the current frame
pub fn capture_snapshot(world: &mut World) -> CitySnapshot {
    let agents = agent_snapshots(world);

    let clock = world.resource::<SimClock>();
    let now = clock.now_ms();
    let stamp = clock.stamp();
    let interval = world.resource::<ConversationConfig>().line_interval_ms;

    let conversations = world
        .resource::<Conversations>()
        .iter()
        .map(|c| ConversationSnapshot {
            key: c.key,
            midpoint: (c.midpoint.x, c.midpoint.y),
            line_count: c.lines.len(),
            current_line: c.current_line(now, interval).map(|(_, line)| line.clone()),
            ends_at_ms: c.ends_at_ms,
        })
        .collect();

    CitySnapshot {
        stamp,
        agents,
        conversations,
    }
}

/// Write snapshot to file
pub fn write_snapshot(snapshot: &CitySnapshot, path: impl AsRef<Path>) -> std::io::Result<()> {
    let json = serde_json::to_string_pretty(snapshot)?;
    fs::write(path, json)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CityConfig;
    use crate::events::EventLogger;
    use crate::setup::{create_world, spawn_agent_at};

    #[test]
    fn test_snapshot_sorted_and_serializable() {
        let mut world = create_world(&CityConfig::default(), EventLogger::null());
        spawn_agent_at(&mut world, 5, "Vega", TilePosition::new(16.0, 3.0), 0.0);
        spawn_agent_at(&mut world, 2, "Lyra", TilePosition::new(8.0, 6.0), 0.0);

        let snapshot = capture_snapshot(&mut world);
        let ids: Vec<u32> = snapshot.agents.iter().map(|a| a.id).collect();
        assert_eq!(ids, vec![2, 5]);
        assert!(snapshot.conversations.is_empty());

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snapshot.json");
        write_snapshot(&snapshot, &path).unwrap();
        let parsed: CitySnapshot =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(parsed, snapshot);
    }
}
