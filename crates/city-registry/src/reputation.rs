//! Reputation Updates
//!
//! Arcade game scores feed an agent's on-chain reputation through a fixed
//! step table. Reputation is always kept inside `0..=100`.

use serde::{Deserialize, Serialize};

use city_events::EventKind;

use crate::error::RegistryError;
use crate::registry::AgentRegistry;

pub const MAX_REPUTATION: u8 = 100;

/// Step table: score < 50 → -2, < 100 → -1, < 200 → 0, < 300 → +1, else +2
pub fn reputation_delta(score: u32) -> i8 {
    match score {
        0..=49 => -2,
        50..=99 => -1,
        100..=199 => 0,
        200..=299 => 1,
        _ => 2,
    }
}

/// Apply a delta, clamping to `0..=100`
pub fn apply_delta(current: u8, delta: i8) -> u8 {
    (i16::from(current) + i16::from(delta)).clamp(0, i16::from(MAX_REPUTATION)) as u8
}

/// Result of submitting a game score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReputationChange {
    pub agent_id: u32,
    pub previous: u8,
    pub current: u8,
    pub delta: i8,
    pub score: u32,
}

impl ReputationChange {
    pub fn to_event(&self) -> EventKind {
        EventKind::ReputationChanged {
            agent_id: self.agent_id,
            previous: self.previous,
            current: self.current,
            score: self.score,
        }
    }
}

/// Read the agent's reputation, apply the score's delta and write it back
pub fn submit_game_score<R: AgentRegistry + ?Sized>(
    registry: &mut R,
    agent_id: u32,
    score: u32,
) -> Result<ReputationChange, RegistryError> {
    let record = registry.agent(agent_id)?;
    if !record.alive {
        return Err(RegistryError::AgentDead(agent_id));
    }
    let previous = record.reputation;
    let delta = reputation_delta(score);
    let current = apply_delta(previous, delta);
    registry.set_reputation(agent_id, current)?;

    tracing::info!(agent_id, score, previous, current, "Reputation updated");
    Ok(ReputationChange {
        agent_id,
        previous,
        current,
        delta,
        score,
    })
}

/// Agents below this reputation can be culled
pub const CULL_THRESHOLD: u8 = 10;

/// Kill the live agent with the lowest reputation if it is below `threshold`.
///
/// Ties go to the lowest id. Returns the culled agent's id.
pub fn cull_lowest_reputation<R: AgentRegistry + ?Sized>(
    registry: &mut R,
    threshold: u8,
) -> Result<Option<u32>, RegistryError> {
    let mut lowest: Option<(u8, u32)> = None;
    for id in registry.live_agents() {
        let reputation = registry.agent(id)?.reputation;
        if lowest.map_or(true, |(best, best_id)| (reputation, id) < (best, best_id)) {
            lowest = Some((reputation, id));
        }
    }

    match lowest {
        Some((reputation, id)) if reputation < threshold => {
            registry.kill_agent(id)?;
            tracing::info!(agent_id = id, reputation, "Culled low-reputation agent");
            Ok(Some(id))
        }
        _ => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::InMemoryRegistry;

    const OWNER: &str = "0x1111111111111111111111111111111111111111";
    const AGENT: &str = "0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";

    #[test]
    fn test_step_table_boundaries() {
        assert_eq!(reputation_delta(0), -2);
        assert_eq!(reputation_delta(49), -2);
        assert_eq!(reputation_delta(50), -1);
        assert_eq!(reputation_delta(99), -1);
        assert_eq!(reputation_delta(100), 0);
        assert_eq!(reputation_delta(199), 0);
        assert_eq!(reputation_delta(200), 1);
        assert_eq!(reputation_delta(299), 1);
        assert_eq!(reputation_delta(300), 2);
        assert_eq!(reputation_delta(u32::MAX), 2);
    }

    #[test]
    fn test_clamp_at_both_ends() {
        assert_eq!(apply_delta(1, -2), 0);
        assert_eq!(apply_delta(0, -2), 0);
        assert_eq!(apply_delta(99, 2), 100);
        assert_eq!(apply_delta(100, 1), 100);
        assert_eq!(apply_delta(50, 0), 50);
    }

    #[test]
    fn test_submit_writes_back() {
        let mut registry = InMemoryRegistry::new();
        let id = registry.create_agent("Nova", OWNER, AGENT, 0).unwrap();

        let change = submit_game_score(&mut registry, id, 350).unwrap();
        assert_eq!(change.previous, 50);
        assert_eq!(change.current, 52);
        assert_eq!(registry.agent(id).unwrap().reputation, 52);

        let change = submit_game_score(&mut registry, id, 10).unwrap();
        assert_eq!(change.delta, -2);
        assert_eq!(registry.agent(id).unwrap().reputation, 50);
    }

    #[test]
    fn test_submit_rejects_dead_and_unknown() {
        let mut registry = InMemoryRegistry::new();
        let id = registry.create_agent("Nova", OWNER, AGENT, 0).unwrap();
        registry.kill_agent(id).unwrap();

        assert!(matches!(
            submit_game_score(&mut registry, id, 500),
            Err(RegistryError::AgentDead(_))
        ));
        assert!(matches!(
            submit_game_score(&mut registry, 42, 500),
            Err(RegistryError::UnknownAgent(42))
        ));
    }

    #[test]
    fn test_change_maps_to_event() {
        let change = ReputationChange {
            agent_id: 3,
            previous: 10,
            current: 11,
            delta: 1,
            score: 250,
        };
        assert_eq!(
            change.to_event(),
            EventKind::ReputationChanged {
                agent_id: 3,
                previous: 10,
                current: 11,
                score: 250
            }
        );
    }

    #[test]
    fn test_cull_takes_lowest_below_threshold() {
        let mut registry = InMemoryRegistry::new();
        let a = registry.create_agent("Nova", OWNER, AGENT, 0).unwrap();
        let b = registry.create_agent("Orion", OWNER, AGENT, 0).unwrap();
        let c = registry.create_agent("Lyra", OWNER, AGENT, 0).unwrap();
        registry.set_reputation(a, 8).unwrap();
        registry.set_reputation(b, 3).unwrap();
        registry.set_reputation(c, 3).unwrap();

        assert_eq!(cull_lowest_reputation(&mut registry, CULL_THRESHOLD).unwrap(), Some(b));
        assert!(!registry.agent(b).unwrap().alive);
        assert_eq!(cull_lowest_reputation(&mut registry, CULL_THRESHOLD).unwrap(), Some(c));
        assert_eq!(cull_lowest_reputation(&mut registry, CULL_THRESHOLD).unwrap(), Some(a));
        assert_eq!(cull_lowest_reputation(&mut registry, CULL_THRESHOLD).unwrap(), None);
    }

    #[test]
    fn test_cull_spares_healthy_city() {
        let mut registry = InMemoryRegistry::new();
        let id = registry.create_agent("Nova", OWNER, AGENT, 0).unwrap();
        assert_eq!(cull_lowest_reputation(&mut registry, CULL_THRESHOLD).unwrap(), None);
        assert!(registry.agent(id).unwrap().alive);
    }
}
