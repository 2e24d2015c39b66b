//! Agent Registry
//!
//! The agent registry contract: deploy an agent with a stake, kill it,
//! withdraw the stake of a dead agent, claim accrued rewards, and read or
//! write the agent's reputation.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::error::RegistryError;
use crate::wallet::is_valid_address;

/// Reputation every new agent starts with
pub const STARTING_REPUTATION: u8 = 50;

/// One registered agent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentRecord {
    pub id: u32,
    pub name: String,
    /// Address of the account that deployed the agent
    pub owner: String,
    /// The agent's own wallet address
    pub address: String,
    /// 0..=100
    pub reputation: u8,
    pub alive: bool,
    /// Deposit locked at creation, withdrawable once the agent is dead
    pub stake: u64,
    pub pending_reward: u64,
}

/// Registry operations consumed by the simulation, chat and game scoring
pub trait AgentRegistry {
    fn create_agent(
        &mut self,
        name: &str,
        owner: &str,
        address: &str,
        stake: u64,
    ) -> Result<u32, RegistryError>;

    fn kill_agent(&mut self, id: u32) -> Result<(), RegistryError>;

    fn agent(&self, id: u32) -> Result<&AgentRecord, RegistryError>;

    fn set_reputation(&mut self, id: u32, reputation: u8) -> Result<(), RegistryError>;

    /// Add to an agent's unclaimed reward
    fn credit_reward(&mut self, id: u32, amount: u64) -> Result<(), RegistryError>;

    /// Take and zero the pending reward of a live agent
    fn claim_reward(&mut self, id: u32) -> Result<u64, RegistryError>;

    /// Take and zero the stake of a dead agent
    fn withdraw(&mut self, id: u32) -> Result<u64, RegistryError>;

    /// Ids of all live agents, ascending
    fn live_agents(&self) -> Vec<u32>;
}

/// Registry kept in memory, optionally persisted as JSON
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InMemoryRegistry {
    agents: BTreeMap<u32, AgentRecord>,
    next_id: u32,
}

impl InMemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(path: &Path) -> Result<Self, RegistryError> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Load from `path`, or start empty if the file does not exist yet
    pub fn load_or_default(path: &Path) -> Result<Self, RegistryError> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::new())
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), RegistryError> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    pub fn records(&self) -> impl Iterator<Item = &AgentRecord> {
        self.agents.values()
    }

    fn live_mut(&mut self, id: u32) -> Result<&mut AgentRecord, RegistryError> {
        let record = self
            .agents
            .get_mut(&id)
            .ok_or(RegistryError::UnknownAgent(id))?;
        if !record.alive {
            return Err(RegistryError::AgentDead(id));
        }
        Ok(record)
    }
}

impl AgentRegistry for InMemoryRegistry {
    fn create_agent(
        &mut self,
        name: &str,
        owner: &str,
        address: &str,
        stake: u64,
    ) -> Result<u32, RegistryError> {
        for addr in [owner, address] {
            if !is_valid_address(addr) {
                return Err(RegistryError::InvalidAddress(addr.to_string()));
            }
        }

        let id = self.next_id;
        self.next_id += 1;
        self.agents.insert(
            id,
            AgentRecord {
                id,
                name: name.to_string(),
                owner: owner.to_string(),
                address: address.to_string(),
                reputation: STARTING_REPUTATION,
                alive: true,
                stake,
                pending_reward: 0,
            },
        );
        tracing::info!(agent_id = id, name, "Agent registered");
        Ok(id)
    }

    fn kill_agent(&mut self, id: u32) -> Result<(), RegistryError> {
        let record = self.live_mut(id)?;
        record.alive = false;
        tracing::info!(agent_id = id, "Agent killed");
        Ok(())
    }

    fn agent(&self, id: u32) -> Result<&AgentRecord, RegistryError> {
        self.agents.get(&id).ok_or(RegistryError::UnknownAgent(id))
    }

    fn set_reputation(&mut self, id: u32, reputation: u8) -> Result<(), RegistryError> {
        self.live_mut(id)?.reputation = reputation.min(crate::reputation::MAX_REPUTATION);
        Ok(())
    }

    fn credit_reward(&mut self, id: u32, amount: u64) -> Result<(), RegistryError> {
        let record = self.live_mut(id)?;
        record.pending_reward = record.pending_reward.saturating_add(amount);
        Ok(())
    }

    fn claim_reward(&mut self, id: u32) -> Result<u64, RegistryError> {
        let record = self.live_mut(id)?;
        Ok(std::mem::take(&mut record.pending_reward))
    }

    fn withdraw(&mut self, id: u32) -> Result<u64, RegistryError> {
        let record = self
            .agents
            .get_mut(&id)
            .ok_or(RegistryError::UnknownAgent(id))?;
        if record.alive {
            return Err(RegistryError::AgentAlive(id));
        }
        if record.stake == 0 {
            return Err(RegistryError::NothingToWithdraw(id));
        }
        Ok(std::mem::take(&mut record.stake))
    }

    fn live_agents(&self) -> Vec<u32> {
        self.agents
            .values()
            .filter(|r| r.alive)
            .map(|r| r.id)
            .collect()
    }
}
