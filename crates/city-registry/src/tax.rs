//! Tax Collection
//!
//! Each live agent pays a fixed amount into the city treasury on a fixed
//! interval. Collection runs as one cancellable tokio task per agent id;
//! the task set follows agent liveness in the registry, and a task watching
//! a shared registry stops itself once its agent has been killed.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use crate::error::RegistryError;
use crate::registry::{AgentRegistry, InMemoryRegistry};
use crate::wallet::Ledger;

/// How much is collected, how often, and where it goes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxPolicy {
    pub amount: u64,
    #[serde(with = "duration_ms")]
    pub interval: Duration,
    pub treasury: String,
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(d)?))
    }
}

/// A registry shared between the tax tasks and whoever updates it
pub type SharedRegistry = Arc<RwLock<InMemoryRegistry>>;

fn is_alive(registry: &SharedRegistry, agent_id: u32) -> bool {
    registry
        .read()
        .agent(agent_id)
        .map(|record| record.alive)
        .unwrap_or(false)
}

/// Running collection tasks keyed by agent id
pub struct TaxScheduler {
    policy: TaxPolicy,
    ledger: Arc<Ledger>,
    registry: Option<SharedRegistry>,
    tasks: HashMap<u32, JoinHandle<()>>,
}

impl TaxScheduler {
    pub fn new(policy: TaxPolicy, ledger: Arc<Ledger>) -> Self {
        Self {
            policy,
            ledger,
            registry: None,
            tasks: HashMap::new(),
        }
    }

    /// Check the agent is still alive before every collection
    pub fn watching(mut self, registry: SharedRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn policy(&self) -> &TaxPolicy {
        &self.policy
    }

    /// Everything collected so far
    pub fn treasury_balance(&self) -> u64 {
        self.ledger.balance(&self.policy.treasury)
    }

    /// Start collecting from `address` for `agent_id`.
    ///
    /// Returns false if a task for the agent is already running. Must be
    /// called inside a tokio runtime.
    pub fn start(&mut self, agent_id: u32, address: impl Into<String>) -> bool {
        if self.is_running(agent_id) {
            return false;
        }
        self.tasks.remove(&agent_id);

        let address = address.into();
        let ledger = Arc::clone(&self.ledger);
        let policy = self.policy.clone();
        let registry = self.registry.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + policy.interval, policy.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                if let Some(registry) = &registry {
                    if !is_alive(registry, agent_id) {
                        tracing::info!(agent_id, "Agent is dead, tax collection stopped");
                        break;
                    }
                }
                match ledger.transfer(&address, &policy.treasury, policy.amount) {
                    Ok(receipt) => {
                        tracing::debug!(agent_id, tx = %receipt.tx_id, amount = receipt.amount, "Tax collected");
                    }
                    Err(RegistryError::InsufficientBalance { available, .. }) => {
                        tracing::warn!(agent_id, available, "Skipping tax collection: insufficient balance");
                    }
                    Err(e) => {
                        tracing::warn!(agent_id, error = %e, "Tax collection failed");
                    }
                }
            }
        });

        tracing::info!(agent_id, "Tax collection started");
        self.tasks.insert(agent_id, handle);
        true
    }

    /// Stop collecting for `agent_id`. Returns false if nothing was running.
    pub fn stop(&mut self, agent_id: u32) -> bool {
        match self.tasks.remove(&agent_id) {
            Some(handle) => {
                handle.abort();
                tracing::info!(agent_id, "Tax collection stopped");
                true
            }
            None => false,
        }
    }

    pub fn is_running(&self, agent_id: u32) -> bool {
        self.tasks
            .get(&agent_id)
            .map(|h| !h.is_finished())
            .unwrap_or(false)
    }

    /// Agent ids with a live task, ascending
    pub fn running(&self) -> Vec<u32> {
        let mut ids: Vec<u32> = self
            .tasks
            .iter()
            .filter(|(_, handle)| !handle.is_finished())
            .map(|(id, _)| *id)
            .collect();
        ids.sort_unstable();
        ids
    }

    /// Start tasks for live agents, stop tasks for dead or unknown ones
    pub fn sync_with<R: AgentRegistry + ?Sized>(&mut self, registry: &R) {
        let live = registry.live_agents();

        let stale: Vec<u32> = self
            .tasks
            .keys()
            .copied()
            .filter(|id| !live.contains(id))
            .collect();
        for id in stale {
            self.stop(id);
        }

        for id in live {
            if let Ok(record) = registry.agent(id) {
                self.start(id, record.address.clone());
            }
        }
    }

    pub fn stop_all(&mut self) {
        for (_, handle) in self.tasks.drain() {
            handle.abort();
        }
    }
}

impl Drop for TaxScheduler {
    fn drop(&mut self) {
        self.stop_all();
    }
}
