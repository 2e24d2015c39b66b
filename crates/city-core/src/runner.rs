//! Frame Runner
//!
//! Drives the ECS schedule one frame at a time and bridges it to the async
//! dialogue generator. World state is only touched inside [`CityRunner::step`];
//! generated dialogue comes back over an unbounded channel and is applied at
//! the start of a later frame, so a frame never waits on the network.

use std::sync::Arc;

use bevy_ecs::prelude::*;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use city_chat::{DialogueGenerator, WithFallback};
use city_events::{CitySnapshot, ConversationKey, EventKind};

use crate::components::clock::{advance_clock, SimClock};
use crate::components::map::CityMap;
use crate::config::{CityConfig, ConversationConfig};
use crate::events::{flush_events, EventLogger, PendingEvents};
use crate::render::{render_frame, Frame};
use crate::setup::{create_world, spawn_agents};
use crate::snapshot::{agent_snapshots, capture_snapshot};
use crate::systems::conversation::{
    apply_dialogue_replies, expire_conversations, process_dismissals, Conversations,
    DialogueInbox, DialogueReply, DismissQueue,
};
use crate::systems::interaction::{detect_encounters, DialogueOutbox, DialogueRequest};
use crate::systems::motion::advance_agents;

/// The per-frame system order
pub fn build_schedule() -> Schedule {
    let mut schedule = Schedule::default();
    schedule.add_systems(
        (
            advance_clock,
            process_dismissals,
            apply_dialogue_replies,
            advance_agents,
            detect_encounters,
            expire_conversations,
            flush_events,
        )
            .chain(),
    );
    schedule
}

pub struct CityRunner<G: DialogueGenerator> {
    world: World,
    schedule: Schedule,
    generator: Arc<WithFallback<G>>,
    replies_tx: mpsc::UnboundedSender<DialogueReply>,
    replies_rx: mpsc::UnboundedReceiver<DialogueReply>,
    tasks: Vec<JoinHandle<()>>,
}

impl<G: DialogueGenerator> CityRunner<G> {
    /// Build a world from `config` and spawn the starting population.
    pub fn new(config: &CityConfig, generator: G, logger: EventLogger) -> Self {
        let mut world = create_world(config, logger);
        spawn_agents(&mut world, &config.spawn);
        Self::from_world(world, generator)
    }

    /// Wrap an already populated world, e.g. one built by `create_world`.
    pub fn from_world(world: World, generator: G) -> Self {
        let (replies_tx, replies_rx) = mpsc::unbounded_channel();
        Self {
            world,
            schedule: build_schedule(),
            generator: Arc::new(WithFallback::new(generator)),
            replies_tx,
            replies_rx,
            tasks: Vec::new(),
        }
    }

    /// Run one frame. Must be called inside a tokio runtime.
    pub fn step(&mut self) {
        self.collect_replies();
        self.schedule.run(&mut self.world);

        let requests = self.world.resource_mut::<DialogueOutbox>().drain();
        for request in requests {
            self.spawn_generation(request);
        }
        self.tasks.retain(|task| !task.is_finished());
    }

    pub fn run_frames(&mut self, frames: u64) {
        for _ in 0..frames {
            self.step();
        }
    }

    /// Wait for every outstanding dialogue request to finish. The replies
    /// are applied on the next `step`.
    pub async fn settle(&mut self) {
        for task in self.tasks.drain(..) {
            if let Err(e) = task.await {
                if !e.is_cancelled() {
                    tracing::warn!(error = %e, "Dialogue task failed");
                }
            }
        }
    }

    /// Close a conversation on the next frame and release both agents
    pub fn dismiss(&mut self, key: ConversationKey) {
        self.world.resource_mut::<DismissQueue>().push(key);
    }

    /// Queue an event from outside the schedule, stamped with the current frame
    pub fn record(&mut self, kind: EventKind) {
        let stamp = self.world.resource::<SimClock>().stamp();
        self.world.resource_mut::<PendingEvents>().record(stamp, kind);
    }

    pub fn snapshot(&mut self) -> CitySnapshot {
        capture_snapshot(&mut self.world)
    }

    pub fn render(&mut self) -> Frame {
        let agents = agent_snapshots(&mut self.world);
        let now = self.world.resource::<SimClock>().now_ms();
        let interval = self.world.resource::<ConversationConfig>().line_interval_ms;
        render_frame(
            self.world.resource::<CityMap>(),
            &agents,
            self.world.resource::<Conversations>(),
            now,
            interval,
        )
    }

    pub fn conversations(&self) -> &Conversations {
        self.world.resource::<Conversations>()
    }

    pub fn clock(&self) -> &SimClock {
        self.world.resource::<SimClock>()
    }

    /// Dialogue requests not yet answered
    pub fn in_flight(&self) -> usize {
        self.tasks.iter().filter(|task| !task.is_finished()).count()
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    fn collect_replies(&mut self) {
        let mut inbox = self.world.resource_mut::<DialogueInbox>();
        while let Ok(reply) = self.replies_rx.try_recv() {
            inbox.push(reply);
        }
    }

    fn spawn_generation(&mut self, request: DialogueRequest) {
        let generator = Arc::clone(&self.generator);
        let replies = self.replies_tx.clone();
        let task = tokio::spawn(async move {
            let outcome = generator.generate(&request.first, &request.second).await;
            let reply = DialogueReply {
                key: request.key,
                created_at_ms: request.created_at_ms,
                lines: outcome.lines,
                fallback: outcome.fallback,
            };
            if replies.send(reply).is_err() {
                tracing::debug!(key = %request.key, "Runner gone, dropping dialogue");
            }
        });
        self.tasks.push(task);
    }
}

impl<G: DialogueGenerator> Drop for CityRunner<G> {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::agent::{AgentId, Interacting, TilePosition};
    use crate::setup::spawn_agent_at;
    use city_chat::CannedDialogue;

    fn pair_world() -> World {
        let mut world = create_world(&CityConfig::default(), EventLogger::memory());
        spawn_agent_at(&mut world, 0, "Nova", TilePosition::new(8.0, 6.0), 0.0);
        spawn_agent_at(&mut world, 1, "Orion", TilePosition::new(8.0, 6.2), 0.0);
        world
    }

    #[tokio::test]
    async fn test_meeting_spawns_one_request() {
        let mut runner = CityRunner::from_world(pair_world(), CannedDialogue);
        runner.step();

        let key = ConversationKey::new(0, 1).unwrap();
        assert!(runner.conversations().contains(&key));
        assert!(!runner.conversations().get(&key).unwrap().is_populated());

        runner.settle().await;
        runner.step();
        let conversation = runner.conversations().get(&key).unwrap();
        assert!(conversation.is_populated());
        assert!(!conversation.used_fallback);
    }

    #[tokio::test]
    async fn test_dismiss_releases_agents() {
        let mut runner = CityRunner::from_world(pair_world(), CannedDialogue);
        runner.step();
        let key = ConversationKey::new(0, 1).unwrap();

        runner.dismiss(key);
        runner.step();

        assert!(runner.conversations().is_empty());
        let world = runner.world_mut();
        let mut query = world.query::<(&AgentId, &Interacting)>();
        assert!(query.iter(world).all(|(_, interacting)| !interacting.0));
    }

    #[tokio::test]
    async fn test_render_has_pending_bubble() {
        let mut runner = CityRunner::from_world(pair_world(), CannedDialogue);
        runner.step();
        let frame = runner.render();
        assert_eq!(frame.bubbles().count(), 1);
        assert_eq!(frame.agent_count(), 2);
    }
}
