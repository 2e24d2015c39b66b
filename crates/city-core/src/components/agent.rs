//! Agent Components
//!
//! Components for individual agents: identity, position, heading, and
//! whether they are locked in a conversation.

use bevy_ecs::prelude::*;
use serde::{Deserialize, Serialize};

use city_events::AgentDescriptor;

/// Marker component identifying an entity as an agent
#[derive(Component, Debug, Clone, Default)]
pub struct Agent;

/// Registry index or on-chain id
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AgentId(pub u32);

/// Display name, also used as the speaker name in dialogue
#[derive(Component, Debug, Clone, Serialize, Deserialize)]
pub struct AgentName(pub String);

/// Owning account, if known
#[derive(Component, Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentOwner(pub Option<String>);

/// Continuous position in tile units
#[derive(Component, Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TilePosition {
    pub x: f32,
    pub y: f32,
}

impl TilePosition {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance_to(&self, other: &TilePosition) -> f32 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    pub fn midpoint(&self, other: &TilePosition) -> TilePosition {
        TilePosition::new((self.x + other.x) / 2.0, (self.y + other.y) / 2.0)
    }

    /// Position after moving `distance` along `heading`
    pub fn advanced(&self, heading: f32, distance: f32) -> TilePosition {
        TilePosition::new(
            self.x + distance * heading.cos(),
            self.y + distance * heading.sin(),
        )
    }
}

/// Direction of travel in radians (0 = +x, π/2 = +y)
#[derive(Component, Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Heading(pub f32);

/// True while locked in a conversation; such agents do not move
#[derive(Component, Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interacting(pub bool);

impl Interacting {
    pub fn is_free(&self) -> bool {
        !self.0
    }
}

/// Everything an agent entity is spawned with
#[derive(Bundle)]
pub struct AgentBundle {
    pub agent: Agent,
    pub id: AgentId,
    pub name: AgentName,
    pub owner: AgentOwner,
    pub position: TilePosition,
    pub heading: Heading,
    pub interacting: Interacting,
}

impl AgentBundle {
    pub fn new(id: u32, name: impl Into<String>, position: TilePosition, heading: f32) -> Self {
        Self {
            agent: Agent,
            id: AgentId(id),
            name: AgentName(name.into()),
            owner: AgentOwner(None),
            position,
            heading: Heading(heading),
            interacting: Interacting(false),
        }
    }

    pub fn with_owner(mut self, owner: impl Into<String>) -> Self {
        self.owner = AgentOwner(Some(owner.into()));
        self
    }
}

/// Metadata handed to the dialogue generator
pub fn describe(id: &AgentId, name: &AgentName, owner: &AgentOwner) -> AgentDescriptor {
    AgentDescriptor {
        id: id.0,
        name: name.0.clone(),
        owner: owner.0.clone(),
    }
}
