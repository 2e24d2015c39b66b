//! ARCA City simulation engine.
//!
//! Agents wander a small grid of roads; when two come close they stop and
//! talk, with the conversation generated off the frame loop by a
//! [`city_chat::DialogueGenerator`]. [`runner::CityRunner`] ties the ECS
//! schedule to that async collaborator.

use bevy_ecs::prelude::*;
use rand::rngs::SmallRng;

pub mod components;
pub mod config;
pub mod error;
pub mod events;
pub mod render;
pub mod runner;
pub mod setup;
pub mod snapshot;
pub mod systems;

pub use components::*;
pub use config::{CityConfig, ConfigError};
pub use error::CityError;
pub use events::{EventLogger, PendingEvents};
pub use render::{render_frame, DrawCommand, Frame};
pub use runner::{build_schedule, CityRunner};
pub use setup::{create_world, spawn_agent_at, spawn_agents, spawn_registered};
pub use snapshot::{capture_snapshot, write_snapshot};

/// Seeded random number generator resource
#[derive(Resource)]
pub struct SimRng(pub SmallRng);
