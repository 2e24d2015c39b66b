//! Configuration loading for the city simulation.
//!
//! All settings can be loaded from a TOML file; every field has a default,
//! so an empty file (or no file) yields the standard city.

use bevy_ecs::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use city_chat::LlmConfig;

use crate::components::map::{Structure, StructureKind};

/// Complete simulation configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CityConfig {
    #[serde(default)]
    pub simulation: SimulationConfig,
    #[serde(default)]
    pub map: MapConfig,
    #[serde(default)]
    pub motion: MotionConfig,
    #[serde(default)]
    pub conversation: ConversationConfig,
    #[serde(default)]
    pub spawn: SpawnConfig,
    #[serde(default)]
    pub llm: LlmConfig,
}

impl CityConfig {
    /// Loads configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
        Self::from_str(&content)
    }

    /// Parses and validates configuration from a TOML string.
    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content).map_err(ConfigError::Toml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::Serialize)
    }

    /// Rejects settings the simulation cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: &str| Err(ConfigError::Invalid(msg.to_string()));

        if self.simulation.frame_ms == 0 {
            return invalid("simulation.frame_ms must be positive");
        }
        if self.map.width <= 0.0 || self.map.height <= 0.0 {
            return invalid("map dimensions must be positive");
        }
        if self.map.horizontal_roads.is_empty() && self.map.vertical_roads.is_empty() {
            return invalid("map needs at least one road");
        }
        if self.map.horizontal_roads.iter().any(|y| *y < 0.0 || *y > self.map.height)
            || self.map.vertical_roads.iter().any(|x| *x < 0.0 || *x > self.map.width)
        {
            return invalid("roads must lie inside the map");
        }
        if self.map.road_tolerance <= 0.0 {
            return invalid("map.road_tolerance must be positive");
        }
        if self.motion.speed <= 0.0 || self.motion.speed >= self.map.road_tolerance {
            return invalid("motion.speed must be positive and below the road tolerance");
        }
        if !(0.0..=1.0).contains(&self.motion.junction_turn_chance) {
            return invalid("motion.junction_turn_chance must be within 0..=1");
        }
        if self.conversation.interaction_distance <= 0.0 {
            return invalid("conversation.interaction_distance must be positive");
        }
        if self.conversation.line_interval_ms == 0 || self.conversation.duration_ms == 0 {
            return invalid("conversation timings must be positive");
        }
        Ok(())
    }
}

/// Frame timing and seeding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub seed: u64,
    /// Simulated milliseconds per frame
    pub frame_ms: u64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            frame_ms: 16,
        }
    }
}

/// City geometry in tile units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapConfig {
    pub width: f32,
    pub height: f32,
    /// y coordinates of the east-west roads
    pub horizontal_roads: Vec<f32>,
    /// x coordinates of the north-south roads
    pub vertical_roads: Vec<f32>,
    /// Distance from a road line that still counts as on the road
    pub road_tolerance: f32,
    pub buildings: Vec<Structure>,
    pub houses: Vec<Structure>,
}

impl Default for MapConfig {
    fn default() -> Self {
        let building = |label: &str, x, y, width, height| {
            Structure::new(StructureKind::Building, label, x, y, width, height)
        };
        let house = |x, y| Structure::new(StructureKind::House, "house", x, y, 2.0, 2.0);

        Self {
            width: 25.0,
            height: 19.0,
            horizontal_roads: vec![6.0, 12.0],
            vertical_roads: vec![8.0, 16.0],
            road_tolerance: 0.1,
            buildings: vec![
                building("BANK", 2.0, 2.0, 2.0, 2.0),
                building("COURT", 19.0, 2.0, 2.0, 2.0),
                building("STADIUM", 10.0, 8.0, 3.0, 3.0),
            ],
            houses: vec![
                house(2.0, 7.0),
                house(4.0, 2.0),
                house(19.0, 8.0),
                house(21.0, 2.0),
                house(2.0, 14.0),
                house(4.0, 10.0),
                house(19.0, 14.0),
                house(21.0, 10.0),
                house(10.0, 2.0),
                house(13.0, 14.0),
            ],
        }
    }
}

/// Agent movement.
#[derive(Resource, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MotionConfig {
    /// Tiles per frame
    pub speed: f32,
    /// Chance of turning when entering an intersection
    pub junction_turn_chance: f64,
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            speed: 0.01,
            junction_turn_chance: 0.5,
        }
    }
}

/// Encounter detection and conversation timing.
#[derive(Resource, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversationConfig {
    /// Agents closer than this (tiles) start talking
    pub interaction_distance: f32,
    /// How long each dialogue line stays on screen
    pub line_interval_ms: u64,
    /// Lifetime of a conversation from creation
    pub duration_ms: u64,
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            interaction_distance: 1.5,
            line_interval_ms: 3000,
            duration_ms: 30_000,
        }
    }
}

/// Initial population.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpawnConfig {
    pub agent_count: usize,
    /// Names assigned in order, cycling with a numeric suffix when exhausted
    pub names: Vec<String>,
}

impl Default for SpawnConfig {
    fn default() -> Self {
        Self {
            agent_count: 6,
            names: ["Nova", "Orion", "Lyra", "Atlas", "Vega", "Juno", "Castor", "Mira"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

/// Errors loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[source] std::io::Error),
    #[error("Failed to parse TOML: {0}")]
    Toml(#[source] toml::de::Error),
    #[error("Failed to serialize config: {0}")]
    Serialize(#[source] toml::ser::Error),
    #[error("Invalid config: {0}")]
    Invalid(String),
}
