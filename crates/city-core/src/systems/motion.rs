//! Motion System
//!
//! Moves every free agent a fixed distance along its heading each frame and
//! keeps it on the road network. A step that would leave the map or the road
//! is not taken; the agent re-aims instead and tries again next frame.

use bevy_ecs::prelude::*;
use rand::Rng;

use crate::components::agent::{Heading, Interacting, TilePosition};
use crate::components::map::{CityMap, RoadAxis};
use crate::config::MotionConfig;
use crate::SimRng;

/// What a single motion step did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// Moved along the current heading
    Moved,
    /// Moved into an intersection and took a new cardinal heading
    Turned,
    /// The step would have left the road or map; heading resampled, position kept
    Reaimed,
    /// Agent was found off-road and was placed back on the nearest road
    Recovered,
}

/// Advance one agent by one frame.
pub fn step_agent<R: Rng + ?Sized>(
    map: &CityMap,
    position: &mut TilePosition,
    heading: &mut f32,
    speed: f32,
    junction_turn_chance: f64,
    rng: &mut R,
) -> StepOutcome {
    let current_axis = map.axis_at(position);
    if current_axis == RoadAxis::OffRoad {
        if let Some(road_point) = map.nearest_road_point(position) {
            *position = road_point;
            *heading = map.axis_at(position).sample_heading(rng);
            return StepOutcome::Recovered;
        }
    }

    let candidate = position.advanced(*heading, speed);
    if !map.in_bounds(candidate.x, candidate.y) || !map.is_on_road(candidate.x, candidate.y) {
        *heading = current_axis.sample_heading(rng);
        return StepOutcome::Reaimed;
    }

    *position = candidate;
    let entered_junction = current_axis != RoadAxis::Intersection
        && map.axis_at(&candidate) == RoadAxis::Intersection;
    if entered_junction && rng.gen_bool(junction_turn_chance) {
        *heading = RoadAxis::Intersection.sample_heading(rng);
        return StepOutcome::Turned;
    }
    StepOutcome::Moved
}

/// System: move all agents that are not in a conversation
pub fn advance_agents(
    map: Res<CityMap>,
    motion: Res<MotionConfig>,
    mut rng: ResMut<SimRng>,
    mut query: Query<(&mut TilePosition, &mut Heading, &Interacting)>,
) {
    for (mut position, mut heading, interacting) in query.iter_mut() {
        if interacting.0 {
            continue;
        }
        let outcome = step_agent(
            &map,
            &mut position,
            &mut heading.0,
            motion.speed,
            motion.junction_turn_chance,
            &mut rng.0,
        );
        if outcome == StepOutcome::Recovered {
            tracing::debug!(x = position.x, y = position.y, "Agent returned to road");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::map::{CARDINAL_HEADINGS, HORIZONTAL_HEADINGS, VERTICAL_HEADINGS};
    use rand::rngs::SmallRng;
    use rand::SeedableRng;
    use std::f32::consts::{FRAC_PI_2, PI};

    fn rng() -> SmallRng {
        SmallRng::seed_from_u64(42)
    }

    #[test]
    fn test_step_right_along_horizontal_road() {
        let map = CityMap::default();
        let mut position = TilePosition::new(8.0, 6.0);
        let mut heading = 0.0;

        let outcome = step_agent(&map, &mut position, &mut heading, 0.01, 0.5, &mut rng());

        assert_eq!(outcome, StepOutcome::Moved);
        assert!((position.x - 8.01).abs() < 1e-5);
        assert_eq!(position.y, 6.0);
        assert_eq!(heading, 0.0);
    }

    #[test]
    fn test_leaving_road_reaims_without_moving() {
        let map = CityMap::default();
        let mut position = TilePosition::new(10.0, 6.0);
        // pointing straight off the horizontal road
        let mut heading = FRAC_PI_2;

        let outcome = step_agent(&map, &mut position, &mut heading, 0.2, 0.5, &mut rng());

        assert_eq!(outcome, StepOutcome::Reaimed);
        assert_eq!(position, TilePosition::new(10.0, 6.0));
        assert!(HORIZONTAL_HEADINGS.contains(&heading));
    }

    #[test]
    fn test_vertical_road_reaims_up_or_down() {
        let map = CityMap::default();
        let mut position = TilePosition::new(16.0, 3.0);
        let mut heading = 0.0;

        let outcome = step_agent(&map, &mut position, &mut heading, 0.2, 0.5, &mut rng());

        assert_eq!(outcome, StepOutcome::Reaimed);
        assert!(VERTICAL_HEADINGS.contains(&heading));
    }

    #[test]
    fn test_map_edge_reaims() {
        let map = CityMap::default();
        let mut position = TilePosition::new(map.width, 6.0);
        let mut heading = 0.0;

        let outcome = step_agent(&map, &mut position, &mut heading, 0.01, 0.5, &mut rng());

        assert_eq!(outcome, StepOutcome::Reaimed);
        assert_eq!(position.x, map.width);
    }

    #[test]
    fn test_entering_intersection_can_turn() {
        let map = CityMap::default();
        let mut position = TilePosition::new(7.85, 6.0);
        let mut heading = 0.0;

        // certain turn
        let outcome = step_agent(&map, &mut position, &mut heading, 0.06, 1.0, &mut rng());
        assert_eq!(outcome, StepOutcome::Turned);
        assert!(CARDINAL_HEADINGS.contains(&heading));

        // never turn
        let mut position = TilePosition::new(7.85, 6.0);
        let mut heading = 0.0;
        let outcome = step_agent(&map, &mut position, &mut heading, 0.06, 0.0, &mut rng());
        assert_eq!(outcome, StepOutcome::Moved);
        assert_eq!(heading, 0.0);
    }

    #[test]
    fn test_off_road_agent_is_recovered() {
        let map = CityMap::default();
        let mut position = TilePosition::new(10.0, 7.0);
        let mut heading = PI;

        let outcome = step_agent(&map, &mut position, &mut heading, 0.01, 0.5, &mut rng());

        assert_eq!(outcome, StepOutcome::Recovered);
        assert!(map.is_on_road(position.x, position.y));
        assert!(HORIZONTAL_HEADINGS.contains(&heading));
    }
}
