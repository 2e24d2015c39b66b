//! City Map
//!
//! A fixed grid crossed by horizontal and vertical road lines, with buildings
//! and houses placed between them. There is no explicit road graph: whether a
//! point is on a road is decided geometrically against the road lines.

use bevy_ecs::prelude::*;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::f32::consts::{FRAC_PI_2, PI, TAU};

use crate::components::agent::TilePosition;
use crate::config::MapConfig;

/// Headings along an east-west road
pub const HORIZONTAL_HEADINGS: [f32; 2] = [0.0, PI];
/// Headings along a north-south road
pub const VERTICAL_HEADINGS: [f32; 2] = [FRAC_PI_2, -FRAC_PI_2];
/// Headings available at an intersection
pub const CARDINAL_HEADINGS: [f32; 4] = [0.0, PI, FRAC_PI_2, -FRAC_PI_2];

/// Which road (if any) a point lies on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoadAxis {
    Horizontal,
    Vertical,
    Intersection,
    OffRoad,
}

impl RoadAxis {
    /// Pick a heading valid for this axis. Off-road gets any direction.
    pub fn sample_heading<R: Rng + ?Sized>(self, rng: &mut R) -> f32 {
        match self {
            RoadAxis::Horizontal => HORIZONTAL_HEADINGS[rng.gen_range(0..2)],
            RoadAxis::Vertical => VERTICAL_HEADINGS[rng.gen_range(0..2)],
            RoadAxis::Intersection => CARDINAL_HEADINGS[rng.gen_range(0..4)],
            RoadAxis::OffRoad => rng.gen_range(0.0..TAU),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StructureKind {
    Building,
    House,
}

/// A static rectangle drawn on the map
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Structure {
    pub kind: StructureKind,
    pub label: String,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Structure {
    pub fn new(
        kind: StructureKind,
        label: impl Into<String>,
        x: f32,
        y: f32,
        width: f32,
        height: f32,
    ) -> Self {
        Self {
            kind,
            label: label.into(),
            x,
            y,
            width,
            height,
        }
    }

    pub fn contains(&self, x: f32, y: f32) -> bool {
        x >= self.x && x < self.x + self.width && y >= self.y && y < self.y + self.height
    }
}

/// Resource: the static city layout
#[derive(Resource, Debug, Clone)]
pub struct CityMap {
    pub width: f32,
    pub height: f32,
    pub horizontal_roads: Vec<f32>,
    pub vertical_roads: Vec<f32>,
    pub tolerance: f32,
    pub buildings: Vec<Structure>,
    pub houses: Vec<Structure>,
}

impl Default for CityMap {
    fn default() -> Self {
        Self::from_config(&MapConfig::default())
    }
}

impl CityMap {
    pub fn from_config(config: &MapConfig) -> Self {
        Self {
            width: config.width,
            height: config.height,
            horizontal_roads: config.horizontal_roads.clone(),
            vertical_roads: config.vertical_roads.clone(),
            tolerance: config.road_tolerance,
            buildings: config.buildings.clone(),
            houses: config.houses.clone(),
        }
    }

    pub fn in_bounds(&self, x: f32, y: f32) -> bool {
        (0.0..=self.width).contains(&x) && (0.0..=self.height).contains(&y)
    }

    pub fn on_horizontal_road(&self, x: f32, y: f32) -> bool {
        self.in_bounds(x, y)
            && self
                .horizontal_roads
                .iter()
                .any(|road| (y - road).abs() < self.tolerance)
    }

    pub fn on_vertical_road(&self, x: f32, y: f32) -> bool {
        self.in_bounds(x, y)
            && self
                .vertical_roads
                .iter()
                .any(|road| (x - road).abs() < self.tolerance)
    }

    pub fn is_on_road(&self, x: f32, y: f32) -> bool {
        self.on_horizontal_road(x, y) || self.on_vertical_road(x, y)
    }

    pub fn road_axis(&self, x: f32, y: f32) -> RoadAxis {
        match (self.on_horizontal_road(x, y), self.on_vertical_road(x, y)) {
            (true, true) => RoadAxis::Intersection,
            (true, false) => RoadAxis::Horizontal,
            (false, true) => RoadAxis::Vertical,
            (false, false) => RoadAxis::OffRoad,
        }
    }

    pub fn axis_at(&self, position: &TilePosition) -> RoadAxis {
        self.road_axis(position.x, position.y)
    }

    /// Uniformly pick a road line, then a point along it
    pub fn random_road_point<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<TilePosition> {
        let total = self.horizontal_roads.len() + self.vertical_roads.len();
        if total == 0 {
            return None;
        }
        let pick = rng.gen_range(0..total);
        let point = if pick < self.horizontal_roads.len() {
            TilePosition::new(rng.gen_range(0.0..=self.width), self.horizontal_roads[pick])
        } else {
            let x = self.vertical_roads[pick - self.horizontal_roads.len()];
            TilePosition::new(x, rng.gen_range(0.0..=self.height))
        };
        Some(point)
    }

    /// Closest point lying exactly on a road line
    pub fn nearest_road_point(&self, position: &TilePosition) -> Option<TilePosition> {
        let x = position.x.clamp(0.0, self.width);
        let y = position.y.clamp(0.0, self.height);

        let horizontal = self
            .horizontal_roads
            .iter()
            .map(|road| TilePosition::new(x, *road));
        let vertical = self
            .vertical_roads
            .iter()
            .map(|road| TilePosition::new(*road, y));

        horizontal.chain(vertical).min_by(|a, b| {
            a.distance_to(position)
                .partial_cmp(&b.distance_to(position))
                .unwrap_or(std::cmp::Ordering::Equal)
        })
    }

    /// Every structure, buildings first
    pub fn structures(&self) -> impl Iterator<Item = &Structure> {
        self.buildings.iter().chain(self.houses.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    #[test]
    fn test_road_predicates() {
        let map = CityMap::default();
        assert!(map.on_horizontal_road(8.0, 6.0));
        assert!(map.on_horizontal_road(8.0, 6.09));
        assert!(!map.on_horizontal_road(8.0, 6.2));
        assert!(map.on_vertical_road(16.05, 2.0));
        assert!(!map.is_on_road(11.0, 9.0));
    }

    #[test]
    fn test_out_of_bounds_is_off_road() {
        let map = CityMap::default();
        assert!(!map.is_on_road(-0.5, 6.0));
        assert!(!map.is_on_road(25.5, 6.0));
        assert!(map.is_on_road(25.0, 6.0));
    }

    #[test]
    fn test_axis_classification() {
        let map = CityMap::default();
        assert_eq!(map.road_axis(8.0, 6.0), RoadAxis::Intersection);
        assert_eq!(map.road_axis(10.0, 6.0), RoadAxis::Horizontal);
        assert_eq!(map.road_axis(16.0, 3.0), RoadAxis::Vertical);
        assert_eq!(map.road_axis(11.0, 9.0), RoadAxis::OffRoad);
    }

    #[test]
    fn test_sampled_headings_match_axis() {
        let mut rng = SmallRng::seed_from_u64(7);
        for _ in 0..50 {
            let h = RoadAxis::Horizontal.sample_heading(&mut rng);
            assert!(HORIZONTAL_HEADINGS.contains(&h));
            let v = RoadAxis::Vertical.sample_heading(&mut rng);
            assert!(VERTICAL_HEADINGS.contains(&v));
            let i = RoadAxis::Intersection.sample_heading(&mut rng);
            assert!(CARDINAL_HEADINGS.contains(&i));
            let o = RoadAxis::OffRoad.sample_heading(&mut rng);
            assert!((0.0..TAU).contains(&o));
        }
    }

    #[test]
    fn test_random_road_points_are_on_road() {
        let map = CityMap::default();
        let mut rng = SmallRng::seed_from_u64(11);
        for _ in 0..200 {
            let p = map.random_road_point(&mut rng).unwrap();
            assert!(map.is_on_road(p.x, p.y), "({}, {}) off road", p.x, p.y);
        }
    }

    #[test]
    fn test_nearest_road_point() {
        let map = CityMap::default();
        let p = map.nearest_road_point(&TilePosition::new(10.0, 7.0)).unwrap();
        assert_eq!(p, TilePosition::new(10.0, 6.0));
        let p = map.nearest_road_point(&TilePosition::new(15.0, 2.0)).unwrap();
        assert_eq!(p, TilePosition::new(16.0, 2.0));
    }

    #[test]
    fn test_default_structures_avoid_roads() {
        let map = CityMap::default();
        for s in map.structures() {
            for road in &map.horizontal_roads {
                assert!(*road <= s.y || *road >= s.y + s.height, "{} blocks a road", s.label);
            }
            for road in &map.vertical_roads {
                assert!(*road <= s.x || *road >= s.x + s.width, "{} blocks a road", s.label);
            }
        }
    }
}
