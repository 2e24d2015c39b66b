//! ECS Components
//!
//! Agent components, the city map, and the simulation clock.

pub mod agent;
pub mod clock;
pub mod map;

pub use agent::*;
pub use clock::*;
pub use map::*;
