//! Simulation Clock
//!
//! Frames advance a fixed number of simulated milliseconds, so conversation
//! timing is reproducible regardless of wall-clock speed.

use bevy_ecs::prelude::*;

use city_events::FrameStamp;

#[derive(Resource, Debug, Clone)]
pub struct SimClock {
    frame: u64,
    now_ms: u64,
    frame_ms: u64,
}

impl SimClock {
    pub fn new(frame_ms: u64) -> Self {
        Self {
            frame: 0,
            now_ms: 0,
            frame_ms,
        }
    }

    pub fn advance(&mut self) {
        self.frame += 1;
        self.now_ms += self.frame_ms;
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }

    pub fn now_ms(&self) -> u64 {
        self.now_ms
    }

    pub fn frame_ms(&self) -> u64 {
        self.frame_ms
    }

    pub fn stamp(&self) -> FrameStamp {
        FrameStamp::new(self.frame, self.now_ms)
    }
}

/// First system of every frame
pub fn advance_clock(mut clock: ResMut<SimClock>) {
    clock.advance();
}
