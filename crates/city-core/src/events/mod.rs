//! Event System
//!
//! Events are queued during a frame and written out at the end of it.

pub mod logger;

pub use logger::*;
