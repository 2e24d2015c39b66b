//! Frame Timestamps
//!
//! Simulation time is counted in frames, with the milliseconds of simulated
//! time elapsed alongside so conversation timing can be reproduced exactly.
//!
//! # Example
//!
//! ```
//! use city_events::FrameStamp;
//!
//! let stamp = FrameStamp::new(120, 1920);
//! assert_eq!(stamp.to_string(), "frame_120@1920ms");
//! assert_eq!("frame_120@1920ms".parse::<FrameStamp>().unwrap(), stamp);
//! ```

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Error parsing a frame stamp string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseStampError(pub String);

impl fmt::Display for ParseStampError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid frame stamp: {}", self.0)
    }
}

impl std::error::Error for ParseStampError {}

/// A point in simulation time.
///
/// Serializes to strings like "frame_120@1920ms".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FrameStamp {
    pub frame: u64,
    pub elapsed_ms: u64,
}

impl FrameStamp {
    pub fn new(frame: u64, elapsed_ms: u64) -> Self {
        Self { frame, elapsed_ms }
    }
}

impl fmt::Display for FrameStamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "frame_{}@{}ms", self.frame, self.elapsed_ms)
    }
}

impl FromStr for FrameStamp {
    type Err = ParseStampError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseStampError(s.to_string());
        let rest = s.strip_prefix("frame_").ok_or_else(err)?;
        let (frame, elapsed) = rest.split_once('@').ok_or_else(err)?;
        let elapsed = elapsed.strip_suffix("ms").ok_or_else(err)?;
        Ok(Self {
            frame: frame.parse().map_err(|_| err())?,
            elapsed_ms: elapsed.parse().map_err(|_| err())?,
        })
    }
}

impl Serialize for FrameStamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for FrameStamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stamp_ordering_follows_frames() {
        let early = FrameStamp::new(3, 48);
        let late = FrameStamp::new(4, 64);
        assert!(early < late);
    }

    #[test]
    fn test_stamp_rejects_garbage() {
        assert!("frame_x@10ms".parse::<FrameStamp>().is_err());
        assert!("frame_10@10".parse::<FrameStamp>().is_err());
        assert!("tick_10@10ms".parse::<FrameStamp>().is_err());
    }

    #[test]
    fn test_stamp_serializes_as_string() {
        let json = serde_json::to_string(&FrameStamp::new(7, 112)).unwrap();
        assert_eq!(json, "\"frame_7@112ms\"");
    }
}
