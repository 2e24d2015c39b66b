//! Event Logger
//!
//! Append-only JSONL event logging, plus the in-frame queue that systems
//! record into.

use bevy_ecs::prelude::*;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;

use city_events::{generate_event_id, EventKind, FrameStamp, SimEvent};

enum Sink {
    File(BufWriter<File>),
    Memory(Vec<SimEvent>),
    Null,
}

/// Resource for logging events
#[derive(Resource)]
pub struct EventLogger {
    sink: Sink,
    event_count: u64,
}

impl EventLogger {
    /// Create a new event logger writing to the specified path
    pub fn new(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;

        Ok(Self {
            sink: Sink::File(BufWriter::new(file)),
            event_count: 0,
        })
    }

    /// Create a logger that keeps events in memory
    pub fn memory() -> Self {
        Self {
            sink: Sink::Memory(Vec::new()),
            event_count: 0,
        }
    }

    /// Create a logger that discards events
    pub fn null() -> Self {
        Self {
            sink: Sink::Null,
            event_count: 0,
        }
    }

    pub fn event_count(&self) -> u64 {
        self.event_count
    }

    /// Events held by a memory logger; empty for other sinks
    pub fn recorded(&self) -> &[SimEvent] {
        match &self.sink {
            Sink::Memory(events) => events,
            _ => &[],
        }
    }

    pub fn log(&mut self, event: &SimEvent) -> std::io::Result<()> {
        self.event_count += 1;
        match &mut self.sink {
            Sink::File(writer) => {
                let json = serde_json::to_string(event)?;
                writeln!(writer, "{}", json)?;
            }
            Sink::Memory(events) => events.push(event.clone()),
            Sink::Null => {}
        }
        Ok(())
    }

    pub fn log_batch(&mut self, events: &[SimEvent]) -> std::io::Result<()> {
        for event in events {
            self.log(event)?;
        }
        Ok(())
    }

    /// Flush the buffer to disk
    pub fn flush(&mut self) -> std::io::Result<()> {
        if let Sink::File(writer) = &mut self.sink {
            writer.flush()?;
        }
        Ok(())
    }
}

impl Drop for EventLogger {
    fn drop(&mut self) {
        if let Err(e) = self.flush() {
            tracing::warn!(error = %e, "Failed to flush event logger");
        }
    }
}

/// Events recorded during the current frame
#[derive(Resource, Debug)]
pub struct PendingEvents {
    events: Vec<SimEvent>,
    next_event_id: u64,
}

impl Default for PendingEvents {
    fn default() -> Self {
        Self {
            events: Vec::new(),
            next_event_id: 1,
        }
    }
}

impl PendingEvents {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an event, assigning it the next id
    pub fn record(&mut self, stamp: FrameStamp, kind: EventKind) {
        let id = generate_event_id(self.next_event_id);
        self.next_event_id += 1;
        self.events.push(SimEvent::new(id, stamp, kind));
    }

    pub fn drain(&mut self) -> Vec<SimEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }
}

/// System: write the frame's events to the logger
pub fn flush_events(mut pending: ResMut<PendingEvents>, mut logger: ResMut<EventLogger>) {
    if pending.is_empty() {
        return;
    }
    let events = pending.drain();
    for event in &events {
        tracing::trace!(event_id = %event.event_id, kind = event.kind.label(), "Event");
    }
    if let Err(e) = logger.log_batch(&events) {
        tracing::warn!(error = %e, "Failed to write events");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use city_events::{ConversationKey, EndReason};
    use std::io::BufRead;

    fn ended() -> EventKind {
        EventKind::ConversationEnded {
            key: ConversationKey::new(1, 2).unwrap(),
            reason: EndReason::Expired,
        }
    }

    #[test]
    fn test_file_logging() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.jsonl");
        let mut pending = PendingEvents::new();
        pending.record(FrameStamp::new(1, 16), ended());

        {
            let mut logger = EventLogger::new(&path).unwrap();
            logger.log_batch(&pending.drain()).unwrap();
            logger.flush().unwrap();
        }

        let file = File::open(&path).unwrap();
        let lines: Vec<String> = std::io::BufReader::new(file)
            .lines()
            .map(|l| l.unwrap())
            .collect();
        assert_eq!(lines.len(), 1);

        let parsed: SimEvent = serde_json::from_str(&lines[0]).unwrap();
        assert_eq!(parsed.event_id, "evt_00000001");
        assert_eq!(parsed.stamp, FrameStamp::new(1, 16));
    }

    #[test]
    fn test_null_logger_counts() {
        let mut logger = EventLogger::null();
        let event = SimEvent::new("evt_1", FrameStamp::new(0, 0), ended());
        logger.log(&event).unwrap();
        assert_eq!(logger.event_count(), 1);
        assert!(logger.recorded().is_empty());
    }

    #[test]
    fn test_memory_logger_keeps_events() {
        let mut logger = EventLogger::memory();
        let event = SimEvent::new("evt_1", FrameStamp::new(0, 0), ended());
        logger.log(&event).unwrap();
        assert_eq!(logger.recorded(), &[event]);
    }

    #[test]
    fn test_pending_ids_are_sequential() {
        let mut pending = PendingEvents::new();
        pending.record(FrameStamp::new(0, 0), ended());
        pending.record(FrameStamp::new(0, 0), ended());
        let first = pending.drain();
        pending.record(FrameStamp::new(1, 16), ended());
        let second = pending.drain();

        assert_eq!(first[0].event_id, "evt_00000001");
        assert_eq!(first[1].event_id, "evt_00000002");
        assert_eq!(second[0].event_id, "evt_00000003");
        assert!(pending.is_empty());
    }
}
