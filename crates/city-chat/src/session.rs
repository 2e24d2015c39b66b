//! Chat Sessions
//!
//! Per-address chat history. The store is an explicit value owned by the
//! chat service; sessions are created on first use and evicted when idle
//! too long or when the store is full (least recently used first).

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::llm::ChatMessage;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub max_sessions: usize,
    #[serde(with = "secs")]
    pub idle_ttl: Duration,
    /// History kept per session, oldest dropped first
    pub max_turns: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_sessions: 256,
            idle_ttl: Duration::from_secs(30 * 60),
            max_turns: 20,
        }
    }
}

mod secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_secs(u64::deserialize(d)?))
    }
}

/// One agent's chat state
#[derive(Debug, Clone)]
pub struct ChatSession {
    pub id: Uuid,
    pub address: String,
    turns: VecDeque<ChatMessage>,
    max_turns: usize,
    pub created_at: Instant,
    pub last_used: Instant,
}

impl ChatSession {
    fn new(address: String, max_turns: usize, now: Instant) -> Self {
        Self {
            id: Uuid::new_v4(),
            address,
            turns: VecDeque::new(),
            max_turns,
            created_at: now,
            last_used: now,
        }
    }

    pub fn push(&mut self, message: ChatMessage) {
        self.turns.push_back(message);
        while self.turns.len() > self.max_turns {
            self.turns.pop_front();
        }
    }

    pub fn history(&self) -> Vec<ChatMessage> {
        self.turns.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}

/// Sessions keyed by agent address
#[derive(Debug, Default)]
pub struct SessionStore {
    config: SessionConfig,
    sessions: HashMap<String, ChatSession>,
}

impl SessionStore {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            config,
            sessions: HashMap::new(),
        }
    }

    /// Fetch the session for `address`, creating it if needed, and mark it used
    pub fn get_or_create(&mut self, address: &str, now: Instant) -> &mut ChatSession {
        if !self.sessions.contains_key(address) && self.sessions.len() >= self.config.max_sessions {
            self.evict_lru();
        }
        let max_turns = self.config.max_turns;
        let session = self
            .sessions
            .entry(address.to_string())
            .or_insert_with(|| {
                tracing::debug!(address, "Chat session created");
                ChatSession::new(address.to_string(), max_turns, now)
            });
        session.last_used = now;
        session
    }

    pub fn get(&self, address: &str) -> Option<&ChatSession> {
        self.sessions.get(address)
    }

    pub fn remove(&mut self, address: &str) -> Option<ChatSession> {
        self.sessions.remove(address)
    }

    /// Drop sessions unused for longer than the idle TTL. Returns how many.
    pub fn evict_idle(&mut self, now: Instant) -> usize {
        let ttl = self.config.idle_ttl;
        let before = self.sessions.len();
        self.sessions
            .retain(|_, s| now.saturating_duration_since(s.last_used) <= ttl);
        let evicted = before - self.sessions.len();
        if evicted > 0 {
            tracing::debug!(evicted, "Evicted idle chat sessions");
        }
        evicted
    }

    fn evict_lru(&mut self) {
        let oldest = self
            .sessions
            .values()
            .min_by_key(|s| s.last_used)
            .map(|s| s.address.clone());
        if let Some(address) = oldest {
            tracing::debug!(address = %address, "Evicting least recently used chat session");
            self.sessions.remove(&address);
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(max_sessions: usize, ttl_secs: u64, max_turns: usize) -> SessionStore {
        SessionStore::new(SessionConfig {
            max_sessions,
            idle_ttl: Duration::from_secs(ttl_secs),
            max_turns,
        })
    }

    #[test]
    fn test_get_or_create_reuses_session() {
        let mut store = store(4, 60, 10);
        let now = Instant::now();
        let id = store.get_or_create("0xa", now).id;
        store.get_or_create("0xa", now).push(ChatMessage::user("hi"));
        assert_eq!(store.len(), 1);
        assert_eq!(store.get("0xa").unwrap().id, id);
        assert_eq!(store.get("0xa").unwrap().len(), 1);
    }

    #[test]
    fn test_history_is_bounded() {
        let mut store = store(4, 60, 3);
        let session = store.get_or_create("0xa", Instant::now());
        for i in 0..5 {
            session.push(ChatMessage::user(format!("m{}", i)));
        }
        let history = session.history();
        assert_eq!(history.len(), 3);
        assert_eq!(history[0].content, "m2");
    }

    #[test]
    fn test_capacity_evicts_least_recently_used() {
        let mut store = store(2, 600, 10);
        let t0 = Instant::now();
        store.get_or_create("0xa", t0);
        store.get_or_create("0xb", t0 + Duration::from_secs(1));
        // touch a so b becomes the oldest
        store.get_or_create("0xa", t0 + Duration::from_secs(2));
        store.get_or_create("0xc", t0 + Duration::from_secs(3));

        assert_eq!(store.len(), 2);
        assert!(store.get("0xa").is_some());
        assert!(store.get("0xb").is_none());
        assert!(store.get("0xc").is_some());
    }

    #[test]
    fn test_idle_eviction() {
        let mut store = store(8, 10, 10);
        let t0 = Instant::now();
        store.get_or_create("0xa", t0);
        store.get_or_create("0xb", t0 + Duration::from_secs(8));

        assert_eq!(store.evict_idle(t0 + Duration::from_secs(15)), 1);
        assert!(store.get("0xa").is_none());
        assert!(store.get("0xb").is_some());
        assert!(store.remove("0xb").is_some());
        assert!(store.is_empty());
    }
}
