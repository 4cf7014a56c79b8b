use std::collections::VecDeque;

use dashmap::DashMap;
use tracing::trace;

use crate::types::{MemoryKey, Speaker, Turn};

/// Turns kept per key unless configured otherwise.
pub const DEFAULT_CAPACITY: usize = 10;

/// Bounded per-(channel, user) ring buffer of recent turns.
///
/// One instance is built at startup and shared by every bot, so two bots
/// in the same channel see the same history for a given user.
pub struct ConversationMemory {
    turns: DashMap<MemoryKey, VecDeque<Turn>>,
    capacity: usize,
}

impl ConversationMemory {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// A capacity of zero is treated as one.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            turns: DashMap::new(),
            capacity: capacity.max(1),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Insert at the tail of the key's buffer, evicting the oldest turn when full.
    pub fn append(&self, key: MemoryKey, speaker: Speaker, text: impl Into<String>) {
        let mut buf = self.turns.entry(key).or_default();
        push_bounded(
            &mut buf,
            Turn {
                speaker,
                text: text.into(),
            },
            self.capacity,
        );
        trace!(channel = key.channel_id, user = key.user_id, len = buf.len(), "memory append");
    }

    /// Record a completed exchange: the user's prompt, then the persona's reply.
    ///
    /// Both turns land under one shard lock so a concurrent dispatch on the
    /// same key cannot interleave between them.
    pub fn append_exchange(&self, key: MemoryKey, prompt: &str, persona: &str, reply: &str) {
        let mut buf = self.turns.entry(key).or_default();
        push_bounded(&mut buf, Turn::user(prompt), self.capacity);
        push_bounded(&mut buf, Turn::persona(persona, reply), self.capacity);
    }

    /// Current contents, oldest first. Empty if the key is unseen.
    pub fn read(&self, key: MemoryKey) -> Vec<Turn> {
        self.turns
            .get(&key)
            .map(|buf| buf.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Number of keys with at least one turn.
    pub fn key_count(&self) -> usize {
        self.turns.len()
    }
}

impl Default for ConversationMemory {
    fn default() -> Self {
        Self::new()
    }
}

fn push_bounded(buf: &mut VecDeque<Turn>, turn: Turn, capacity: usize) {
    while buf.len() >= capacity {
        buf.pop_front();
    }
    buf.push_back(turn);
}
