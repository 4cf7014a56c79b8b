use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

use crate::types::ConversationEntry;

/// Bounded, in-process record of completed exchanges, newest last.
pub struct ConversationLog {
    entries: Mutex<VecDeque<ConversationEntry>>,
    capacity: usize,
}

impl ConversationLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(VecDeque::new()),
            capacity: capacity.max(1),
        }
    }

    pub fn push(&self, entry: ConversationEntry) {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        if entries.len() >= self.capacity {
            entries.pop_front();
        }
        entries.push_back(entry);
    }

    /// Most recent `limit` entries, newest first.
    pub fn recent(&self, limit: usize) -> Vec<ConversationEntry> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.iter().rev().take(limit).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use dai_core::types::BotId;

    fn entry(n: usize) -> ConversationEntry {
        ConversationEntry {
            bot_id: BotId(1),
            guild_id: None,
            channel_id: 1,
            user_id: 1,
            command: "gpt".into(),
            model: "GPT X".into(),
            user_message: format!("q{n}"),
            bot_response: format!("a{n}"),
            at: Utc::now(),
        }
    }

    #[test]
    fn drops_oldest_past_capacity() {
        let log = ConversationLog::new(2);
        for n in 0..3 {
            log.push(entry(n));
        }
        assert_eq!(log.len(), 2);
        let recent = log.recent(10);
        assert_eq!(recent[0].user_message, "q2");
        assert_eq!(recent[1].user_message, "q1");
    }

    #[test]
    fn recent_respects_limit() {
        let log = ConversationLog::new(10);
        assert!(log.is_empty());
        for n in 0..5 {
            log.push(entry(n));
        }
        assert_eq!(log.recent(2).len(), 2);
    }
}
