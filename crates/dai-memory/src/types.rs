use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use dai_core::types::BotId;

/// Memory is scoped per channel and per user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MemoryKey {
    pub channel_id: u64,
    pub user_id: u64,
}

impl MemoryKey {
    pub fn new(channel_id: u64, user_id: u64) -> Self {
        Self {
            channel_id,
            user_id,
        }
    }
}

/// Who produced a turn: the human, or the persona that answered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Speaker {
    User,
    Persona(String),
}

impl Speaker {
    /// Role label as stored in memory: `"user"` or the persona's name.
    pub fn label(&self) -> &str {
        match self {
            Speaker::User => "user",
            Speaker::Persona(name) => name,
        }
    }

    pub fn is_user(&self) -> bool {
        matches!(self, Speaker::User)
    }
}

/// One (role, text) unit of conversational history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub speaker: Speaker,
    pub text: String,
}

impl Turn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            speaker: Speaker::User,
            text: text.into(),
        }
    }

    pub fn persona(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            speaker: Speaker::Persona(name.into()),
            text: text.into(),
        }
    }
}

/// A completed exchange, kept in the [`ConversationLog`](crate::ConversationLog).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationEntry {
    pub bot_id: BotId,
    pub guild_id: Option<u64>,
    pub channel_id: u64,
    pub user_id: u64,
    pub command: String,
    /// Display name of the model that answered.
    pub model: String,
    pub user_message: String,
    pub bot_response: String,
    pub at: DateTime<Utc>,
}
