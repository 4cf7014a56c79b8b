use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

use dai_core::types::{BotId, BotRecord};

/// Lifecycle of one bot connection. `Absent` is modelled by the supervisor
/// simply not holding the identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BotState {
    Starting,
    Running,
    Closed,
}

/// What the supervisor needs to bring a bot online.
#[derive(Clone)]
pub struct BotIdentity {
    pub id: BotId,
    pub name: String,
    pub token: String,
}

impl fmt::Debug for BotIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BotIdentity")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("token", &"***")
            .finish()
    }
}

impl From<&BotRecord> for BotIdentity {
    fn from(rec: &BotRecord) -> Self {
        Self {
            id: rec.id,
            name: rec.name.clone(),
            token: rec.token.clone(),
        }
    }
}

/// Snapshot of one registered bot.
#[derive(Debug, Clone, Serialize)]
pub struct BotStatus {
    pub id: BotId,
    pub name: String,
    pub state: BotState,
    pub started_at: DateTime<Utc>,
}
