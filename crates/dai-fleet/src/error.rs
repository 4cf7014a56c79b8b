use thiserror::Error;

use dai_core::types::BotId;

/// Errors returned by supervisor operations. None of them are fatal to the process.
#[derive(Debug, Error)]
pub enum FleetError {
    /// `start` was called for an identifier that is already registered.
    #[error("bot {id} is already running")]
    Duplicate { id: BotId },

    /// The platform connection was not confirmed within the grace period,
    /// or dropped afterwards. The instance has been evicted.
    #[error("bot {id} failed to connect: {reason}")]
    Connection { id: BotId, reason: String },

    /// The instance could not be built (bad token, catalog failure, ...).
    #[error("bot {id} could not be set up: {reason}")]
    Setup { id: BotId, reason: String },

    #[error("unknown bot {id}")]
    Unknown { id: BotId },

    #[error("restart queue unavailable: {0}")]
    Queue(String),
}

impl FleetError {
    /// True when a bot is left running after a lifecycle call returned
    /// `result`. A duplicate means another caller already started it.
    pub fn leaves_running(result: &Result<(), FleetError>) -> bool {
        matches!(result, Ok(()) | Err(FleetError::Duplicate { .. }))
    }
}
