//! Supervisor for running bot connections, keyed by bot id.
//!
//! Platform specifics live behind [`BotLauncher`] / [`BotConnection`];
//! this crate only knows lifecycle states.

pub mod bot;
pub mod error;
pub mod restart;
pub mod supervisor;
pub mod types;

pub use bot::{BotConnection, BotLauncher, StateSignal};
pub use error::FleetError;
pub use restart::RestartQueue;
pub use supervisor::{BotSupervisor, SupervisorSettings};
pub use types::{BotIdentity, BotState, BotStatus};
