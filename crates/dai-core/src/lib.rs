pub mod config;
pub mod error;
pub mod types;

pub use config::DaiConfig;
pub use error::{DaiError, Result};
pub use types::{BotId, BotRecord, CommandIntegration, ModelConfig, ModelDescriptor, ProviderDescriptor};
