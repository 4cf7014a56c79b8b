//! Discord bot instances: one serenity client per bot identity.

pub mod adapter;
pub mod embed;
pub mod error;
pub mod handler;
pub mod send;

pub use adapter::{DiscordConnection, DiscordLauncher};
pub use error::DiscordError;
