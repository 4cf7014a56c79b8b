//! Short-term conversational memory and the in-process conversation log.
//!
//! Nothing here is persisted: both structures live as long as the process.

pub mod log;
pub mod manager;
pub mod types;

pub use log::ConversationLog;
pub use manager::{ConversationMemory, DEFAULT_CAPACITY};
pub use types::{ConversationEntry, MemoryKey, Speaker, Turn};
