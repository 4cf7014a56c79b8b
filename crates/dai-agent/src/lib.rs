//! Provider adapters and the channel-agnostic command pipeline.

pub mod anthropic;
pub mod bearer;
pub mod gemini;
pub mod openai;
pub mod pipeline;
pub mod provider;
pub mod registry;
mod transport;

pub use provider::{
    CompletionRequest, HttpProviderFactory, LlmProvider, ProviderError, ProviderFactory,
    ProviderKind,
};
