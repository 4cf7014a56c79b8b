use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

use dai_core::types::ProviderDescriptor;
use dai_memory::Turn;

use crate::anthropic::AnthropicProvider;
use crate::bearer::BearerProvider;
use crate::gemini::GeminiProvider;
use crate::openai::OpenAiProvider;
use crate::registry;
use crate::transport::Transport;

/// Uniform request handed to every adapter.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    /// System-level instruction, injected ahead of the conversation when set.
    pub persona: Option<String>,
    /// Prior turns for this (channel, user) key, oldest first.
    pub turns: Vec<Turn>,
    pub prompt: String,
    /// Provider-native model identifier.
    pub model: String,
    pub temperature: Option<f32>,
    pub max_tokens: u32,
}

impl CompletionRequest {
    /// Prior turns followed by the new prompt, as (role, text) pairs using
    /// the chat-style `user` / `assistant` vocabulary.
    pub fn chat_turns(&self) -> impl Iterator<Item = (&'static str, &str)> {
        self.turns
            .iter()
            .map(|t| (chat_role(t), t.text.as_str()))
            .chain(std::iter::once(("user", self.prompt.as_str())))
    }
}

/// `user` turns stay `user`; anything said by a persona is the model's side.
pub fn chat_role(turn: &Turn) -> &'static str {
    if turn.speaker.is_user() {
        "user"
    } else {
        "assistant"
    }
}

/// Common interface for all completion providers.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Provider name for logging and error messages.
    fn name(&self) -> &str;

    /// One network call; never retried by this layer.
    async fn complete(&self, req: &CompletionRequest) -> Result<String, ProviderError>;
}

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({status}): {body}")]
    Api { status: u16, body: String },

    #[error("request timed out after {secs}s")]
    Timeout { secs: u64 },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("unsupported provider: {0}")]
    Unsupported(String),
}

impl ProviderError {
    /// HTTP status carried by the error, if the provider answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            ProviderError::Api { status, .. } => Some(*status),
            ProviderError::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

/// Closed set of wire formats this system speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    OpenAi,
    Anthropic,
    Gemini,
    /// Any OpenAI-compatible endpoint authenticated with a bearer token.
    Bearer,
}

impl ProviderKind {
    /// Resolve a persisted provider name. Matching is case-insensitive.
    pub fn from_name(name: &str) -> Result<Self, ProviderError> {
        let normalized = name.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "openai" => Ok(Self::OpenAi),
            "anthropic" | "claude" => Ok(Self::Anthropic),
            "gemini" | "google" => Ok(Self::Gemini),
            "bearer" | "custom" | "openai-compatible" => Ok(Self::Bearer),
            other if registry::lookup(other).is_some() => Ok(Self::Bearer),
            _ => Err(ProviderError::Unsupported(name.trim().to_string())),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Anthropic => "anthropic",
            Self::Gemini => "gemini",
            Self::Bearer => "bearer",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Builds an adapter from a freshly fetched provider descriptor.
///
/// Called once per invocation so rotated credentials apply immediately.
pub trait ProviderFactory: Send + Sync {
    fn build(&self, provider: &ProviderDescriptor) -> Result<Arc<dyn LlmProvider>, ProviderError>;
}

/// Production factory: one shared HTTP client with a bounded timeout.
pub struct HttpProviderFactory {
    transport: Transport,
}

impl HttpProviderFactory {
    pub fn new(timeout_secs: u64) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;
        Ok(Self {
            transport: Transport::new(client, timeout_secs),
        })
    }
}

impl ProviderFactory for HttpProviderFactory {
    fn build(&self, provider: &ProviderDescriptor) -> Result<Arc<dyn LlmProvider>, ProviderError> {
        let kind = ProviderKind::from_name(&provider.name)?;
        let key = provider.api_key.clone();
        let base_url = provider
            .base_url
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .map(|u| u.trim_end_matches('/').to_string());
        let transport = self.transport.clone();

        let adapter: Arc<dyn LlmProvider> = match kind {
            ProviderKind::OpenAi => Arc::new(OpenAiProvider::new(transport, key, base_url)),
            ProviderKind::Anthropic => Arc::new(AnthropicProvider::new(transport, key, base_url)),
            ProviderKind::Gemini => Arc::new(GeminiProvider::new(transport, key, base_url)),
            ProviderKind::Bearer => Arc::new(BearerProvider::resolve(
                transport,
                &provider.name,
                key,
                base_url,
            )?),
        };
        Ok(adapter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(name: &str, base_url: Option<&str>) -> ProviderDescriptor {
        ProviderDescriptor {
            id: 1,
            name: name.to_string(),
            api_key: "k".to_string(),
            base_url: base_url.map(String::from),
            is_active: true,
        }
    }

    #[test]
    fn resolves_known_names() {
        assert_eq!(ProviderKind::from_name("OpenAI").unwrap(), ProviderKind::OpenAi);
        assert_eq!(ProviderKind::from_name(" anthropic ").unwrap(), ProviderKind::Anthropic);
        assert_eq!(ProviderKind::from_name("Gemini").unwrap(), ProviderKind::Gemini);
        assert_eq!(ProviderKind::from_name("DeepSeek").unwrap(), ProviderKind::Bearer);
        assert_eq!(ProviderKind::from_name("mistral").unwrap(), ProviderKind::Bearer);
    }

    #[test]
    fn unknown_name_is_unsupported() {
        let err = ProviderKind::from_name("Cohere").unwrap_err();
        assert!(matches!(err, ProviderError::Unsupported(ref n) if n == "Cohere"));
        assert!(err.to_string().contains("Cohere"));
    }

    #[test]
    fn generic_bearer_requires_base_url() {
        let factory = HttpProviderFactory::new(5).unwrap();
        assert!(factory.build(&descriptor("custom", None)).is_err());
        let adapter = factory
            .build(&descriptor("custom", Some("http://localhost:1234/")))
            .unwrap();
        assert_eq!(adapter.name(), "custom");
    }

    #[test]
    fn chat_turns_end_with_prompt() {
        let req = CompletionRequest {
            persona: None,
            turns: vec![Turn::user("a"), Turn::persona("gpt", "b")],
            prompt: "c".into(),
            model: "m".into(),
            temperature: None,
            max_tokens: 10,
        };
        let turns: Vec<_> = req.chat_turns().collect();
        assert_eq!(turns, vec![("user", "a"), ("assistant", "b"), ("user", "c")]);
    }
}
