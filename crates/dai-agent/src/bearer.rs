use async_trait::async_trait;

use crate::openai::{build_request_body, ChatResponse};
use crate::provider::{CompletionRequest, LlmProvider, ProviderError};
use crate::registry;
use crate::transport::{non_empty, Transport};

const DEFAULT_CHAT_PATH: &str = "/v1/chat/completions";

/// Generic OpenAI-compatible adapter authenticated with a bearer token
/// (DeepSeek, Mistral, Groq, self-hosted gateways, ...).
pub struct BearerProvider {
    transport: Transport,
    name: String,
    api_key: String,
    endpoint: String,
}

impl BearerProvider {
    /// Endpoint comes from the descriptor's base URL when set, otherwise
    /// from the known-provider registry. A generic bearer provider with no
    /// base URL cannot be called.
    pub(crate) fn resolve(
        transport: Transport,
        name: &str,
        api_key: String,
        base_url: Option<String>,
    ) -> Result<Self, ProviderError> {
        let name = name.trim().to_ascii_lowercase();
        let known = registry::lookup(&name);
        let chat_path = known.map(|k| k.chat_path).unwrap_or(DEFAULT_CHAT_PATH);
        let endpoint = match (base_url, known) {
            (Some(base), _) => format!("{base}{chat_path}"),
            (None, Some(k)) => k.endpoint(),
            (None, None) => {
                return Err(ProviderError::Unsupported(format!(
                    "{name} (no base URL configured)"
                )))
            }
        };
        Ok(Self {
            transport,
            name,
            api_key,
            endpoint,
        })
    }
}

#[async_trait]
impl LlmProvider for BearerProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(&self, req: &CompletionRequest) -> Result<String, ProviderError> {
        let builder = self
            .transport
            .post(&self.endpoint)
            .bearer_auth(&self.api_key);
        let resp: ChatResponse = self
            .transport
            .send_json(&self.name, builder, &build_request_body(req))
            .await?;
        non_empty(&self.name, resp.into_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transport() -> Transport {
        Transport::new(reqwest::Client::new(), 30)
    }

    #[test]
    fn known_provider_uses_registry_endpoint() {
        let p = BearerProvider::resolve(transport(), "DeepSeek", "k".into(), None).unwrap();
        assert_eq!(p.endpoint, "https://api.deepseek.com/v1/chat/completions");
        assert_eq!(p.name(), "deepseek");
    }

    #[test]
    fn base_url_overrides_registry() {
        let p = BearerProvider::resolve(
            transport(),
            "mistral",
            "k".into(),
            Some("http://127.0.0.1:9000".into()),
        )
        .unwrap();
        assert_eq!(p.endpoint, "http://127.0.0.1:9000/v1/chat/completions");
    }

    #[test]
    fn generic_without_base_url_is_unsupported() {
        let err = BearerProvider::resolve(transport(), "custom", "k".into(), None)
            .err()
            .unwrap();
        assert!(matches!(err, ProviderError::Unsupported(_)));
    }
}
