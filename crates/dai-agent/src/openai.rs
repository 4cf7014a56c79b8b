use async_trait::async_trait;
use serde::Deserialize;

use crate::provider::{CompletionRequest, LlmProvider, ProviderError};
use crate::transport::{non_empty, Transport};

const DEFAULT_BASE_URL: &str = "https://api.openai.com";

pub struct OpenAiProvider {
    transport: Transport,
    api_key: String,
    base_url: String,
}

impl OpenAiProvider {
    pub(crate) fn new(transport: Transport, api_key: String, base_url: Option<String>) -> Self {
        Self {
            transport,
            api_key,
            base_url: base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
        }
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }

    async fn complete(&self, req: &CompletionRequest) -> Result<String, ProviderError> {
        let url = format!("{}/v1/chat/completions", self.base_url);
        let builder = self.transport.post(&url).bearer_auth(&self.api_key);
        let resp: ChatResponse = self
            .transport
            .send_json(self.name(), builder, &build_request_body(req))
            .await?;
        non_empty(self.name(), resp.into_text())
    }
}

/// Chat-completions body, shared with every OpenAI-compatible endpoint.
/// The persona, if any, is the leading `system` message.
pub(crate) fn build_request_body(req: &CompletionRequest) -> serde_json::Value {
    let mut messages = Vec::with_capacity(req.turns.len() + 2);
    if let Some(persona) = &req.persona {
        messages.push(serde_json::json!({ "role": "system", "content": persona }));
    }
    for (role, text) in req.chat_turns() {
        messages.push(serde_json::json!({ "role": role, "content": text }));
    }

    let mut body = serde_json::json!({
        "model": req.model,
        "messages": messages,
        "max_tokens": req.max_tokens,
    });
    if let Some(t) = req.temperature {
        body["temperature"] = serde_json::json!(t);
    }
    body
}

#[derive(Deserialize)]
pub(crate) struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

impl ChatResponse {
    pub(crate) fn into_text(self) -> String {
        self.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default()
    }
}
