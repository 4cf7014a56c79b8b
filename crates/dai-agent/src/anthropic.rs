use async_trait::async_trait;
use serde::Deserialize;

use crate::provider::{CompletionRequest, LlmProvider, ProviderError};
use crate::transport::{non_empty, Transport};

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const API_VERSION: &str = "2023-06-01";

pub struct AnthropicProvider {
    transport: Transport,
    api_key: String,
    base_url: String,
}

impl AnthropicProvider {
    pub(crate) fn new(transport: Transport, api_key: String, base_url: Option<String>) -> Self {
        Self {
            transport,
            api_key,
            base_url: base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
        }
    }
}

#[async_trait]
impl LlmProvider for AnthropicProvider {
    fn name(&self) -> &str {
        "anthropic"
    }

    async fn complete(&self, req: &CompletionRequest) -> Result<String, ProviderError> {
        let url = format!("{}/v1/messages", self.base_url);
        let builder = self
            .transport
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION);
        let resp: ApiResponse = self
            .transport
            .send_json(self.name(), builder, &build_request_body(req))
            .await?;
        non_empty(self.name(), parse_response(resp))
    }
}

/// Messages API body. The persona travels in the top-level `system` field.
fn build_request_body(req: &CompletionRequest) -> serde_json::Value {
    let messages: Vec<_> = req
        .chat_turns()
        .map(|(role, text)| serde_json::json!({ "role": role, "content": text }))
        .collect();

    let mut body = serde_json::json!({
        "model": req.model,
        "max_tokens": req.max_tokens,
        "messages": messages,
    });
    if let Some(persona) = &req.persona {
        body["system"] = serde_json::json!(persona);
    }
    if let Some(t) = req.temperature {
        body["temperature"] = serde_json::json!(t);
    }
    body
}

fn parse_response(resp: ApiResponse) -> String {
    resp.content
        .into_iter()
        .filter_map(|block| match block {
            ContentBlock::Text { text } => Some(text),
            ContentBlock::Other => None,
        })
        .collect::<Vec<_>>()
        .join("")
}

#[derive(Deserialize)]
struct ApiResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
#[serde(tag = "type")]
enum ContentBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(other)]
    Other,
}
