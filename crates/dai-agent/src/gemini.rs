use async_trait::async_trait;
use serde::Deserialize;

use crate::provider::{CompletionRequest, LlmProvider, ProviderError};
use crate::transport::{non_empty, Transport};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Google Gemini `generateContent` adapter.
pub struct GeminiProvider {
    transport: Transport,
    api_key: String,
    base_url: String,
}

impl GeminiProvider {
    pub(crate) fn new(transport: Transport, api_key: String, base_url: Option<String>) -> Self {
        Self {
            transport,
            api_key,
            base_url: base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
        }
    }
}

#[async_trait]
impl LlmProvider for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn complete(&self, req: &CompletionRequest) -> Result<String, ProviderError> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, req.model
        );
        let builder = self
            .transport
            .post(&url)
            .header("x-goog-api-key", &self.api_key);
        let resp: ApiResponse = self
            .transport
            .send_json(self.name(), builder, &build_request_body(req))
            .await?;
        non_empty(self.name(), parse_response(resp))
    }
}

/// Gemini calls the assistant side `model`.
fn build_request_body(req: &CompletionRequest) -> serde_json::Value {
    let contents: Vec<_> = req
        .chat_turns()
        .map(|(role, text)| {
            let role = if role == "assistant" { "model" } else { role };
            serde_json::json!({ "role": role, "parts": [{ "text": text }] })
        })
        .collect();

    let mut generation = serde_json::json!({ "maxOutputTokens": req.max_tokens });
    if let Some(t) = req.temperature {
        generation["temperature"] = serde_json::json!(t);
    }

    let mut body = serde_json::json!({
        "contents": contents,
        "generationConfig": generation,
    });
    if let Some(persona) = &req.persona {
        body["systemInstruction"] = serde_json::json!({ "parts": [{ "text": persona }] });
    }
    body
}

fn parse_response(resp: ApiResponse) -> String {
    resp.candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .map(|content| {
            content
                .parts
                .into_iter()
                .filter_map(|p| p.text)
                .collect::<Vec<_>>()
                .join("")
        })
        .unwrap_or_default()
}

#[derive(Deserialize)]
struct ApiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
}

#[derive(Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Deserialize)]
struct Part {
    #[serde(default)]
    text: Option<String>,
}
