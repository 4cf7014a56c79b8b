//! Well-known OpenAI-compatible providers, so an operator only has to enter
//! a provider name and key rather than look up the endpoint.

/// An OpenAI-compatible provider reachable with a bearer token.
pub struct KnownProvider {
    /// Lowercase name as stored in `ai_providers.name`.
    pub id: &'static str,
    pub name: &'static str,
    /// Base URL without trailing slash.
    pub base_url: &'static str,
    /// Path appended to the base URL for chat completions.
    pub chat_path: &'static str,
}

impl KnownProvider {
    pub fn endpoint(&self) -> String {
        format!("{}{}", self.base_url, self.chat_path)
    }
}

pub const KNOWN_PROVIDERS: &[KnownProvider] = &[
    KnownProvider {
        id: "deepseek",
        name: "DeepSeek",
        base_url: "https://api.deepseek.com",
        chat_path: "/v1/chat/completions",
    },
    KnownProvider {
        id: "mistral",
        name: "Mistral AI",
        base_url: "https://api.mistral.ai",
        chat_path: "/v1/chat/completions",
    },
    KnownProvider {
        id: "groq",
        name: "Groq",
        base_url: "https://api.groq.com/openai",
        chat_path: "/v1/chat/completions",
    },
    KnownProvider {
        id: "openrouter",
        name: "OpenRouter",
        base_url: "https://openrouter.ai/api",
        chat_path: "/v1/chat/completions",
    },
    KnownProvider {
        id: "xai",
        name: "xAI (Grok)",
        base_url: "https://api.x.ai",
        chat_path: "/v1/chat/completions",
    },
    KnownProvider {
        id: "together",
        name: "Together AI",
        base_url: "https://api.together.xyz",
        chat_path: "/v1/chat/completions",
    },
];

/// Case-insensitive lookup by id.
pub fn lookup(id: &str) -> Option<&'static KnownProvider> {
    KNOWN_PROVIDERS
        .iter()
        .find(|p| p.id.eq_ignore_ascii_case(id.trim()))
}
