use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use tracing::warn;

/// Default completion budget when a model's configuration does not set one.
pub const DEFAULT_MAX_TOKENS: u32 = 1024;

/// Primary key of a persisted Discord bot. Also the supervisor registry key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BotId(pub i64);

impl BotId {
    pub fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for BotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for BotId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// A persisted bot identity (`discord_bots` row).
#[derive(Clone, Serialize, Deserialize)]
pub struct BotRecord {
    pub id: BotId,
    pub name: String,
    #[serde(skip_serializing)]
    pub token: String,
    pub is_active: bool,
}

impl fmt::Debug for BotRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BotRecord")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("token", &"***")
            .field("is_active", &self.is_active)
            .finish()
    }
}

/// A persisted AI provider (`ai_providers` row).
///
/// `name` is free text as entered by the operator; the agent crate resolves it
/// to a closed provider kind at call time.
#[derive(Clone, Serialize, Deserialize)]
pub struct ProviderDescriptor {
    pub id: i64,
    pub name: String,
    #[serde(skip_serializing)]
    pub api_key: String,
    /// Overrides the provider's default endpoint (required for generic bearer providers).
    pub base_url: Option<String>,
    pub is_active: bool,
}

impl fmt::Debug for ProviderDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderDescriptor")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("api_key", &"***")
            .field("base_url", &self.base_url)
            .field("is_active", &self.is_active)
            .finish()
    }
}

/// A persisted model (`ai_models` row).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelDescriptor {
    pub id: i64,
    /// Display name shown to operators.
    pub name: String,
    pub provider_id: i64,
    /// Provider-native model identifier sent on the wire (e.g. `gpt-4o`).
    pub native_id: String,
    /// Raw JSON configuration string, see [`ModelConfig`].
    pub configuration: String,
    pub is_active: bool,
}

impl ModelDescriptor {
    pub fn config(&self) -> ModelConfig {
        ModelConfig::parse(&self.configuration)
    }
}

/// A persisted binding of (bot, model, invocation keyword).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandIntegration {
    pub id: i64,
    pub bot_id: BotId,
    pub model_id: i64,
    pub command: String,
}

/// Free-form per-model settings stored as JSON in `ai_models.configuration`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default)]
    pub behavior: Option<String>,
    #[serde(default)]
    pub persona: Option<String>,
    /// Persona display name, used as the speaker role in conversation memory.
    #[serde(default)]
    pub name: Option<String>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            temperature: None,
            max_tokens: DEFAULT_MAX_TOKENS,
            behavior: None,
            persona: None,
            name: None,
        }
    }
}

impl ModelConfig {
    /// Parse a configuration string. Each key is read on its own, so one
    /// ill-typed field falls back to its default without dropping the rest.
    /// Empty or non-object input yields defaults.
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        if raw.is_empty() {
            return Self::default();
        }
        let value: Value = match serde_json::from_str(raw) {
            Ok(v) => v,
            Err(e) => {
                warn!(error = %e, "malformed model configuration, using defaults");
                return Self::default();
            }
        };
        let Some(obj) = value.as_object() else {
            warn!("model configuration is not a JSON object, using defaults");
            return Self::default();
        };

        Self {
            temperature: obj.get("temperature").and_then(number).map(|t| t as f32),
            max_tokens: obj
                .get("max_tokens")
                .and_then(number)
                .filter(|n| n.is_finite() && *n >= 1.0 && *n <= u32::MAX as f64)
                .map(|n| n as u32)
                .unwrap_or(DEFAULT_MAX_TOKENS),
            behavior: obj.get("behavior").and_then(text),
            persona: obj.get("persona").and_then(text),
            name: obj.get("name").and_then(text),
        }
    }

    /// The system-level instruction injected ahead of the conversation.
    /// `behavior` takes precedence over `persona`; blank strings count as unset.
    pub fn persona_prompt(&self) -> Option<&str> {
        [self.behavior.as_deref(), self.persona.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .find(|s| !s.is_empty())
    }

    /// Speaker name recorded for the model's turns.
    pub fn persona_name<'a>(&'a self, keyword: &'a str) -> &'a str {
        self.name
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(keyword)
    }
}

fn default_max_tokens() -> u32 {
    DEFAULT_MAX_TOKENS
}

/// Numbers, and numeric strings as some editors store them.
fn number(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn text(v: &Value) -> Option<String> {
    v.as_str().map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_configuration_uses_defaults() {
        let cfg = ModelConfig::parse("");
        assert_eq!(cfg, ModelConfig::default());
        assert_eq!(cfg.max_tokens, DEFAULT_MAX_TOKENS);
        assert!(cfg.persona_prompt().is_none());
    }

    #[test]
    fn malformed_configuration_falls_back() {
        let cfg = ModelConfig::parse("{not json");
        assert_eq!(cfg, ModelConfig::default());
    }

    #[test]
    fn behavior_wins_over_persona() {
        let cfg = ModelConfig::parse(
            r#"{"temperature":0.2,"max_tokens":256,"behavior":"Be terse.","persona":"Pirate"}"#,
        );
        assert_eq!(cfg.temperature, Some(0.2));
        assert_eq!(cfg.max_tokens, 256);
        assert_eq!(cfg.persona_prompt(), Some("Be terse."));
    }

    #[test]
    fn float_max_tokens_keeps_persona() {
        let cfg = ModelConfig::parse(
            r#"{"temperature":0.7,"max_tokens":2000.0,"behavior":"Act as a pirate"}"#,
        );
        assert_eq!(cfg.persona_prompt(), Some("Act as a pirate"));
        assert_eq!(cfg.max_tokens, 2000);
        assert_eq!(cfg.temperature, Some(0.7));
    }

    #[test]
    fn null_sibling_falls_back_per_field() {
        let cfg = ModelConfig::parse(r#"{"max_tokens":null,"behavior":"Act as a pirate"}"#);
        assert_eq!(cfg.persona_prompt(), Some("Act as a pirate"));
        assert_eq!(cfg.max_tokens, DEFAULT_MAX_TOKENS);
    }

    #[test]
    fn string_numbers_are_accepted() {
        let cfg = ModelConfig::parse(
            r#"{"temperature":"0.5","max_tokens":"300","persona":"Be kind."}"#,
        );
        assert_eq!(cfg.temperature, Some(0.5));
        assert_eq!(cfg.max_tokens, 300);
        assert_eq!(cfg.persona_prompt(), Some("Be kind."));
    }

    #[test]
    fn ill_typed_fields_are_ignored() {
        let cfg = ModelConfig::parse(
            r#"{"temperature":"warm","max_tokens":-5,"behavior":42,"persona":"Be kind.","name":["x"]}"#,
        );
        assert_eq!(cfg.temperature, None);
        assert_eq!(cfg.max_tokens, DEFAULT_MAX_TOKENS);
        assert_eq!(cfg.persona_prompt(), Some("Be kind."));
        assert_eq!(cfg.persona_name("gpt"), "gpt");
    }

    #[test]
    fn blank_behavior_falls_through_to_persona() {
        let cfg = ModelConfig::parse(r#"{"behavior":"  ","persona":"You are a pirate."}"#);
        assert_eq!(cfg.persona_prompt(), Some("You are a pirate."));
    }

    #[test]
    fn persona_name_defaults_to_keyword() {
        let cfg = ModelConfig::default();
        assert_eq!(cfg.persona_name("gpt"), "gpt");

        let named = ModelConfig::parse(r#"{"name":"Ada"}"#);
        assert_eq!(named.persona_name("gpt"), "Ada");
    }

    #[test]
    fn debug_redacts_secrets() {
        let bot = BotRecord {
            id: BotId(1),
            name: "alpha".into(),
            token: "super-secret".into(),
            is_active: true,
        };
        let rendered = format!("{bot:?}");
        assert!(!rendered.contains("super-secret"));
        assert!(rendered.contains("***"));
    }
}
