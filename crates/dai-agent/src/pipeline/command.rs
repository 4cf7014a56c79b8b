use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

use tracing::{debug, warn};

use dai_catalog::{Catalog, CatalogError};
use dai_core::types::BotId;

use crate::provider::ProviderKind;

/// Keywords handled by the bot itself; integrations cannot shadow them.
pub const RESERVED_COMMANDS: &[&str] = &["status"];

/// Split `content` into `(keyword, argument)` if it starts with `prefix`.
///
/// The argument is trimmed and may be empty. Returns `None` for messages
/// that are not command invocations, including a bare prefix.
pub fn parse_invocation<'a>(content: &'a str, prefix: &str) -> Option<(&'a str, &'a str)> {
    if prefix.is_empty() {
        return None;
    }
    let rest = content.trim_start().strip_prefix(prefix)?;
    let mut parts = rest.splitn(2, char::is_whitespace);
    let keyword = parts.next().filter(|k| !k.is_empty())?;
    let argument = parts.next().unwrap_or("").trim();
    Some((keyword, argument))
}

/// One model-backed command, built from an integration row.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandSpec {
    pub keyword: String,
    pub integration_id: i64,
    pub model_id: i64,
    /// Model display name at load time, for status output.
    pub label: String,
    /// Provider kind at load time. `None` when the model or provider could
    /// not be resolved; the dispatcher reports that at call time.
    pub provider: Option<ProviderKind>,
}

/// Keyword → command lookup for one bot instance.
///
/// Rebuilt from persisted integrations every time an instance is launched;
/// never patched in place.
#[derive(Debug, Clone, Default)]
pub struct CommandTable {
    commands: BTreeMap<String, CommandSpec>,
}

impl CommandTable {
    pub fn load(catalog: &dyn Catalog, bot_id: BotId, prefix: &str) -> Result<Self, CatalogError> {
        let mut table = Self::default();
        for integration in catalog.integrations_for_bot(bot_id)? {
            let keyword = normalize_keyword(&integration.command, prefix);
            if keyword.is_empty() {
                warn!(bot = %bot_id, integration = integration.id, "integration has an empty command, skipping");
                continue;
            }
            if RESERVED_COMMANDS.contains(&keyword.as_str()) {
                warn!(bot = %bot_id, command = %keyword, "integration shadows a built-in command, skipping");
                continue;
            }
            // `!gpt` and `gpt` are distinct rows but the same command; first row wins.
            if let Some(existing) = table.commands.get(&keyword) {
                warn!(
                    bot = %bot_id,
                    command = %keyword,
                    kept = existing.integration_id,
                    skipped = integration.id,
                    "duplicate command keyword, skipping"
                );
                continue;
            }

            let model = catalog.model(integration.model_id)?;
            let label = model
                .as_ref()
                .map(|m| m.name.clone())
                .unwrap_or_else(|| format!("model #{}", integration.model_id));
            let provider = match &model {
                Some(m) => catalog
                    .provider(m.provider_id)?
                    .and_then(|p| ProviderKind::from_name(&p.name).ok()),
                None => None,
            };

            debug!(bot = %bot_id, command = %keyword, model = %label, "registered command");
            if let Entry::Vacant(slot) = table.commands.entry(keyword.clone()) {
                slot.insert(CommandSpec {
                    keyword,
                    integration_id: integration.id,
                    model_id: integration.model_id,
                    label,
                    provider,
                });
            }
        }
        Ok(table)
    }

    pub fn get(&self, keyword: &str) -> Option<&CommandSpec> {
        self.commands.get(keyword)
    }

    /// Commands in keyword order.
    pub fn iter(&self) -> impl Iterator<Item = &CommandSpec> {
        self.commands.values()
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

/// Stored commands may include the prefix (`!gpt`); the table keys on the bare word.
fn normalize_keyword(raw: &str, prefix: &str) -> String {
    let trimmed = raw.trim();
    let bare = if prefix.is_empty() {
        trimmed
    } else {
        trimmed.strip_prefix(prefix).unwrap_or(trimmed)
    };
    bare.trim().to_string()
}
