use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use dai_catalog::{Catalog, CatalogError};
use dai_core::config::DISCORD_MESSAGE_LIMIT;
use dai_core::types::BotId;
use dai_memory::{ConversationEntry, ConversationLog, ConversationMemory, MemoryKey};

use crate::pipeline::chunk::split_message;
use crate::pipeline::command::CommandSpec;
use crate::pipeline::sink::ReplySink;
use crate::provider::{CompletionRequest, ProviderError, ProviderFactory};

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("Usage: `{command} <prompt>`")]
    Usage { command: String },

    #[error("{0}")]
    Provider(#[from] ProviderError),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("internal error: {0}")]
    Internal(String),
}

/// Terminal state of one invocation.
#[derive(Debug)]
pub enum DispatchOutcome {
    /// Empty prompt; a usage hint was sent.
    Usage,
    /// The model answered; `chunks` messages were sent.
    Replied { chunks: usize },
    /// The error detail was sent to the user; memory is untouched.
    Failed { error: DispatchError },
}

/// One command invocation as seen by the dispatcher.
#[derive(Debug, Clone)]
pub struct Invocation {
    pub bot_id: BotId,
    pub guild_id: Option<u64>,
    pub channel_id: u64,
    pub user_id: u64,
    pub argument: String,
}

impl Invocation {
    pub fn memory_key(&self) -> MemoryKey {
        MemoryKey::new(self.channel_id, self.user_id)
    }
}

#[derive(Debug, Clone)]
pub struct DispatchSettings {
    pub command_prefix: String,
    pub ack_text: String,
    pub message_limit: usize,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            command_prefix: "!".to_string(),
            ack_text: "Preparing a response...".to_string(),
            message_limit: DISCORD_MESSAGE_LIMIT,
        }
    }
}

/// Result of a successful provider round-trip.
struct Completion {
    reply: String,
    persona: String,
    model: String,
}

/// Turns a command invocation into a provider call, a memory update and
/// chunked replies.
///
/// One dispatcher is shared by every bot instance. Model and provider rows
/// are fetched fresh for each invocation.
pub struct CommandDispatcher {
    catalog: Arc<dyn Catalog>,
    memory: Arc<ConversationMemory>,
    log: Arc<ConversationLog>,
    factory: Arc<dyn ProviderFactory>,
    settings: DispatchSettings,
}

impl CommandDispatcher {
    pub fn new(
        catalog: Arc<dyn Catalog>,
        memory: Arc<ConversationMemory>,
        log: Arc<ConversationLog>,
        factory: Arc<dyn ProviderFactory>,
        settings: DispatchSettings,
    ) -> Self {
        Self {
            catalog,
            memory,
            log,
            factory,
            settings,
        }
    }

    pub fn settings(&self) -> &DispatchSettings {
        &self.settings
    }

    pub fn memory(&self) -> &Arc<ConversationMemory> {
        &self.memory
    }

    pub async fn dispatch(
        &self,
        spec: &CommandSpec,
        inv: &Invocation,
        sink: &dyn ReplySink,
    ) -> DispatchOutcome {
        let prompt = inv.argument.trim();
        if prompt.is_empty() {
            let usage = DispatchError::Usage {
                command: format!("{}{}", self.settings.command_prefix, spec.keyword),
            };
            self.deliver(sink, &usage.to_string()).await;
            return DispatchOutcome::Usage;
        }

        let ack = match sink.acknowledge(&self.settings.ack_text).await {
            Ok(ack) => ack,
            Err(e) => {
                warn!(bot = %inv.bot_id, command = %spec.keyword, error = %e, "failed to post acknowledgment");
                None
            }
        };

        let key = inv.memory_key();
        let result = self.complete(spec, key, prompt).await;

        if let Some(ack) = ack {
            if let Err(e) = sink.retract(ack).await {
                warn!(bot = %inv.bot_id, command = %spec.keyword, error = %e, "failed to remove acknowledgment");
            }
        }

        match result {
            Ok(done) => {
                self.memory
                    .append_exchange(key, prompt, &done.persona, &done.reply);
                self.log.push(ConversationEntry {
                    bot_id: inv.bot_id,
                    guild_id: inv.guild_id,
                    channel_id: inv.channel_id,
                    user_id: inv.user_id,
                    command: spec.keyword.clone(),
                    model: done.model,
                    user_message: prompt.to_string(),
                    bot_response: done.reply.clone(),
                    at: Utc::now(),
                });
                let chunks = self.deliver(sink, &done.reply).await;
                info!(bot = %inv.bot_id, command = %spec.keyword, chunks, "command replied");
                DispatchOutcome::Replied { chunks }
            }
            Err(error) => {
                warn!(bot = %inv.bot_id, command = %spec.keyword, error = %error, "command failed");
                self.deliver(sink, &format!("Error: {error}")).await;
                DispatchOutcome::Failed { error }
            }
        }
    }

    /// Report a failure that happened outside [`dispatch`](Self::dispatch),
    /// such as a panicked dispatch task.
    pub async fn report(&self, sink: &dyn ReplySink, error: &DispatchError) {
        self.deliver(sink, &format!("Error: {error}")).await;
    }

    async fn complete(
        &self,
        spec: &CommandSpec,
        key: MemoryKey,
        prompt: &str,
    ) -> Result<Completion, DispatchError> {
        let model = self
            .catalog
            .model(spec.model_id)?
            .filter(|m| m.is_active)
            .ok_or_else(|| {
                DispatchError::Configuration(format!(
                    "model #{} for `{}` is missing or inactive",
                    spec.model_id, spec.keyword
                ))
            })?;
        let provider = self
            .catalog
            .provider(model.provider_id)?
            .filter(|p| p.is_active)
            .ok_or_else(|| {
                DispatchError::Configuration(format!(
                    "provider #{} for model `{}` is missing or inactive",
                    model.provider_id, model.name
                ))
            })?;
        let adapter = self
            .factory
            .build(&provider)
            .map_err(|e| DispatchError::Configuration(e.to_string()))?;

        let config = model.config();
        let request = CompletionRequest {
            persona: config.persona_prompt().map(str::to_string),
            turns: self.memory.read(key),
            prompt: prompt.to_string(),
            model: model.native_id.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        };

        let reply = adapter.complete(&request).await?;
        Ok(Completion {
            reply,
            persona: config.persona_name(&spec.keyword).to_string(),
            model: model.name,
        })
    }

    /// Send `text` in platform-sized chunks; returns how many were delivered.
    async fn deliver(&self, sink: &dyn ReplySink, text: &str) -> usize {
        let mut sent = 0;
        for chunk in split_message(text, self.settings.message_limit, false) {
            if let Err(e) = sink.send(&chunk).await {
                warn!(error = %e, "failed to send reply chunk");
                break;
            }
            sent += 1;
        }
        sent
    }
}
