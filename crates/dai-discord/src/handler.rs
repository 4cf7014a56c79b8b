use std::sync::{Arc, OnceLock};

use serenity::async_trait;
use serenity::builder::CreateMessage;
use serenity::model::channel::Message;
use serenity::model::event::ResumedEvent;
use serenity::model::gateway::Ready;
use serenity::model::id::UserId;
use serenity::prelude::{Context, EventHandler};
use tracing::{error, info, warn};

use dai_agent::pipeline::{
    parse_invocation, CommandDispatcher, CommandSpec, CommandTable, DispatchError, Invocation,
};
use dai_core::config::DiscordConfig;
use dai_core::types::BotId;
use dai_fleet::{BotState, StateSignal};
use dai_memory::{MemoryKey, Speaker};

use crate::embed::StatusSummary;
use crate::send::ChannelSink;

/// What an inbound message asks for.
#[derive(Debug, PartialEq)]
pub enum Route<'a> {
    Status,
    Command { spec: &'a CommandSpec, argument: &'a str },
    Unknown { keyword: &'a str },
    /// Plain chat; remembered as a user turn.
    Ambient(&'a str),
    Ignore,
}

/// Classify a message against this bot's command table.
pub fn route<'a>(content: &'a str, prefix: &str, table: &'a CommandTable) -> Route<'a> {
    match parse_invocation(content, prefix) {
        Some(("status", _)) => Route::Status,
        Some((keyword, argument)) => match table.get(keyword) {
            Some(spec) => Route::Command { spec, argument },
            None => Route::Unknown { keyword },
        },
        None => {
            let text = content.trim();
            if text.is_empty() {
                Route::Ignore
            } else {
                Route::Ambient(text)
            }
        }
    }
}

/// Serenity event handler for one bot instance.
pub struct DiscordHandler {
    pub bot_id: BotId,
    pub bot_name: String,
    pub commands: Arc<CommandTable>,
    pub dispatcher: Arc<CommandDispatcher>,
    pub config: DiscordConfig,
    pub signal: StateSignal,
    pub bot_user: OnceLock<UserId>,
}

#[async_trait]
impl EventHandler for DiscordHandler {
    async fn ready(&self, _ctx: Context, ready: Ready) {
        self.bot_user.set(ready.user.id).ok();
        self.signal.set(BotState::Running);
        info!(
            bot = %self.bot_id,
            user = %ready.user.name,
            guilds = ready.guilds.len(),
            commands = self.commands.len(),
            "Discord bot connected"
        );
    }

    async fn resume(&self, _ctx: Context, _event: ResumedEvent) {
        self.signal.set(BotState::Running);
        info!(bot = %self.bot_id, "Discord session resumed");
    }

    async fn message(&self, ctx: Context, msg: Message) {
        if msg.author.bot {
            return;
        }
        if self.bot_user.get() == Some(&msg.author.id) {
            return;
        }

        match route(&msg.content, &self.config.command_prefix, &self.commands) {
            Route::Status => self.send_status(&ctx, &msg).await,
            Route::Command { spec, argument } => {
                self.spawn_dispatch(&ctx, &msg, spec.clone(), argument.to_string())
            }
            Route::Unknown { keyword } => {
                if self.config.unknown_command_reply {
                    let text = format!(
                        "Error executing command: unknown command `{}{}`",
                        self.config.command_prefix, keyword
                    );
                    if let Err(e) = msg.channel_id.say(&ctx.http, text).await {
                        warn!(bot = %self.bot_id, error = %e, "failed to send unknown-command reply");
                    }
                }
            }
            Route::Ambient(text) => {
                if self.config.ambient_memory {
                    let key = MemoryKey::new(msg.channel_id.get(), msg.author.id.get());
                    self.dispatcher.memory().append(key, Speaker::User, text);
                }
            }
            Route::Ignore => {}
        }
    }
}

impl DiscordHandler {
    async fn send_status(&self, ctx: &Context, msg: &Message) {
        let summary = StatusSummary::new(
            &self.bot_name,
            self.bot_user.get().map(|u| u.get()),
            &self.config.command_prefix,
            &self.commands,
        );
        let builder = CreateMessage::new().embed(summary.to_create_embed());
        if let Err(e) = msg.channel_id.send_message(ctx, builder).await {
            warn!(bot = %self.bot_id, error = %e, "failed to send status embed");
        }
    }

    /// Run the dispatch on its own task so a slow provider never blocks the
    /// gateway, and a panic inside it is reported instead of lost.
    fn spawn_dispatch(&self, ctx: &Context, msg: &Message, spec: CommandSpec, argument: String) {
        let dispatcher = Arc::clone(&self.dispatcher);
        let sink = ChannelSink::new(Arc::clone(&ctx.http), msg.channel_id);
        let invocation = Invocation {
            bot_id: self.bot_id,
            guild_id: msg.guild_id.map(|g| g.get()),
            channel_id: msg.channel_id.get(),
            user_id: msg.author.id.get(),
            argument,
        };
        let bot_id = self.bot_id;

        tokio::spawn(async move {
            let keyword = spec.keyword.clone();
            let inner = {
                let dispatcher = Arc::clone(&dispatcher);
                let sink = sink.clone();
                tokio::spawn(async move {
                    dispatcher.dispatch(&spec, &invocation, &sink).await;
                })
            };
            if let Err(e) = inner.await {
                if e.is_panic() {
                    error!(bot = %bot_id, command = %keyword, "dispatch task panicked");
                    let err = DispatchError::Internal(format!("command `{keyword}` crashed"));
                    dispatcher.report(&sink, &err).await;
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_is_ambient() {
        let table = CommandTable::default();
        assert_eq!(route("  hi there ", "!", &table), Route::Ambient("hi there"));
        assert_eq!(route("   ", "!", &table), Route::Ignore);
    }

    #[test]
    fn status_is_builtin() {
        let table = CommandTable::default();
        assert_eq!(route("!status", "!", &table), Route::Status);
        assert_eq!(route("!status extra", "!", &table), Route::Status);
    }

    #[test]
    fn registered_keyword_routes_to_command() {
        let catalog = dai_catalog::SqliteCatalog::open_in_memory().unwrap();
        catalog
            .execute_batch(
                "INSERT INTO ai_providers (id, name, api_key) VALUES (1, 'openai', 'k');
                 INSERT INTO ai_models (id, name, provider_id, model_id) VALUES (1, 'GPT X', 1, 'gpt-x');
                 INSERT INTO discord_bots (id, name, token) VALUES (1, 'alpha', 't');
                 INSERT INTO bot_model_integrations (bot_id, model_id, command) VALUES (1, 1, 'gpt');",
            )
            .unwrap();
        let table = CommandTable::load(&catalog, BotId(1), "!").unwrap();

        match route("!gpt  tell me a joke", "!", &table) {
            Route::Command { spec, argument } => {
                assert_eq!(spec.keyword, "gpt");
                assert_eq!(argument, "tell me a joke");
            }
            other => panic!("unexpected route {other:?}"),
        }
        assert_eq!(
            route("!gpt", "!", &table),
            Route::Command {
                spec: table.get("gpt").unwrap(),
                argument: ""
            }
        );
    }

    #[test]
    fn unregistered_keyword_is_unknown() {
        let table = CommandTable::default();
        assert_eq!(route("!nope hi", "!", &table), Route::Unknown { keyword: "nope" });
    }
}
