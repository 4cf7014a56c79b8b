use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use serenity::gateway::ShardManager;
use serenity::model::gateway::GatewayIntents;
use serenity::Client;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use dai_agent::pipeline::{CommandDispatcher, CommandTable};
use dai_catalog::Catalog;
use dai_core::config::DiscordConfig;
use dai_core::types::BotId;
use dai_fleet::{BotConnection, BotIdentity, BotLauncher, BotState, FleetError, StateSignal};

use crate::error::DiscordError;
use crate::handler::DiscordHandler;

/// Builds serenity clients for the supervisor.
///
/// Each launch re-reads the bot's integrations, so a restarted bot always
/// serves the commands currently in the catalog.
pub struct DiscordLauncher {
    catalog: Arc<dyn Catalog>,
    dispatcher: Arc<CommandDispatcher>,
    config: DiscordConfig,
}

impl DiscordLauncher {
    pub fn new(
        catalog: Arc<dyn Catalog>,
        dispatcher: Arc<CommandDispatcher>,
        config: &DiscordConfig,
    ) -> Self {
        Self {
            catalog,
            dispatcher,
            config: config.clone(),
        }
    }

    fn intents() -> GatewayIntents {
        GatewayIntents::GUILDS
            | GatewayIntents::GUILD_MESSAGES
            | GatewayIntents::DIRECT_MESSAGES
            | GatewayIntents::MESSAGE_CONTENT
    }

    async fn build(&self, identity: &BotIdentity) -> Result<DiscordConnection, DiscordError> {
        if identity.token.trim().is_empty() {
            return Err(DiscordError::NoToken);
        }

        let commands = CommandTable::load(
            self.catalog.as_ref(),
            identity.id,
            &self.config.command_prefix,
        )?;
        info!(bot = %identity.id, commands = commands.len(), "command table built");

        let signal = StateSignal::new();
        let handler = DiscordHandler {
            bot_id: identity.id,
            bot_name: identity.name.clone(),
            commands: Arc::new(commands),
            dispatcher: Arc::clone(&self.dispatcher),
            config: self.config.clone(),
            signal: signal.clone(),
            bot_user: OnceLock::new(),
        };

        let mut client = Client::builder(identity.token.trim(), Self::intents())
            .event_handler(handler)
            .await?;
        let shard_manager = Arc::clone(&client.shard_manager);

        let id = identity.id;
        let task_signal = signal.clone();
        let task = tokio::spawn(async move {
            match client.start().await {
                Ok(()) => info!(bot = %id, "Discord gateway stopped"),
                Err(e) => warn!(bot = %id, error = %e, "Discord gateway stopped with error"),
            }
            task_signal.set(BotState::Closed);
        });

        Ok(DiscordConnection {
            id,
            signal,
            shard_manager,
            task,
        })
    }
}

#[async_trait]
impl BotLauncher for DiscordLauncher {
    async fn launch(&self, identity: &BotIdentity) -> Result<Box<dyn BotConnection>, FleetError> {
        let connection = self
            .build(identity)
            .await
            .map_err(|e| e.into_fleet(identity.id))?;
        Ok(Box::new(connection))
    }
}

/// A running serenity client: the gateway task plus its shard manager.
pub struct DiscordConnection {
    id: BotId,
    signal: StateSignal,
    shard_manager: Arc<ShardManager>,
    task: JoinHandle<()>,
}

#[async_trait]
impl BotConnection for DiscordConnection {
    fn state(&self) -> BotState {
        self.signal.get()
    }

    fn subscribe(&self) -> watch::Receiver<BotState> {
        self.signal.subscribe()
    }

    async fn close(&self) {
        info!(bot = %self.id, "closing Discord gateway");
        self.shard_manager.shutdown_all().await;
        self.task.abort();
        self.signal.set(BotState::Closed);
    }
}

impl Drop for DiscordConnection {
    fn drop(&mut self) {
        self.task.abort();
    }
}
