use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use tracing::{info, warn};

use dai_agent::pipeline::{CommandDispatcher, DispatchSettings};
use dai_agent::HttpProviderFactory;
use dai_catalog::{Catalog, SqliteCatalog};
use dai_core::config::{DaiConfig, DISCORD_MESSAGE_LIMIT};
use dai_discord::DiscordLauncher;
use dai_fleet::{BotIdentity, BotSupervisor, RestartQueue, SupervisorSettings};
use dai_memory::{ConversationLog, ConversationMemory};

mod app;
mod http;

/// D.AI gateway: runs the Discord bot fleet and its ops HTTP surface.
#[derive(Debug, Parser)]
#[command(name = "dai-gateway", version, about)]
struct Cli {
    /// Path to the TOML config file (falls back to DAI_CONFIG, then ~/.dai/dai.toml).
    #[arg(long, env = "DAI_CONFIG")]
    config: Option<String>,

    /// Override `gateway.bind`.
    #[arg(long)]
    bind: Option<String>,

    /// Override `gateway.port`.
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "dai_gateway=info,dai_discord=info,dai_fleet=info,dai_agent=info,tower_http=info"
                    .into()
            }),
        )
        .init();

    let cli = Cli::parse();
    let mut config = DaiConfig::load(cli.config.as_deref()).unwrap_or_else(|e| {
        warn!("Config load failed ({}), using defaults", e);
        DaiConfig::default()
    });
    if let Some(bind) = cli.bind {
        config.gateway.bind = bind;
    }
    if let Some(port) = cli.port {
        config.gateway.port = port;
    }

    let db_path = &config.database.path;
    ensure_parent_dir(db_path);
    info!(path = %db_path, "opening SQLite catalog");
    let catalog: Arc<dyn Catalog> = Arc::new(SqliteCatalog::open(db_path)?);

    let memory = Arc::new(ConversationMemory::with_capacity(config.memory.capacity));
    let log = Arc::new(ConversationLog::new(config.memory.log_capacity));
    let factory = Arc::new(HttpProviderFactory::new(config.providers.timeout_secs)?);
    let dispatcher = Arc::new(CommandDispatcher::new(
        Arc::clone(&catalog),
        Arc::clone(&memory),
        Arc::clone(&log),
        factory,
        DispatchSettings {
            command_prefix: config.discord.command_prefix.clone(),
            ack_text: config.discord.ack_text.clone(),
            message_limit: DISCORD_MESSAGE_LIMIT,
        },
    ));

    let launcher = Arc::new(DiscordLauncher::new(
        Arc::clone(&catalog),
        dispatcher,
        &config.discord,
    ));
    let supervisor = Arc::new(BotSupervisor::new(
        launcher,
        SupervisorSettings::from(&config.fleet),
    ));
    let (restarts, restart_worker) = RestartQueue::spawn(
        Arc::clone(&supervisor),
        Arc::clone(&catalog),
        config.fleet.restart_queue_depth,
    );

    if config.fleet.autostart {
        autostart(catalog.as_ref(), &supervisor).await;
    }

    let addr: SocketAddr = format!("{}:{}", config.gateway.bind, config.gateway.port).parse()?;
    let state = Arc::new(app::AppState::new(
        config,
        Arc::clone(&catalog),
        Arc::clone(&supervisor),
        restarts,
        memory,
        log,
    ));
    let router = app::build_router(state);

    info!("D.AI gateway listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("shutting down bot fleet");
    supervisor.shutdown_all().await;
    restart_worker.abort();
    Ok(())
}

/// Start every bot whose catalog row is marked active. Failures flip the
/// row to inactive so the catalog reflects what is actually running.
async fn autostart(catalog: &dyn Catalog, supervisor: &BotSupervisor) {
    let bots = match catalog.bots() {
        Ok(bots) => bots,
        Err(e) => {
            warn!(error = %e, "could not list bots for autostart");
            return;
        }
    };

    for record in bots.iter().filter(|b| b.is_active) {
        let _guard = supervisor.lock(record.id).await;
        match supervisor.start(BotIdentity::from(record)).await {
            Ok(()) => info!(bot = %record.id, name = %record.name, "bot autostarted"),
            Err(e) => {
                warn!(bot = %record.id, name = %record.name, error = %e, "autostart failed");
                if let Err(e) = catalog.set_bot_active(record.id, false) {
                    warn!(bot = %record.id, error = %e, "failed to record bot activity");
                }
            }
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
    info!("Ctrl-C received");
}

fn ensure_parent_dir(path: &str) {
    if let Some(parent) = std::path::Path::new(path).parent() {
        let _ = std::fs::create_dir_all(parent);
    }
}
