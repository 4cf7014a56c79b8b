use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

pub const DEFAULT_PORT: u16 = 8085;
pub const DEFAULT_BIND: &str = "127.0.0.1";
/// Discord's hard limit on message length, in characters.
pub const DISCORD_MESSAGE_LIMIT: usize = 2000;

/// Top-level config (dai.toml + DAI_* env overrides).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DaiConfig {
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub discord: DiscordConfig,
    #[serde(default)]
    pub fleet: FleetConfig,
    #[serde(default)]
    pub providers: ProvidersConfig,
    #[serde(default)]
    pub memory: MemoryConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

/// Behaviour shared by every bot instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscordConfig {
    /// Prefix that marks a message as a command invocation.
    #[serde(default = "default_prefix")]
    pub command_prefix: String,
    /// When true, plain (non-command) messages are remembered as user turns.
    #[serde(default = "bool_true")]
    pub ambient_memory: bool,
    /// Transient message posted while a provider call is in flight.
    #[serde(default = "default_ack_text")]
    pub ack_text: String,
    /// Reply with an error when a prefixed message names no known command.
    #[serde(default = "bool_true")]
    pub unknown_command_reply: bool,
}

impl Default for DiscordConfig {
    fn default() -> Self {
        Self {
            command_prefix: default_prefix(),
            ambient_memory: true,
            ack_text: default_ack_text(),
            unknown_command_reply: true,
        }
    }
}

/// Supervisor timings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FleetConfig {
    /// How long `start` waits for the gateway to confirm readiness.
    #[serde(default = "default_grace_ms")]
    pub startup_grace_ms: u64,
    /// Pause between stop and start during a restart, lets Discord release the session.
    #[serde(default = "default_restart_pause_ms")]
    pub restart_pause_ms: u64,
    /// Upper bound on the close handshake when stopping a bot.
    #[serde(default = "default_close_timeout_ms")]
    pub close_timeout_ms: u64,
    /// Start every bot flagged active in the catalog when the process boots.
    #[serde(default = "bool_true")]
    pub autostart: bool,
    #[serde(default = "default_restart_queue_depth")]
    pub restart_queue_depth: usize,
}

impl Default for FleetConfig {
    fn default() -> Self {
        Self {
            startup_grace_ms: default_grace_ms(),
            restart_pause_ms: default_restart_pause_ms(),
            close_timeout_ms: default_close_timeout_ms(),
            autostart: true,
            restart_queue_depth: default_restart_queue_depth(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvidersConfig {
    /// Bound on every outbound provider call.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// Turns kept per (channel, user) key.
    #[serde(default = "default_capacity")]
    pub capacity: usize,
    /// Completed exchanges kept in the in-process conversation log.
    #[serde(default = "default_log_capacity")]
    pub log_capacity: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
            log_capacity: default_log_capacity(),
        }
    }
}

fn bool_true() -> bool {
    true
}
fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_bind() -> String {
    DEFAULT_BIND.to_string()
}
fn default_prefix() -> String {
    "!".to_string()
}
fn default_ack_text() -> String {
    "\u{23f3} Preparing a response...".to_string()
}
fn default_grace_ms() -> u64 {
    2_000
}
fn default_restart_pause_ms() -> u64 {
    1_000
}
fn default_close_timeout_ms() -> u64 {
    10_000
}
fn default_restart_queue_depth() -> usize {
    64
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_capacity() -> usize {
    10
}
fn default_log_capacity() -> usize {
    1_000
}
fn default_db_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.dai/dai.db", home)
}

impl DaiConfig {
    /// Load config from a TOML file with DAI_* env var overrides.
    ///
    /// Nested keys are separated by a double underscore, e.g.
    /// `DAI_FLEET__STARTUP_GRACE_MS=5000`. A missing file is not an error;
    /// every field has a default.
    pub fn load(config_path: Option<&str>) -> crate::error::Result<Self> {
        let path = config_path
            .map(String::from)
            .unwrap_or_else(default_config_path);

        Figment::new()
            .merge(Toml::file(&path))
            .merge(Env::prefixed("DAI_").split("__"))
            .extract()
            .map_err(|e| crate::error::DaiError::Config(e.to_string()))
    }
}

fn default_config_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.dai/dai.toml", home)
}
