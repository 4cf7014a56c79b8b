use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::{mapref::entry::Entry, DashMap};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio::time::{sleep, timeout, Duration};
use tracing::{debug, info, warn};

use dai_core::config::FleetConfig;
use dai_core::types::BotId;

use crate::{
    bot::{BotConnection, BotLauncher},
    error::FleetError,
    types::{BotIdentity, BotState, BotStatus},
};

/// Supervisor timings.
#[derive(Debug, Clone)]
pub struct SupervisorSettings {
    /// How long `start` waits for the connection to report ready.
    pub grace: Duration,
    /// Pause between stop and start during a restart.
    pub restart_pause: Duration,
    /// Upper bound on a connection's close handshake.
    pub close_timeout: Duration,
}

impl From<&FleetConfig> for SupervisorSettings {
    fn from(cfg: &FleetConfig) -> Self {
        Self {
            grace: Duration::from_millis(cfg.startup_grace_ms),
            restart_pause: Duration::from_millis(cfg.restart_pause_ms),
            close_timeout: Duration::from_millis(cfg.close_timeout_ms),
        }
    }
}

impl Default for SupervisorSettings {
    fn default() -> Self {
        Self::from(&FleetConfig::default())
    }
}

struct Slot {
    name: String,
    generation: u64,
    started_at: DateTime<Utc>,
    connection: Box<dyn BotConnection>,
}

type Registry = Arc<DashMap<BotId, Slot>>;

/// Owns every running bot instance, keyed by bot id.
///
/// Operations for different ids are independent. Callers serialize
/// operations on the same id through [`BotSupervisor::lock`].
pub struct BotSupervisor {
    launcher: Arc<dyn BotLauncher>,
    bots: Registry,
    locks: DashMap<BotId, Arc<Mutex<()>>>,
    generation: AtomicU64,
    settings: SupervisorSettings,
}

impl BotSupervisor {
    pub fn new(launcher: Arc<dyn BotLauncher>, settings: SupervisorSettings) -> Self {
        Self {
            launcher,
            bots: Arc::new(DashMap::new()),
            locks: DashMap::new(),
            generation: AtomicU64::new(0),
            settings,
        }
    }

    /// Exclusive lifecycle access to one id. Hold the guard across
    /// `start`/`stop`/`restart` and whatever is recorded from their result.
    pub async fn lock(&self, id: BotId) -> OwnedMutexGuard<()> {
        let lock = Arc::clone(self.locks.entry(id).or_default().value());
        lock.lock_owned().await
    }

    /// Launch a bot and wait up to the grace period for it to come online.
    ///
    /// Fails with [`FleetError::Duplicate`] if the id is already registered.
    /// A bot that is not running when the grace period ends is closed and
    /// evicted before [`FleetError::Connection`] is returned.
    pub async fn start(&self, identity: BotIdentity) -> Result<(), FleetError> {
        let id = identity.id;
        if self.bots.contains_key(&id) {
            return Err(FleetError::Duplicate { id });
        }

        info!(bot = %id, name = %identity.name, "starting bot");
        let connection = self.launcher.launch(&identity).await?;
        let mut rx = connection.subscribe();
        let generation = self.generation.fetch_add(1, Ordering::Relaxed);

        let rejected = match self.bots.entry(id) {
            Entry::Occupied(_) => Some(connection),
            Entry::Vacant(slot) => {
                slot.insert(Slot {
                    name: identity.name.clone(),
                    generation,
                    started_at: Utc::now(),
                    connection,
                });
                None
            }
        };
        if let Some(connection) = rejected {
            warn!(bot = %id, "bot registered concurrently, discarding new connection");
            close_bounded(id, connection.as_ref(), self.settings.close_timeout).await;
            return Err(FleetError::Duplicate { id });
        }

        let state = {
            let settled = timeout(
                self.settings.grace,
                rx.wait_for(|s| *s != BotState::Starting),
            )
            .await;
            match settled {
                Ok(Ok(state)) => *state,
                Ok(Err(_)) => BotState::Closed,
                Err(_) => BotState::Starting,
            }
        };

        if state != BotState::Running {
            let reason = match state {
                BotState::Starting => format!(
                    "not ready after {}ms",
                    self.settings.grace.as_millis()
                ),
                _ => "connection closed during startup".to_string(),
            };
            warn!(bot = %id, %reason, "bot failed to start, evicting");
            if let Some((_, slot)) = self.bots.remove_if(&id, |_, s| s.generation == generation) {
                close_bounded(id, slot.connection.as_ref(), self.settings.close_timeout).await;
            }
            return Err(FleetError::Connection { id, reason });
        }

        self.watch_for_disconnect(id, generation, rx);
        info!(bot = %id, name = %identity.name, "bot running");
        Ok(())
    }

    /// Close and forget a bot. Absent ids are a no-op.
    pub async fn stop(&self, id: BotId) -> Result<(), FleetError> {
        let Some((_, slot)) = self.bots.remove(&id) else {
            debug!(bot = %id, "stop requested for absent bot");
            return Ok(());
        };
        info!(bot = %id, name = %slot.name, "stopping bot");
        close_bounded(id, slot.connection.as_ref(), self.settings.close_timeout).await;
        Ok(())
    }

    /// Stop (best effort), pause, then start. Behaves as `start` for unknown ids.
    pub async fn restart(&self, identity: BotIdentity) -> Result<(), FleetError> {
        let id = identity.id;
        if let Err(e) = self.stop(id).await {
            warn!(bot = %id, error = %e, "stop during restart failed, continuing");
        }
        sleep(self.settings.restart_pause).await;
        self.start(identity).await
    }

    /// True iff the bot is registered and its connection reports running.
    pub fn status(&self, id: BotId) -> bool {
        self.bots
            .get(&id)
            .map(|slot| slot.connection.state() == BotState::Running)
            .unwrap_or(false)
    }

    pub fn get(&self, id: BotId) -> Option<BotStatus> {
        self.bots.get(&id).map(|slot| snapshot(id, &slot))
    }

    /// Every registered bot, ordered by id.
    pub fn statuses(&self) -> Vec<BotStatus> {
        let mut out: Vec<BotStatus> = self
            .bots
            .iter()
            .map(|entry| snapshot(*entry.key(), entry.value()))
            .collect();
        out.sort_by_key(|s| s.id);
        out
    }

    pub fn len(&self) -> usize {
        self.bots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bots.is_empty()
    }

    /// Stop every registered bot. Used on process shutdown.
    pub async fn shutdown_all(&self) {
        let ids: Vec<BotId> = self.bots.iter().map(|e| *e.key()).collect();
        info!(count = ids.len(), "shutting down all bots");
        for id in ids {
            let _guard = self.lock(id).await;
            if let Err(e) = self.stop(id).await {
                warn!(bot = %id, error = %e, "error while stopping bot");
            }
        }
    }

    /// Evict the instance if its connection closes on its own. A later
    /// instance under the same id has a different generation and is kept.
    fn watch_for_disconnect(
        &self,
        id: BotId,
        generation: u64,
        mut rx: tokio::sync::watch::Receiver<BotState>,
    ) {
        let bots = Arc::clone(&self.bots);
        let close_timeout = self.settings.close_timeout;
        tokio::spawn(async move {
            // Err means the sender is gone, which is a close as well.
            let _ = rx.wait_for(|s| *s == BotState::Closed).await;
            if let Some((_, slot)) = bots.remove_if(&id, |_, s| s.generation == generation) {
                warn!(bot = %id, name = %slot.name, "bot connection closed, evicted");
                close_bounded(id, slot.connection.as_ref(), close_timeout).await;
            }
        });
    }
}

fn snapshot(id: BotId, slot: &Slot) -> BotStatus {
    BotStatus {
        id,
        name: slot.name.clone(),
        state: slot.connection.state(),
        started_at: slot.started_at,
    }
}

async fn close_bounded(id: BotId, connection: &dyn BotConnection, limit: Duration) {
    if timeout(limit, connection.close()).await.is_err() {
        warn!(bot = %id, timeout_ms = limit.as_millis() as u64, "close handshake timed out");
    }
}
