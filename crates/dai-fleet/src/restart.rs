use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use dai_catalog::Catalog;
use dai_core::types::BotId;

use crate::{error::FleetError, supervisor::BotSupervisor, types::BotIdentity};

/// Background restarts requested after an external change to a bot's data.
///
/// `enqueue` returns immediately; a single worker drains the queue in order
/// and applies each restart. Failures are logged, never reported back.
#[derive(Clone)]
pub struct RestartQueue {
    tx: mpsc::Sender<BotId>,
}

impl RestartQueue {
    /// Create the queue and spawn its worker on the current runtime.
    pub fn spawn(
        supervisor: Arc<BotSupervisor>,
        catalog: Arc<dyn Catalog>,
        depth: usize,
    ) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(depth.max(1));
        let handle = tokio::spawn(run_worker(rx, supervisor, catalog));
        (Self { tx }, handle)
    }

    pub fn enqueue(&self, id: BotId) -> Result<(), FleetError> {
        self.tx.try_send(id).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => FleetError::Queue("queue is full".into()),
            mpsc::error::TrySendError::Closed(_) => FleetError::Queue("worker has stopped".into()),
        })
    }
}

async fn run_worker(
    mut rx: mpsc::Receiver<BotId>,
    supervisor: Arc<BotSupervisor>,
    catalog: Arc<dyn Catalog>,
) {
    while let Some(id) = rx.recv().await {
        if let Err(e) = apply(id, &supervisor, catalog.as_ref()).await {
            warn!(bot = %id, error = %e, "background restart failed");
        }
    }
    info!("restart queue closed");
}

/// Restart a bot from its current catalog row. A bot that no longer exists
/// is stopped instead.
async fn apply(id: BotId, supervisor: &BotSupervisor, catalog: &dyn Catalog) -> Result<(), FleetError> {
    let _guard = supervisor.lock(id).await;
    let record = catalog.bot(id).map_err(|e| FleetError::Setup {
        id,
        reason: e.to_string(),
    })?;

    let Some(record) = record else {
        info!(bot = %id, "bot removed from catalog, stopping");
        return supervisor.stop(id).await;
    };

    info!(bot = %id, name = %record.name, "background restart");
    let result = supervisor.restart(BotIdentity::from(&record)).await;
    if let Err(e) = catalog.set_bot_active(id, FleetError::leaves_running(&result)) {
        error!(bot = %id, error = %e, "failed to record bot activity");
    }
    result
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use tokio::sync::watch;
    use tokio::time::{sleep, Duration};

    use dai_catalog::SqliteCatalog;

    use super::*;
    use crate::bot::{BotConnection, BotLauncher, StateSignal};
    use crate::supervisor::SupervisorSettings;
    use crate::types::BotState;

    struct InstantConnection(StateSignal);

    #[async_trait]
    impl BotConnection for InstantConnection {
        fn state(&self) -> BotState {
            self.0.get()
        }
        fn subscribe(&self) -> watch::Receiver<BotState> {
            self.0.subscribe()
        }
        async fn close(&self) {
            self.0.set(BotState::Closed);
        }
    }

    #[derive(Default)]
    struct CountingLauncher {
        launches: AtomicUsize,
    }

    #[async_trait]
    impl BotLauncher for CountingLauncher {
        async fn launch(&self, _identity: &BotIdentity) -> Result<Box<dyn BotConnection>, FleetError> {
            self.launches.fetch_add(1, Ordering::SeqCst);
            let signal = StateSignal::new();
            signal.set(BotState::Running);
            Ok(Box::new(InstantConnection(signal)))
        }
    }

    fn settings() -> SupervisorSettings {
        SupervisorSettings {
            grace: Duration::from_millis(100),
            restart_pause: Duration::from_millis(1),
            close_timeout: Duration::from_millis(50),
        }
    }

    #[tokio::test]
    async fn enqueued_restart_starts_bot_and_marks_active() {
        let catalog = Arc::new(SqliteCatalog::open_in_memory().unwrap());
        catalog
            .execute_batch("INSERT INTO discord_bots (id, name, token) VALUES (1, 'alpha', 't');")
            .unwrap();
        let launcher = Arc::new(CountingLauncher::default());
        let supervisor = Arc::new(BotSupervisor::new(launcher.clone(), settings()));
        let (queue, _worker) = RestartQueue::spawn(supervisor.clone(), catalog.clone(), 8);

        queue.enqueue(BotId(1)).unwrap();
        for _ in 0..100 {
            if supervisor.status(BotId(1)) {
                break;
            }
            sleep(Duration::from_millis(5)).await;
        }

        assert!(supervisor.status(BotId(1)));
        assert_eq!(launcher.launches.load(Ordering::SeqCst), 1);
        for _ in 0..100 {
            if catalog.bot(BotId(1)).unwrap().unwrap().is_active {
                break;
            }
            sleep(Duration::from_millis(5)).await;
        }
        assert!(catalog.bot(BotId(1)).unwrap().unwrap().is_active);
    }

    #[tokio::test]
    async fn worker_waits_for_the_lifecycle_lock() {
        let catalog = Arc::new(SqliteCatalog::open_in_memory().unwrap());
        catalog
            .execute_batch("INSERT INTO discord_bots (id, name, token) VALUES (1, 'alpha', 't');")
            .unwrap();
        let launcher = Arc::new(CountingLauncher::default());
        let supervisor = Arc::new(BotSupervisor::new(launcher.clone(), settings()));
        let (queue, _worker) = RestartQueue::spawn(supervisor.clone(), catalog.clone(), 8);

        let guard = supervisor.lock(BotId(1)).await;
        queue.enqueue(BotId(1)).unwrap();
        sleep(Duration::from_millis(30)).await;
        assert_eq!(launcher.launches.load(Ordering::SeqCst), 0);

        drop(guard);
        for _ in 0..100 {
            if catalog.bot(BotId(1)).unwrap().unwrap().is_active {
                break;
            }
            sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(launcher.launches.load(Ordering::SeqCst), 1);
        assert!(supervisor.status(BotId(1)));
    }

    #[tokio::test]
    async fn unknown_bot_is_stopped_not_started() {
        let catalog = Arc::new(SqliteCatalog::open_in_memory().unwrap());
        let launcher = Arc::new(CountingLauncher::default());
        let supervisor = Arc::new(BotSupervisor::new(launcher.clone(), settings()));
        let (queue, worker) = RestartQueue::spawn(supervisor.clone(), catalog, 8);

        queue.enqueue(BotId(7)).unwrap();
        drop(queue);
        worker.await.unwrap();

        assert_eq!(launcher.launches.load(Ordering::SeqCst), 0);
        assert!(supervisor.is_empty());
    }
}
