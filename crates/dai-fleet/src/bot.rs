use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::watch;

use crate::{
    error::FleetError,
    types::{BotIdentity, BotState},
};

/// One live connection to the messaging platform.
#[async_trait]
pub trait BotConnection: Send + Sync {
    /// Current state without blocking.
    fn state(&self) -> BotState;

    /// Watch state transitions. The sender side going away means `Closed`.
    fn subscribe(&self) -> watch::Receiver<BotState>;

    /// Close the connection and cancel its background task.
    ///
    /// The supervisor bounds this with its own timeout; implementations may
    /// simply await the platform's close handshake.
    async fn close(&self);
}

/// Builds and begins connecting a bot instance.
///
/// `launch` returns as soon as the connection task is running; readiness is
/// reported later through [`BotConnection::subscribe`].
#[async_trait]
pub trait BotLauncher: Send + Sync {
    async fn launch(&self, identity: &BotIdentity) -> Result<Box<dyn BotConnection>, FleetError>;
}

/// Shared, observable [`BotState`] for connection implementations.
#[derive(Clone)]
pub struct StateSignal {
    tx: Arc<watch::Sender<BotState>>,
}

impl StateSignal {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(BotState::Starting);
        Self { tx: Arc::new(tx) }
    }

    pub fn set(&self, state: BotState) {
        self.tx.send_replace(state);
    }

    pub fn get(&self) -> BotState {
        *self.tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<BotState> {
        self.tx.subscribe()
    }
}

impl Default for StateSignal {
    fn default() -> Self {
        Self::new()
    }
}
