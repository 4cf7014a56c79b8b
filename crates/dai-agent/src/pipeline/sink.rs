use async_trait::async_trait;

/// Handle to a posted acknowledgment, used to retract it later.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AckHandle(pub u64);

#[derive(Debug, thiserror::Error)]
#[error("reply delivery failed: {0}")]
pub struct SinkError(pub String);

/// Where a dispatcher writes its output for one invocation.
///
/// Implemented per messaging platform; tests use an in-memory recorder.
#[async_trait]
pub trait ReplySink: Send + Sync {
    /// Post the transient "preparing" indicator. `Ok(None)` when the
    /// platform has nothing to retract afterwards.
    async fn acknowledge(&self, text: &str) -> Result<Option<AckHandle>, SinkError>;

    async fn retract(&self, ack: AckHandle) -> Result<(), SinkError>;

    /// Send one already-sized message.
    async fn send(&self, text: &str) -> Result<(), SinkError>;
}
