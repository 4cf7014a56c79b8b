use std::sync::Arc;

use async_trait::async_trait;
use serenity::http::Http;
use serenity::model::id::{ChannelId, MessageId};

use dai_agent::pipeline::{AckHandle, ReplySink, SinkError};

/// Replies into the channel a command was invoked from.
///
/// The acknowledgment is a real message, deleted once the answer is ready.
#[derive(Clone)]
pub struct ChannelSink {
    http: Arc<Http>,
    channel_id: ChannelId,
}

impl ChannelSink {
    pub fn new(http: Arc<Http>, channel_id: ChannelId) -> Self {
        Self { http, channel_id }
    }
}

#[async_trait]
impl ReplySink for ChannelSink {
    async fn acknowledge(&self, text: &str) -> Result<Option<AckHandle>, SinkError> {
        // Typing indicator is cosmetic; ignore permission errors.
        let _ = self.channel_id.broadcast_typing(&self.http).await;
        let msg = self
            .channel_id
            .say(&self.http, text)
            .await
            .map_err(|e| SinkError(e.to_string()))?;
        Ok(Some(AckHandle(msg.id.get())))
    }

    async fn retract(&self, ack: AckHandle) -> Result<(), SinkError> {
        self.channel_id
            .delete_message(&self.http, MessageId::new(ack.0))
            .await
            .map_err(|e| SinkError(e.to_string()))
    }

    async fn send(&self, text: &str) -> Result<(), SinkError> {
        self.channel_id
            .say(&self.http, text)
            .await
            .map(|_| ())
            .map_err(|e| SinkError(e.to_string()))
    }
}
