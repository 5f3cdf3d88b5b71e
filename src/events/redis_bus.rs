use async_trait::async_trait;
use futures_util::StreamExt;
use redis::AsyncCommands;
use redis::Client;
use tokio::sync::mpsc::UnboundedReceiver;
use uuid::Uuid;

use super::{channel_for_conversation, BusError, ConversationEvent, EventBus, MemoryBus};

/// Event bus backed by Redis pub/sub for cross-instance fan-out.
///
/// Publishes go to `conversation:{id}`; a pattern-subscribe listener
/// (`start_psub_listener`) feeds every received payload back into the local
/// [`MemoryBus`], including this instance's own publishes, so local
/// subscribers see the same stream as remote ones.
pub struct RedisBus {
    client: Client,
    local: MemoryBus,
}

impl RedisBus {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            local: MemoryBus::new(),
        }
    }

    /// Handle for the listener task that completes the loopback.
    pub fn local(&self) -> MemoryBus {
        self.local.clone()
    }
}

#[async_trait]
impl EventBus for RedisBus {
    async fn publish(&self, event: &ConversationEvent) -> Result<(), BusError> {
        let payload = event
            .to_broadcast_payload()
            .map_err(|e| BusError::Serialization(e.to_string()))?;
        let mut conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| BusError::Transport(e.to_string()))?;
        conn.publish::<_, _, ()>(channel_for_conversation(event.conversation_id()), payload)
            .await
            .map_err(|e| BusError::Transport(e.to_string()))
    }

    async fn subscribe(&self, conversation_id: Uuid) -> UnboundedReceiver<ConversationEvent> {
        self.local.subscribe(conversation_id).await
    }
}

/// Forward every `conversation:*` payload into the local registry.
/// Runs until the Redis connection drops; spawn it once per process.
pub async fn start_psub_listener(client: Client, local: MemoryBus) -> redis::RedisResult<()> {
    // PubSub requires a dedicated connection, not the multiplexed one.
    let conn = client.get_async_connection().await?;
    let mut pubsub = conn.into_pubsub();
    pubsub.psubscribe("conversation:*").await?;
    let mut stream = pubsub.on_message();
    while let Some(msg) = stream.next().await {
        let payload: String = msg.get_payload()?;
        match serde_json::from_str::<ConversationEvent>(&payload) {
            Ok(event) => local.deliver(event).await,
            Err(e) => {
                tracing::warn!(error=%e, channel=%msg.get_channel_name(), "unparseable event payload")
            }
        }
    }
    Ok(())
}
