use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{BusError, ConversationEvent, EventBus};

/// In-process fan-out: conversation id -> live subscriber channels.
/// Senders whose receiver is gone are dropped on the next delivery.
#[derive(Default, Clone)]
pub struct MemoryBus {
    inner: Arc<RwLock<HashMap<Uuid, Vec<UnboundedSender<ConversationEvent>>>>>,
}

impl MemoryBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) async fn deliver(&self, event: ConversationEvent) {
        let conversation_id = event.conversation_id();
        let mut guard = self.inner.write().await;
        if let Some(list) = guard.get_mut(&conversation_id) {
            list.retain(|sender| sender.send(event.clone()).is_ok());
            if list.is_empty() {
                guard.remove(&conversation_id);
            }
        }
    }

    pub(crate) async fn add_subscriber(
        &self,
        conversation_id: Uuid,
    ) -> UnboundedReceiver<ConversationEvent> {
        let (tx, rx) = unbounded_channel();
        let mut guard = self.inner.write().await;
        guard.entry(conversation_id).or_default().push(tx);
        rx
    }
}

#[async_trait]
impl EventBus for MemoryBus {
    async fn publish(&self, event: &ConversationEvent) -> Result<(), BusError> {
        self.deliver(event.clone()).await;
        Ok(())
    }

    async fn subscribe(&self, conversation_id: Uuid) -> UnboundedReceiver<ConversationEvent> {
        self.add_subscriber(conversation_id).await
    }
}
