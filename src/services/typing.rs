use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::time::Instant;
use uuid::Uuid;

use crate::events::{publish_best_effort, ConversationEvent, EventBus};

/// Ephemeral typing presence: (conversation, user) -> deadline.
///
/// Nothing here touches durable storage. Expiry is passive: a reader treats
/// any entry past its deadline as "not typing" even when no stop event ever
/// arrived, so lost stop events only cost a few seconds of staleness.
#[derive(Clone)]
pub struct TypingTracker {
    ttl: Duration,
    inner: Arc<RwLock<HashMap<(Uuid, Uuid), Instant>>>,
}

impl TypingTracker {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            inner: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub async fn set_typing(
        &self,
        bus: &dyn EventBus,
        conversation_id: Uuid,
        user_id: Uuid,
        is_typing: bool,
    ) {
        if is_typing {
            self.start(conversation_id, user_id).await;
            publish_best_effort(
                bus,
                ConversationEvent::TypingStarted {
                    conversation_id,
                    user_id,
                },
            )
            .await;
        } else {
            self.stop(conversation_id, user_id).await;
            publish_best_effort(
                bus,
                ConversationEvent::TypingStopped {
                    conversation_id,
                    user_id,
                },
            )
            .await;
        }
    }

    /// Store or refresh the deadline for one typist.
    pub async fn start(&self, conversation_id: Uuid, user_id: Uuid) {
        let deadline = Instant::now() + self.ttl;
        let mut guard = self.inner.write().await;
        guard.insert((conversation_id, user_id), deadline);
    }

    pub async fn stop(&self, conversation_id: Uuid, user_id: Uuid) {
        let mut guard = self.inner.write().await;
        guard.remove(&(conversation_id, user_id));
    }

    pub async fn is_typing(&self, conversation_id: Uuid, user_id: Uuid) -> bool {
        let guard = self.inner.read().await;
        guard
            .get(&(conversation_id, user_id))
            .is_some_and(|deadline| *deadline > Instant::now())
    }

    /// Users currently typing in one conversation. Prunes expired entries
    /// while it holds the write lock anyway.
    pub async fn typing_users(&self, conversation_id: Uuid) -> Vec<Uuid> {
        let now = Instant::now();
        let mut guard = self.inner.write().await;
        guard.retain(|_, deadline| *deadline > now);
        guard
            .keys()
            .filter(|(conv, _)| *conv == conversation_id)
            .map(|(_, user)| *user)
            .collect()
    }
}
