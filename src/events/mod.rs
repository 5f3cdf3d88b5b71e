//! Live fan-out of conversation changes.
//!
//! Every event belongs to exactly one conversation; the topic is
//! `conversation:{id}`. Events for one conversation reach each subscriber in
//! publish order; there is no ordering across conversations and no replay for
//! late subscribers (history is `MessageService::page`).
//!
//! The broadcast payload is flat JSON:
//! ```json
//! {
//!     "type": "message.new",
//!     "timestamp": "2026-08-29T10:30:00Z",
//!     "conversation_id": "uuid",
//!     "message_id": 42,
//!     "sender_id": "uuid"
//! }
//! ```

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::UnboundedReceiver;
use uuid::Uuid;

use crate::models::Role;

pub mod memory;
pub mod redis_bus;

pub use memory::MemoryBus;
pub use redis_bus::RedisBus;

pub fn channel_for_conversation(id: Uuid) -> String {
    format!("conversation:{}", id)
}

/// All real-time events this core emits, named `object.action`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ConversationEvent {
    #[serde(rename = "message.new")]
    MessageNew {
        conversation_id: Uuid,
        message_id: i64,
        sender_id: Uuid,
    },

    #[serde(rename = "message.edited")]
    MessageEdited {
        conversation_id: Uuid,
        message_id: i64,
        sender_id: Uuid,
    },

    #[serde(rename = "message.deleted")]
    MessageDeleted {
        conversation_id: Uuid,
        message_id: i64,
        deleted_by: Uuid,
    },

    #[serde(rename = "member.joined")]
    MemberJoined {
        conversation_id: Uuid,
        user_id: Uuid,
        role: Role,
    },

    #[serde(rename = "member.left")]
    MemberLeft {
        conversation_id: Uuid,
        user_id: Uuid,
    },

    #[serde(rename = "typing.started")]
    TypingStarted {
        conversation_id: Uuid,
        user_id: Uuid,
    },

    #[serde(rename = "typing.stopped")]
    TypingStopped {
        conversation_id: Uuid,
        user_id: Uuid,
    },
}

impl ConversationEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::MessageNew { .. } => "message.new",
            Self::MessageEdited { .. } => "message.edited",
            Self::MessageDeleted { .. } => "message.deleted",
            Self::MemberJoined { .. } => "member.joined",
            Self::MemberLeft { .. } => "member.left",
            Self::TypingStarted { .. } => "typing.started",
            Self::TypingStopped { .. } => "typing.stopped",
        }
    }

    pub fn conversation_id(&self) -> Uuid {
        match self {
            Self::MessageNew {
                conversation_id, ..
            }
            | Self::MessageEdited {
                conversation_id, ..
            }
            | Self::MessageDeleted {
                conversation_id, ..
            }
            | Self::MemberJoined {
                conversation_id, ..
            }
            | Self::MemberLeft {
                conversation_id, ..
            }
            | Self::TypingStarted {
                conversation_id, ..
            }
            | Self::TypingStopped {
                conversation_id, ..
            } => *conversation_id,
        }
    }

    /// Serialize for the wire, stamping the publish time.
    pub fn to_broadcast_payload(&self) -> Result<String, serde_json::Error> {
        let mut value = serde_json::to_value(self)?;
        if let Some(obj) = value.as_object_mut() {
            obj.insert(
                "timestamp".to_string(),
                serde_json::json!(Utc::now().to_rfc3339()),
            );
        }
        serde_json::to_string(&value)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BusError {
    #[error("failed to serialize event: {0}")]
    Serialization(String),

    #[error("failed to publish event: {0}")]
    Transport(String),
}

/// Publish/subscribe seam between the core and whatever transport delivers
/// events to connected participants (sockets, long-poll, a managed push
/// service). The core never blocks on subscribers.
#[async_trait]
pub trait EventBus: Send + Sync {
    async fn publish(&self, event: &ConversationEvent) -> Result<(), BusError>;

    /// Subscribe to one conversation's events. Delivery starts at the next
    /// published event; disconnected subscribers receive nothing retroactively.
    async fn subscribe(&self, conversation_id: Uuid) -> UnboundedReceiver<ConversationEvent>;
}

/// Fire-and-forget publish used after durable writes: a dropped real-time
/// notification degrades freshness, not correctness.
pub async fn publish_best_effort(bus: &dyn EventBus, event: ConversationEvent) {
    if let Err(e) = bus.publish(&event).await {
        tracing::warn!(error=%e, event_type=%event.event_type(), "event publish failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_is_flat_with_type_and_timestamp() {
        let conversation_id = Uuid::new_v4();
        let sender_id = Uuid::new_v4();
        let event = ConversationEvent::MessageNew {
            conversation_id,
            message_id: 7,
            sender_id,
        };

        let payload = event.to_broadcast_payload().unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&payload).unwrap();

        assert_eq!(parsed["type"], "message.new");
        assert_eq!(parsed["conversation_id"], conversation_id.to_string());
        assert_eq!(parsed["message_id"], 7);
        assert_eq!(parsed["sender_id"], sender_id.to_string());
        assert!(parsed["timestamp"].is_string());
    }

    #[test]
    fn payload_round_trips_ignoring_timestamp() {
        let event = ConversationEvent::TypingStarted {
            conversation_id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
        };
        let payload = event.to_broadcast_payload().unwrap();
        let back: ConversationEvent = serde_json::from_str(&payload).unwrap();
        assert_eq!(back, event);
    }

    #[test]
    fn topic_uses_conversation_prefix() {
        let id = Uuid::new_v4();
        assert_eq!(channel_for_conversation(id), format!("conversation:{id}"));
    }
}
