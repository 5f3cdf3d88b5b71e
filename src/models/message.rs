use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A single entry in a conversation's append-only log.
///
/// Immutable after insert except for `content` (edit sets `edited_at`) and
/// full removal. `id` is strictly increasing within the conversation and is
/// the pagination cursor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: i64,
    pub conversation_id: Uuid,
    pub sender_id: Uuid,
    pub content: Option<String>,
    pub media_ref: Option<String>,
    pub reply_to: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub edited_at: Option<DateTime<Utc>>,
}
