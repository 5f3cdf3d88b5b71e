use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Last message a user has acknowledged reading in one conversation.
/// Upserts are monotonic on `last_read_message_id`; a stale id is a no-op.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadMarker {
    pub conversation_id: Uuid,
    pub user_id: Uuid,
    pub last_read_message_id: i64,
    pub last_read_at: DateTime<Utc>,
}
