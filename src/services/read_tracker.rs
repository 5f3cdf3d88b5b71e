use sqlx::{Pool, Postgres};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::services::conversation_service::ConversationService;

pub struct ReadTracker;

impl ReadTracker {
    /// Upsert the user's read marker, monotonically: a message id at or
    /// below the current marker is a silent no-op, never an error.
    pub async fn mark_read(
        db: &Pool<Postgres>,
        conversation_id: Uuid,
        user_id: Uuid,
        message_id: i64,
    ) -> AppResult<()> {
        if !ConversationService::is_participant(db, conversation_id, user_id).await? {
            return Err(AppError::Forbidden);
        }

        let exists: Option<i32> =
            sqlx::query_scalar("SELECT 1 FROM messages WHERE id = $1 AND conversation_id = $2")
                .bind(message_id)
                .bind(conversation_id)
                .fetch_optional(db)
                .await?;
        if exists.is_none() {
            return Err(AppError::NotFound);
        }

        sqlx::query(
            "INSERT INTO read_markers (conversation_id, user_id, last_read_message_id, last_read_at) \
             VALUES ($1, $2, $3, NOW()) \
             ON CONFLICT (conversation_id, user_id) DO UPDATE \
             SET last_read_message_id = EXCLUDED.last_read_message_id, last_read_at = NOW() \
             WHERE read_markers.last_read_message_id < EXCLUDED.last_read_message_id",
        )
        .bind(conversation_id)
        .bind(user_id)
        .bind(message_id)
        .execute(db)
        .await?;

        Ok(())
    }

    /// Messages with an id above the user's marker. No marker means every
    /// message in the conversation is unread.
    pub async fn unread_count(
        db: &Pool<Postgres>,
        conversation_id: Uuid,
        user_id: Uuid,
    ) -> AppResult<i64> {
        if !ConversationService::is_participant(db, conversation_id, user_id).await? {
            return Err(AppError::Forbidden);
        }

        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM messages \
             WHERE conversation_id = $1 \
               AND id > COALESCE(( \
                   SELECT last_read_message_id FROM read_markers \
                   WHERE conversation_id = $1 AND user_id = $2 \
               ), 0)",
        )
        .bind(conversation_id)
        .bind(user_id)
        .fetch_one(db)
        .await?;
        Ok(count)
    }
}
