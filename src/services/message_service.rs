use sqlx::postgres::PgRow;
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::events::{publish_best_effort, ConversationEvent, EventBus};
use crate::models::Message;
use crate::services::conversation_service::ConversationService;
use crate::services::media_store::MediaStore;
use crate::services::participant_service::ParticipantService;

/// Server-side cap on page size, regardless of what the caller asks for.
const PAGE_LIMIT_CAP: i64 = 100;

pub(crate) fn clamp_limit(limit: i64) -> i64 {
    limit.clamp(1, PAGE_LIMIT_CAP)
}

pub struct MessageService;

impl MessageService {
    /// Append a message to a conversation's log.
    ///
    /// The insert and the `last_activity_at` bump commit together; the
    /// message-created event goes out after the commit, fire-and-forget.
    /// Retried appends are not idempotent: a duplicate retry produces a
    /// duplicate message.
    pub async fn append(
        db: &Pool<Postgres>,
        bus: &dyn EventBus,
        conversation_id: Uuid,
        sender_id: Uuid,
        content: Option<String>,
        media_ref: Option<String>,
        reply_to: Option<i64>,
    ) -> AppResult<Message> {
        if !ConversationService::is_participant(db, conversation_id, sender_id).await? {
            return Err(AppError::Forbidden);
        }

        let content = content.filter(|c| !c.trim().is_empty());
        if content.is_none() && media_ref.is_none() {
            return Err(AppError::BadRequest(
                "a message needs content or a media reference".into(),
            ));
        }

        if let Some(parent_id) = reply_to {
            let parent: Option<i32> = sqlx::query_scalar(
                "SELECT 1 FROM messages WHERE id = $1 AND conversation_id = $2",
            )
            .bind(parent_id)
            .bind(conversation_id)
            .fetch_optional(db)
            .await?;
            if parent.is_none() {
                return Err(AppError::BadRequest(
                    "reply_to must reference a message in the same conversation".into(),
                ));
            }
        }

        let mut tx = db.begin().await?;
        let row = sqlx::query(
            "INSERT INTO messages (conversation_id, sender_id, content, media_ref, reply_to) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING id, conversation_id, sender_id, content, media_ref, reply_to, \
                       created_at, edited_at",
        )
        .bind(conversation_id)
        .bind(sender_id)
        .bind(&content)
        .bind(&media_ref)
        .bind(reply_to)
        .fetch_one(&mut *tx)
        .await?;

        // Advisory freshness field: concurrent appends all succeed and the
        // value never moves backwards.
        sqlx::query(
            "UPDATE conversations SET last_activity_at = GREATEST(last_activity_at, NOW()) \
             WHERE id = $1",
        )
        .bind(conversation_id)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        let message = message_from_row(&row)?;
        publish_best_effort(
            bus,
            ConversationEvent::MessageNew {
                conversation_id,
                message_id: message.id,
                sender_id,
            },
        )
        .await;

        Ok(message)
    }

    /// Edit a message's content. Only the sender may edit; the id (and with
    /// it every cursor) is unchanged, so subscribers see an update for a
    /// message they already have.
    pub async fn edit(
        db: &Pool<Postgres>,
        bus: &dyn EventBus,
        message_id: i64,
        new_content: &str,
        by_user: Uuid,
    ) -> AppResult<Message> {
        if new_content.trim().is_empty() {
            return Err(AppError::BadRequest("edited content cannot be empty".into()));
        }

        let (conversation_id, sender_id) = Self::locate(db, message_id).await?;
        if by_user != sender_id {
            return Err(AppError::Forbidden);
        }

        let row = sqlx::query(
            "UPDATE messages SET content = $1, edited_at = NOW() WHERE id = $2 \
             RETURNING id, conversation_id, sender_id, content, media_ref, reply_to, \
                       created_at, edited_at",
        )
        .bind(new_content)
        .bind(message_id)
        .fetch_one(db)
        .await?;

        let message = message_from_row(&row)?;
        publish_best_effort(
            bus,
            ConversationEvent::MessageEdited {
                conversation_id,
                message_id,
                sender_id,
            },
        )
        .await;

        Ok(message)
    }

    /// Hard-delete a message. Allowed for the sender, or for a participant
    /// whose role lets them delete others' messages. Callers wanting
    /// retention must snapshot before calling this.
    pub async fn delete(
        db: &Pool<Postgres>,
        bus: &dyn EventBus,
        media: &dyn MediaStore,
        message_id: i64,
        by_user: Uuid,
    ) -> AppResult<()> {
        let row = sqlx::query(
            "SELECT conversation_id, sender_id, media_ref FROM messages WHERE id = $1",
        )
        .bind(message_id)
        .fetch_optional(db)
        .await?
        .ok_or(AppError::NotFound)?;
        let conversation_id: Uuid = row.try_get("conversation_id")?;
        let sender_id: Uuid = row.try_get("sender_id")?;
        let media_ref: Option<String> = row.try_get("media_ref")?;

        if by_user != sender_id {
            let role = ParticipantService::role(db, conversation_id, by_user)
                .await
                .map_err(|e| match e {
                    AppError::NotFound => AppError::Forbidden,
                    other => other,
                })?;
            if !role.can_delete_others_messages() {
                return Err(AppError::Forbidden);
            }
        }

        sqlx::query("DELETE FROM messages WHERE id = $1")
            .bind(message_id)
            .execute(db)
            .await?;

        // Attachment removal is delegated; a blob-store failure leaves an
        // orphaned blob, not a broken conversation.
        if let Some(media_ref) = media_ref {
            if let Err(e) = media.delete(&media_ref).await {
                tracing::warn!(error=%e, %media_ref, "attachment removal failed");
            }
        }

        publish_best_effort(
            bus,
            ConversationEvent::MessageDeleted {
                conversation_id,
                message_id,
                deleted_by: by_user,
            },
        )
        .await;

        Ok(())
    }

    /// Cursor-based page of a conversation's log.
    ///
    /// `before_id` pages backward (descending ids), `after_id` forward
    /// (ascending); with no cursor the newest messages come first. Cursors
    /// are message ids, stable under concurrent inserts where offsets are
    /// not.
    pub async fn page(
        db: &Pool<Postgres>,
        conversation_id: Uuid,
        before_id: Option<i64>,
        after_id: Option<i64>,
        limit: i64,
    ) -> AppResult<Vec<Message>> {
        let limit = clamp_limit(limit);

        let rows = match (before_id, after_id) {
            (Some(_), Some(_)) => {
                return Err(AppError::BadRequest(
                    "before_id and after_id are mutually exclusive".into(),
                ));
            }
            (Some(before), None) => {
                sqlx::query(
                    "SELECT id, conversation_id, sender_id, content, media_ref, reply_to, \
                            created_at, edited_at \
                     FROM messages \
                     WHERE conversation_id = $1 AND id < $2 \
                     ORDER BY id DESC LIMIT $3",
                )
                .bind(conversation_id)
                .bind(before)
                .bind(limit)
                .fetch_all(db)
                .await?
            }
            (None, Some(after)) => {
                sqlx::query(
                    "SELECT id, conversation_id, sender_id, content, media_ref, reply_to, \
                            created_at, edited_at \
                     FROM messages \
                     WHERE conversation_id = $1 AND id > $2 \
                     ORDER BY id ASC LIMIT $3",
                )
                .bind(conversation_id)
                .bind(after)
                .bind(limit)
                .fetch_all(db)
                .await?
            }
            (None, None) => {
                sqlx::query(
                    "SELECT id, conversation_id, sender_id, content, media_ref, reply_to, \
                            created_at, edited_at \
                     FROM messages \
                     WHERE conversation_id = $1 \
                     ORDER BY id DESC LIMIT $2",
                )
                .bind(conversation_id)
                .bind(limit)
                .fetch_all(db)
                .await?
            }
        };

        rows.iter().map(message_from_row).collect()
    }

    async fn locate(db: &Pool<Postgres>, message_id: i64) -> AppResult<(Uuid, Uuid)> {
        let row = sqlx::query("SELECT conversation_id, sender_id FROM messages WHERE id = $1")
            .bind(message_id)
            .fetch_optional(db)
            .await?
            .ok_or(AppError::NotFound)?;
        Ok((row.try_get("conversation_id")?, row.try_get("sender_id")?))
    }
}

pub(crate) fn message_from_row(row: &PgRow) -> AppResult<Message> {
    Ok(Message {
        id: row.try_get("id")?,
        conversation_id: row.try_get("conversation_id")?,
        sender_id: row.try_get("sender_id")?,
        content: row.try_get("content")?,
        media_ref: row.try_get("media_ref")?,
        reply_to: row.try_get("reply_to")?,
        created_at: row.try_get("created_at")?,
        edited_at: row.try_get("edited_at")?,
    })
}
