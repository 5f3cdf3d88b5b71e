use sqlx::{Pool, Postgres};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::events::{publish_best_effort, ConversationEvent, EventBus};
use crate::models::{ConversationKind, Participant, Role};
use crate::services::conversation_service::{participant_from_row, ConversationService};

/// Membership and role bookkeeping. Whether the *caller* is allowed to add
/// or remove someone is the caller's concern; only membership-shape
/// invariants are enforced here.
pub struct ParticipantService;

impl ParticipantService {
    pub async fn add(
        db: &Pool<Postgres>,
        bus: &dyn EventBus,
        conversation_id: Uuid,
        user_id: Uuid,
        role: Role,
    ) -> AppResult<Participant> {
        let conversation = ConversationService::get(db, conversation_id).await?;
        if conversation.kind == ConversationKind::Direct {
            return Err(AppError::BadRequest(
                "direct conversations are closed to additional participants".into(),
            ));
        }

        let result = sqlx::query(
            "INSERT INTO conversation_participants (conversation_id, user_id, role) \
             VALUES ($1, $2, $3) \
             ON CONFLICT (conversation_id, user_id) DO NOTHING",
        )
        .bind(conversation_id)
        .bind(user_id)
        .bind(role.as_str())
        .execute(db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::Conflict("already a participant".into()));
        }

        let row = sqlx::query(
            "SELECT conversation_id, user_id, role, joined_at \
             FROM conversation_participants \
             WHERE conversation_id = $1 AND user_id = $2",
        )
        .bind(conversation_id)
        .bind(user_id)
        .fetch_one(db)
        .await?;
        let participant = participant_from_row(&row)?;

        publish_best_effort(
            bus,
            ConversationEvent::MemberJoined {
                conversation_id,
                user_id,
                role: participant.role,
            },
        )
        .await;

        Ok(participant)
    }

    /// Remove a participant. Removing the last owner is blocked so a
    /// conversation never goes ownerless.
    pub async fn remove(
        db: &Pool<Postgres>,
        bus: &dyn EventBus,
        conversation_id: Uuid,
        user_id: Uuid,
    ) -> AppResult<()> {
        let role = Self::role(db, conversation_id, user_id).await?;

        if role == Role::Owner {
            let owners: i64 = sqlx::query_scalar(
                "SELECT COUNT(*) FROM conversation_participants \
                 WHERE conversation_id = $1 AND role = 'owner'",
            )
            .bind(conversation_id)
            .fetch_one(db)
            .await?;
            if owners <= 1 {
                return Err(AppError::Conflict(
                    "cannot remove the last owner of a conversation".into(),
                ));
            }
        }

        let result = sqlx::query(
            "DELETE FROM conversation_participants \
             WHERE conversation_id = $1 AND user_id = $2",
        )
        .bind(conversation_id)
        .bind(user_id)
        .execute(db)
        .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound);
        }

        publish_best_effort(
            bus,
            ConversationEvent::MemberLeft {
                conversation_id,
                user_id,
            },
        )
        .await;

        Ok(())
    }

    pub async fn role(
        db: &Pool<Postgres>,
        conversation_id: Uuid,
        user_id: Uuid,
    ) -> AppResult<Role> {
        let role_str: Option<String> = sqlx::query_scalar(
            "SELECT role FROM conversation_participants \
             WHERE conversation_id = $1 AND user_id = $2",
        )
        .bind(conversation_id)
        .bind(user_id)
        .fetch_optional(db)
        .await?;

        role_str
            .as_deref()
            .map(Role::parse)
            .ok_or(AppError::NotFound)?
            .ok_or(AppError::Internal)
    }
}
