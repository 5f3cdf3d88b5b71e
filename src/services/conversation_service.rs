use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::postgres::PgRow;
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::conversation::normalize_pair;
use crate::models::{Conversation, ConversationKind, Participant, Role};
use crate::services::campaigns::CampaignDirectory;

/// Preview of the newest message, carried on conversation listings.
#[derive(Debug, Clone, Serialize)]
pub struct MessagePreview {
    pub message_id: i64,
    pub sender_id: Uuid,
    pub content: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConversationSummary {
    #[serde(flatten)]
    pub conversation: Conversation,
    pub last_message: Option<MessagePreview>,
}

const LIST_LIMIT_CAP: i64 = 100;

pub struct ConversationService;

impl ConversationService {
    /// Idempotent direct-conversation create.
    ///
    /// The pair is normalized and inserted under the partial unique index on
    /// (direct_user_min, direct_user_max); when a concurrent caller won the
    /// race, the insert is a no-op and the existing row is fetched instead.
    /// All concurrent callers for one unordered pair observe the same id, and
    /// a duplicate attempt never surfaces as an error.
    pub async fn find_or_create_direct(
        db: &Pool<Postgres>,
        user_a: Uuid,
        user_b: Uuid,
    ) -> AppResult<Conversation> {
        if user_a == user_b {
            return Err(AppError::BadRequest(
                "a direct conversation needs two distinct users".into(),
            ));
        }
        let (lo, hi) = normalize_pair(user_a, user_b);

        let mut tx = db.begin().await?;
        let inserted: Option<Uuid> = sqlx::query_scalar(
            "INSERT INTO conversations (id, kind, direct_user_min, direct_user_max) \
             VALUES ($1, 'direct', $2, $3) \
             ON CONFLICT (direct_user_min, direct_user_max) WHERE kind = 'direct' DO NOTHING \
             RETURNING id",
        )
        .bind(Uuid::new_v4())
        .bind(lo)
        .bind(hi)
        .fetch_optional(&mut *tx)
        .await?;

        let id = match inserted {
            Some(id) => {
                // A DM is symmetric: both sides are owners.
                sqlx::query(
                    "INSERT INTO conversation_participants (conversation_id, user_id, role) \
                     VALUES ($1, $2, 'owner'), ($1, $3, 'owner')",
                )
                .bind(id)
                .bind(lo)
                .bind(hi)
                .execute(&mut *tx)
                .await?;
                tx.commit().await?;
                id
            }
            None => {
                tx.commit().await?;
                sqlx::query_scalar(
                    "SELECT id FROM conversations \
                     WHERE kind = 'direct' AND direct_user_min = $1 AND direct_user_max = $2",
                )
                .bind(lo)
                .bind(hi)
                .fetch_one(db)
                .await?
            }
        };

        Self::get(db, id).await
    }

    /// Create a group or campaign-linked conversation with its initial
    /// participants in one transaction: either all rows exist or none do.
    pub async fn create_group(
        db: &Pool<Postgres>,
        campaigns: &dyn CampaignDirectory,
        creator_id: Uuid,
        participant_ids: &[Uuid],
        kind: ConversationKind,
        title: Option<String>,
        campaign_ref: Option<String>,
    ) -> AppResult<Conversation> {
        match kind {
            ConversationKind::Direct => {
                return Err(AppError::BadRequest(
                    "direct conversations go through find-or-create".into(),
                ));
            }
            ConversationKind::Campaign => {
                let reference = campaign_ref
                    .as_deref()
                    .ok_or_else(|| {
                        AppError::BadRequest(
                            "campaign conversations require a campaign reference".into(),
                        )
                    })?;
                if !campaigns.resolves(reference).await {
                    return Err(AppError::NotFound);
                }
            }
            ConversationKind::Group => {
                if campaign_ref.is_some() {
                    return Err(AppError::BadRequest(
                        "campaign reference is only valid for campaign conversations".into(),
                    ));
                }
            }
        }

        let mut others: Vec<Uuid> = Vec::new();
        for id in participant_ids {
            if *id != creator_id && !others.contains(id) {
                others.push(*id);
            }
        }
        if others.is_empty() {
            return Err(AppError::BadRequest(
                "a group needs at least one participant besides the creator".into(),
            ));
        }

        let id = Uuid::new_v4();
        let mut tx = db.begin().await?;
        sqlx::query(
            "INSERT INTO conversations (id, kind, title, campaign_ref) VALUES ($1, $2, $3, $4)",
        )
        .bind(id)
        .bind(kind.as_str())
        .bind(&title)
        .bind(&campaign_ref)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "INSERT INTO conversation_participants (conversation_id, user_id, role) \
             VALUES ($1, $2, 'owner')",
        )
        .bind(id)
        .bind(creator_id)
        .execute(&mut *tx)
        .await?;

        for member in &others {
            sqlx::query(
                "INSERT INTO conversation_participants (conversation_id, user_id, role) \
                 VALUES ($1, $2, 'member')",
            )
            .bind(id)
            .bind(member)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        Self::get(db, id).await
    }

    pub async fn get(db: &Pool<Postgres>, id: Uuid) -> AppResult<Conversation> {
        let row = sqlx::query(
            "SELECT id, kind, title, campaign_ref, created_at, last_activity_at \
             FROM conversations WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(db)
        .await?
        .ok_or(AppError::NotFound)?;

        conversation_from_row(&row)
    }

    pub async fn is_participant(
        db: &Pool<Postgres>,
        conversation_id: Uuid,
        user_id: Uuid,
    ) -> AppResult<bool> {
        let rec: Option<i32> = sqlx::query_scalar(
            "SELECT 1 FROM conversation_participants \
             WHERE conversation_id = $1 AND user_id = $2",
        )
        .bind(conversation_id)
        .bind(user_id)
        .fetch_optional(db)
        .await?;
        Ok(rec.is_some())
    }

    /// Conversation plus its membership, for a requester who must be in it.
    pub async fn get_with_participants(
        db: &Pool<Postgres>,
        conversation_id: Uuid,
        requester_id: Uuid,
    ) -> AppResult<(Conversation, Vec<Participant>)> {
        let conversation = Self::get(db, conversation_id).await?;
        if !Self::is_participant(db, conversation_id, requester_id).await? {
            return Err(AppError::Forbidden);
        }

        let rows = sqlx::query(
            "SELECT conversation_id, user_id, role, joined_at \
             FROM conversation_participants \
             WHERE conversation_id = $1 \
             ORDER BY joined_at ASC, user_id ASC",
        )
        .bind(conversation_id)
        .fetch_all(db)
        .await?;

        let participants = rows
            .iter()
            .map(participant_from_row)
            .collect::<AppResult<Vec<_>>>()?;
        Ok((conversation, participants))
    }

    /// Conversations the user is in, newest activity first, each with a
    /// preview of its latest message.
    pub async fn list_for_user(
        db: &Pool<Postgres>,
        user_id: Uuid,
        kind: Option<ConversationKind>,
        search: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> AppResult<Vec<ConversationSummary>> {
        let limit = limit.clamp(1, LIST_LIMIT_CAP);
        let offset = offset.max(0);

        let rows = sqlx::query(
            r#"
            SELECT c.id, c.kind, c.title, c.campaign_ref, c.created_at, c.last_activity_at,
                   m.id AS last_message_id,
                   m.sender_id AS last_sender_id,
                   m.content AS last_content,
                   m.created_at AS last_created_at
            FROM conversations c
            JOIN conversation_participants cp
              ON cp.conversation_id = c.id AND cp.user_id = $1
            LEFT JOIN LATERAL (
                SELECT id, sender_id, content, created_at
                FROM messages
                WHERE conversation_id = c.id
                ORDER BY id DESC
                LIMIT 1
            ) m ON TRUE
            WHERE ($2::text IS NULL OR c.kind = $2)
              AND ($3::text IS NULL OR c.title ILIKE '%' || $3 || '%')
            ORDER BY c.last_activity_at DESC
            LIMIT $4 OFFSET $5
            "#,
        )
        .bind(user_id)
        .bind(kind.map(|k| k.as_str()))
        .bind(search)
        .bind(limit)
        .bind(offset)
        .fetch_all(db)
        .await?;

        rows.iter()
            .map(|row| {
                let conversation = conversation_from_row(row)?;
                let last_message = row
                    .try_get::<Option<i64>, _>("last_message_id")?
                    .map(|message_id| -> AppResult<MessagePreview> {
                        Ok(MessagePreview {
                            message_id,
                            sender_id: row.try_get("last_sender_id")?,
                            content: row.try_get("last_content")?,
                            created_at: row.try_get("last_created_at")?,
                        })
                    })
                    .transpose()?;
                Ok(ConversationSummary {
                    conversation,
                    last_message,
                })
            })
            .collect()
    }
}

pub(crate) fn conversation_from_row(row: &PgRow) -> AppResult<Conversation> {
    let kind_str: String = row.try_get("kind")?;
    let kind = ConversationKind::parse(&kind_str).ok_or(AppError::Internal)?;
    Ok(Conversation {
        id: row.try_get("id")?,
        kind,
        title: row.try_get("title")?,
        campaign_ref: row.try_get("campaign_ref")?,
        created_at: row.try_get("created_at")?,
        last_activity_at: row.try_get("last_activity_at")?,
    })
}

pub(crate) fn participant_from_row(row: &PgRow) -> AppResult<Participant> {
    let role_str: String = row.try_get("role")?;
    let role = Role::parse(&role_str).ok_or(AppError::Internal)?;
    Ok(Participant {
        conversation_id: row.try_get("conversation_id")?,
        user_id: row.try_get("user_id")?,
        role,
        joined_at: row.try_get("joined_at")?,
    })
}
