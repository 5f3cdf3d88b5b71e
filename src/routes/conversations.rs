use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{Conversation, ConversationKind, Participant};
use crate::services::conversation_service::{ConversationService, ConversationSummary};
use crate::services::read_tracker::ReadTracker;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct CreateConversationRequest {
    pub creator_id: Uuid,
    pub kind: ConversationKind,
    pub participant_ids: Vec<Uuid>,
    pub title: Option<String>,
    pub campaign_ref: Option<String>,
}

pub async fn create_conversation(
    State(state): State<AppState>,
    Json(body): Json<CreateConversationRequest>,
) -> AppResult<(StatusCode, Json<Conversation>)> {
    let conversation = match body.kind {
        ConversationKind::Direct => {
            let [other] = body.participant_ids[..] else {
                return Err(AppError::BadRequest(
                    "a direct conversation takes exactly one other participant".into(),
                ));
            };
            ConversationService::find_or_create_direct(&state.db, body.creator_id, other).await?
        }
        kind => {
            ConversationService::create_group(
                &state.db,
                state.campaigns.as_ref(),
                body.creator_id,
                &body.participant_ids,
                kind,
                body.title,
                body.campaign_ref,
            )
            .await?
        }
    };
    Ok((StatusCode::CREATED, Json(conversation)))
}

#[derive(Deserialize)]
pub struct ListConversationsParams {
    pub user_id: Uuid,
    pub kind: Option<String>,
    pub q: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

pub async fn list_conversations(
    State(state): State<AppState>,
    Query(params): Query<ListConversationsParams>,
) -> AppResult<Json<Vec<ConversationSummary>>> {
    let kind = params
        .kind
        .as_deref()
        .map(|k| {
            ConversationKind::parse(k)
                .ok_or_else(|| AppError::BadRequest(format!("unknown conversation kind: {k}")))
        })
        .transpose()?;

    let summaries = ConversationService::list_for_user(
        &state.db,
        params.user_id,
        kind,
        params.q.as_deref(),
        params.limit.unwrap_or(50),
        params.offset.unwrap_or(0),
    )
    .await?;
    Ok(Json(summaries))
}

#[derive(Deserialize)]
pub struct RequesterParams {
    pub requester_id: Uuid,
}

#[derive(Serialize)]
pub struct ConversationDetailResponse {
    #[serde(flatten)]
    pub conversation: Conversation,
    pub participants: Vec<Participant>,
}

pub async fn get_conversation(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(params): Query<RequesterParams>,
) -> AppResult<Json<ConversationDetailResponse>> {
    let (conversation, participants) =
        ConversationService::get_with_participants(&state.db, id, params.requester_id).await?;
    Ok(Json(ConversationDetailResponse {
        conversation,
        participants,
    }))
}

#[derive(Deserialize)]
pub struct MarkReadRequest {
    pub user_id: Uuid,
    pub message_id: i64,
}

pub async fn mark_read(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<MarkReadRequest>,
) -> AppResult<StatusCode> {
    ReadTracker::mark_read(&state.db, id, body.user_id, body.message_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Deserialize)]
pub struct UnreadParams {
    pub user_id: Uuid,
}

#[derive(Serialize)]
pub struct UnreadCountResponse {
    pub unread: i64,
}

pub async fn unread_count(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(params): Query<UnreadParams>,
) -> AppResult<Json<UnreadCountResponse>> {
    let unread = ReadTracker::unread_count(&state.db, id, params.user_id).await?;
    Ok(Json(UnreadCountResponse { unread }))
}
