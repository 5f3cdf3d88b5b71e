use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

use crate::error::AppResult;
use crate::models::Message;
use crate::services::message_service::MessageService;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct SendMessageRequest {
    pub sender_id: Uuid,
    pub content: Option<String>,
    pub media_ref: Option<String>,
    pub reply_to: Option<i64>,
}

pub async fn send_message(
    State(state): State<AppState>,
    Path(conversation_id): Path<Uuid>,
    Json(body): Json<SendMessageRequest>,
) -> AppResult<(StatusCode, Json<Message>)> {
    let message = MessageService::append(
        &state.db,
        state.bus.as_ref(),
        conversation_id,
        body.sender_id,
        body.content,
        body.media_ref,
        body.reply_to,
    )
    .await?;
    Ok((StatusCode::CREATED, Json(message)))
}

#[derive(Deserialize)]
pub struct PageParams {
    pub before_id: Option<i64>,
    pub after_id: Option<i64>,
    pub limit: Option<i64>,
}

pub async fn list_messages(
    State(state): State<AppState>,
    Path(conversation_id): Path<Uuid>,
    Query(params): Query<PageParams>,
) -> AppResult<Json<Vec<Message>>> {
    let page = MessageService::page(
        &state.db,
        conversation_id,
        params.before_id,
        params.after_id,
        params.limit.unwrap_or(50),
    )
    .await?;
    Ok(Json(page))
}

#[derive(Deserialize)]
pub struct EditMessageRequest {
    pub requester_id: Uuid,
    pub content: String,
}

pub async fn edit_message(
    State(state): State<AppState>,
    Path(message_id): Path<i64>,
    Json(body): Json<EditMessageRequest>,
) -> AppResult<Json<Message>> {
    let message = MessageService::edit(
        &state.db,
        state.bus.as_ref(),
        message_id,
        &body.content,
        body.requester_id,
    )
    .await?;
    Ok(Json(message))
}

#[derive(Deserialize)]
pub struct DeleteMessageParams {
    pub requester_id: Uuid,
}

pub async fn delete_message(
    State(state): State<AppState>,
    Path(message_id): Path<i64>,
    Query(params): Query<DeleteMessageParams>,
) -> AppResult<StatusCode> {
    MessageService::delete(
        &state.db,
        state.bus.as_ref(),
        state.media.as_ref(),
        message_id,
        params.requester_id,
    )
    .await?;
    Ok(StatusCode::NO_CONTENT)
}
