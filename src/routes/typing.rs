use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::services::conversation_service::ConversationService;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct SetTypingRequest {
    pub user_id: Uuid,
    pub is_typing: bool,
}

/// Fire-and-forget from the caller's perspective: the ack only means the
/// state was recorded, not that anyone saw the event.
pub async fn set_typing(
    State(state): State<AppState>,
    Path(conversation_id): Path<Uuid>,
    Json(body): Json<SetTypingRequest>,
) -> AppResult<StatusCode> {
    if !ConversationService::is_participant(&state.db, conversation_id, body.user_id).await? {
        return Err(AppError::Forbidden);
    }

    state
        .typing
        .set_typing(
            state.bus.as_ref(),
            conversation_id,
            body.user_id,
            body.is_typing,
        )
        .await;

    Ok(StatusCode::NO_CONTENT)
}
