use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

use crate::error::AppResult;
use crate::models::{Participant, Role};
use crate::services::participant_service::ParticipantService;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct AddParticipantRequest {
    pub user_id: Uuid,
    #[serde(default = "default_role")]
    pub role: Role,
}

fn default_role() -> Role {
    Role::Member
}

pub async fn add_participant(
    State(state): State<AppState>,
    Path(conversation_id): Path<Uuid>,
    Json(body): Json<AddParticipantRequest>,
) -> AppResult<(StatusCode, Json<Participant>)> {
    let participant = ParticipantService::add(
        &state.db,
        state.bus.as_ref(),
        conversation_id,
        body.user_id,
        body.role,
    )
    .await?;
    Ok((StatusCode::CREATED, Json(participant)))
}

pub async fn remove_participant(
    State(state): State<AppState>,
    Path((conversation_id, user_id)): Path<(Uuid, Uuid)>,
) -> AppResult<StatusCode> {
    ParticipantService::remove(&state.db, state.bus.as_ref(), conversation_id, user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
