use axum::routing::{delete, get, post, put};
use axum::Router;

use crate::state::AppState;

pub mod conversations;
pub mod messages;
pub mod participants;
pub mod typing;

use conversations::{
    create_conversation, get_conversation, list_conversations, mark_read, unread_count,
};
use messages::{delete_message, edit_message, list_messages, send_message};
use participants::{add_participant, remove_participant};
use typing::set_typing;

pub fn build_router() -> Router<AppState> {
    // Healthcheck stays outside the API prefix so probes need no versioning.
    let introspection = Router::new().route("/health", get(|| async { "OK" }));

    let api_v1 = Router::new()
        .route("/conversations", get(list_conversations))
        .route("/conversations", post(create_conversation))
        .route("/conversations/:id", get(get_conversation))
        .route("/conversations/:id/messages", get(list_messages))
        .route("/conversations/:id/messages", post(send_message))
        .route("/conversations/:id/read", post(mark_read))
        .route("/conversations/:id/unread-count", get(unread_count))
        .route("/conversations/:id/typing", post(set_typing))
        .route("/conversations/:id/participants", post(add_participant))
        .route(
            "/conversations/:id/participants/:user_id",
            delete(remove_participant),
        )
        .route("/messages/:id", put(edit_message))
        .route("/messages/:id", delete(delete_message));

    introspection.merge(Router::new().nest("/api/v1", api_v1))
}
