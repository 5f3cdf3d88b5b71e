mod common;

use std::time::Duration;

use common::{create_direct, send_message, spawn_app, start_postgres};
use conversation_service::events::{ConversationEvent, EventBus};
use uuid::Uuid;

#[tokio::test]
#[ignore = "requires docker"]
async fn typing_start_and_stop_fan_out_to_subscribers() {
    let (_pg, pool) = start_postgres().await;
    let app = spawn_app(pool).await;
    let client = reqwest::Client::new();
    let (u1, u2) = (Uuid::new_v4(), Uuid::new_v4());
    let conv = create_direct(&client, &app.base, u1, u2).await;
    let conv = Uuid::parse_str(conv["id"].as_str().unwrap()).unwrap();

    let mut rx = app.bus.subscribe(conv).await;

    let resp = client
        .post(format!("{}/api/v1/conversations/{conv}/typing", app.base))
        .json(&serde_json::json!({ "user_id": u1, "is_typing": true }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 204);

    match rx.recv().await.unwrap() {
        ConversationEvent::TypingStarted {
            conversation_id,
            user_id,
        } => {
            assert_eq!(conversation_id, conv);
            assert_eq!(user_id, u1);
        }
        other => panic!("expected typing.started, got {}", other.event_type()),
    }

    client
        .post(format!("{}/api/v1/conversations/{conv}/typing", app.base))
        .json(&serde_json::json!({ "user_id": u1, "is_typing": false }))
        .send()
        .await
        .unwrap();

    match rx.recv().await.unwrap() {
        ConversationEvent::TypingStopped { user_id, .. } => assert_eq!(user_id, u1),
        other => panic!("expected typing.stopped, got {}", other.event_type()),
    }
}

#[tokio::test]
#[ignore = "requires docker"]
async fn outsiders_cannot_signal_typing() {
    let (_pg, pool) = start_postgres().await;
    let app = spawn_app(pool).await;
    let client = reqwest::Client::new();
    let conv = create_direct(&client, &app.base, Uuid::new_v4(), Uuid::new_v4()).await;
    let conv = Uuid::parse_str(conv["id"].as_str().unwrap()).unwrap();

    let resp = client
        .post(format!("{}/api/v1/conversations/{conv}/typing", app.base))
        .json(&serde_json::json!({ "user_id": Uuid::new_v4(), "is_typing": true }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 403);
}

// The harness runs with a one second typing TTL.
#[tokio::test]
#[ignore = "requires docker"]
async fn typing_state_expires_without_an_explicit_stop() {
    let (_pg, pool) = start_postgres().await;
    let app = spawn_app(pool).await;
    let client = reqwest::Client::new();
    let (u1, u2) = (Uuid::new_v4(), Uuid::new_v4());
    let conv = create_direct(&client, &app.base, u1, u2).await;
    let conv = Uuid::parse_str(conv["id"].as_str().unwrap()).unwrap();

    client
        .post(format!("{}/api/v1/conversations/{conv}/typing", app.base))
        .json(&serde_json::json!({ "user_id": u1, "is_typing": true }))
        .send()
        .await
        .unwrap();
    assert_eq!(app.typing.typing_users(conv).await, vec![u1]);

    tokio::time::sleep(Duration::from_millis(1200)).await;
    assert!(app.typing.typing_users(conv).await.is_empty());
}

#[tokio::test]
#[ignore = "requires docker"]
async fn sending_a_message_publishes_to_the_conversation_topic() {
    let (_pg, pool) = start_postgres().await;
    let app = spawn_app(pool).await;
    let client = reqwest::Client::new();
    let (u1, u2) = (Uuid::new_v4(), Uuid::new_v4());
    let conv = create_direct(&client, &app.base, u1, u2).await;
    let conv = Uuid::parse_str(conv["id"].as_str().unwrap()).unwrap();

    let mut rx = app.bus.subscribe(conv).await;
    let sent = send_message(&client, &app.base, conv, u1, "ping").await;

    match rx.recv().await.unwrap() {
        ConversationEvent::MessageNew {
            conversation_id,
            message_id,
            sender_id,
        } => {
            assert_eq!(conversation_id, conv);
            assert_eq!(message_id, sent["id"].as_i64().unwrap());
            assert_eq!(sender_id, u1);
        }
        other => panic!("expected message.new, got {}", other.event_type()),
    }

    // Events never leak into other conversations.
    let other_conv = create_direct(&client, &app.base, u1, Uuid::new_v4()).await;
    let other_conv = Uuid::parse_str(other_conv["id"].as_str().unwrap()).unwrap();
    send_message(&client, &app.base, other_conv, u1, "elsewhere").await;
    assert!(
        tokio::time::timeout(Duration::from_millis(200), rx.recv())
            .await
            .is_err()
    );
}
