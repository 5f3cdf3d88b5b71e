mod common;

use common::{create_direct, send_message, spawn_app, start_postgres};
use uuid::Uuid;

async fn unread(app: &common::TestApp, client: &reqwest::Client, conv: Uuid, user: Uuid) -> i64 {
    let body: serde_json::Value = client
        .get(format!("{}/api/v1/conversations/{conv}/unread-count", app.base))
        .query(&[("user_id", user.to_string())])
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    body["unread"].as_i64().unwrap()
}

/// The end-to-end scenario from the product spec: simultaneous DM create,
/// two messages, newest-first page, read marker, unread derivation.
#[tokio::test]
#[ignore = "requires docker"]
async fn direct_message_exchange_end_to_end() {
    let (_pg, pool) = start_postgres().await;
    let app = spawn_app(pool).await;
    let client = reqwest::Client::new();
    let (u1, u2) = (Uuid::new_v4(), Uuid::new_v4());

    let c1 = create_direct(&client, &app.base, u1, u2).await;
    let c1_again = create_direct(&client, &app.base, u2, u1).await;
    assert_eq!(c1["id"], c1_again["id"]);
    let conv = Uuid::parse_str(c1["id"].as_str().unwrap()).unwrap();

    let m1 = send_message(&client, &app.base, conv, u1, "hi").await;
    let m2 = send_message(&client, &app.base, conv, u2, "hello").await;
    let (id1, id2) = (m1["id"].as_i64().unwrap(), m2["id"].as_i64().unwrap());
    assert!(id2 > id1, "ids must increase in call order");

    let page: serde_json::Value = client
        .get(format!("{}/api/v1/conversations/{conv}/messages", app.base))
        .query(&[("limit", "10")])
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let ids: Vec<i64> = page
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["id"].as_i64().unwrap())
        .collect();
    assert_eq!(ids, vec![id2, id1], "default page is newest first");

    let resp = client
        .post(format!("{}/api/v1/conversations/{conv}/read", app.base))
        .json(&serde_json::json!({ "user_id": u2, "message_id": id2 }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 204);
    assert_eq!(unread(&app, &client, conv, u2).await, 0);

    let m3 = send_message(&client, &app.base, conv, u1, "anyone there?").await;
    assert_eq!(unread(&app, &client, conv, u2).await, 1);

    // A stale marker is a no-op, not an error.
    let resp = client
        .post(format!("{}/api/v1/conversations/{conv}/read", app.base))
        .json(&serde_json::json!({ "user_id": u2, "message_id": id1 }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 204);
    assert_eq!(unread(&app, &client, conv, u2).await, 1);

    // Catch up fully.
    let id3 = m3["id"].as_i64().unwrap();
    client
        .post(format!("{}/api/v1/conversations/{conv}/read", app.base))
        .json(&serde_json::json!({ "user_id": u2, "message_id": id3 }))
        .send()
        .await
        .unwrap();
    assert_eq!(unread(&app, &client, conv, u2).await, 0);

    // No marker at all: everything counts as unread for u1.
    assert_eq!(unread(&app, &client, conv, u1).await, 3);
}

#[tokio::test]
#[ignore = "requires docker"]
async fn cursor_paging_in_both_directions() {
    let (_pg, pool) = start_postgres().await;
    let app = spawn_app(pool).await;
    let client = reqwest::Client::new();
    let (u1, u2) = (Uuid::new_v4(), Uuid::new_v4());
    let conv = create_direct(&client, &app.base, u1, u2).await;
    let conv = Uuid::parse_str(conv["id"].as_str().unwrap()).unwrap();

    let mut ids = Vec::new();
    for n in 1..=5 {
        let m = send_message(&client, &app.base, conv, u1, &format!("m{n}")).await;
        ids.push(m["id"].as_i64().unwrap());
    }

    // Backward from m3: the two older messages, newest of them first.
    let page: serde_json::Value = client
        .get(format!("{}/api/v1/conversations/{conv}/messages", app.base))
        .query(&[("before_id", ids[2].to_string()), ("limit", "10".into())])
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let got: Vec<i64> = page
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["id"].as_i64().unwrap())
        .collect();
    assert_eq!(got, vec![ids[1], ids[0]]);

    // Forward from m3: ascending.
    let page: serde_json::Value = client
        .get(format!("{}/api/v1/conversations/{conv}/messages", app.base))
        .query(&[("after_id", ids[2].to_string()), ("limit", "10".into())])
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let got: Vec<i64> = page
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["id"].as_i64().unwrap())
        .collect();
    assert_eq!(got, vec![ids[3], ids[4]]);

    // Both cursors at once make no sense.
    let resp = client
        .get(format!("{}/api/v1/conversations/{conv}/messages", app.base))
        .query(&[
            ("before_id", ids[2].to_string()),
            ("after_id", ids[2].to_string()),
        ])
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
}

#[tokio::test]
#[ignore = "requires docker"]
async fn append_validation_and_membership() {
    let (_pg, pool) = start_postgres().await;
    let app = spawn_app(pool).await;
    let client = reqwest::Client::new();
    let (u1, u2) = (Uuid::new_v4(), Uuid::new_v4());
    let conv = create_direct(&client, &app.base, u1, u2).await;
    let conv = Uuid::parse_str(conv["id"].as_str().unwrap()).unwrap();

    // Outsider sender never silently succeeds.
    let resp = client
        .post(format!("{}/api/v1/conversations/{conv}/messages", app.base))
        .json(&serde_json::json!({ "sender_id": Uuid::new_v4(), "content": "sneaky" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 403);

    // Neither content nor media.
    let resp = client
        .post(format!("{}/api/v1/conversations/{conv}/messages", app.base))
        .json(&serde_json::json!({ "sender_id": u1 }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);

    // Blank content with no media is equally empty.
    let resp = client
        .post(format!("{}/api/v1/conversations/{conv}/messages", app.base))
        .json(&serde_json::json!({ "sender_id": u1, "content": "   " }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);

    // Media-only is a valid message.
    let resp = client
        .post(format!("{}/api/v1/conversations/{conv}/messages", app.base))
        .json(&serde_json::json!({ "sender_id": u1, "media_ref": "blob/abc123" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);

    // reply_to must live in the same conversation.
    let other_conv = create_direct(&client, &app.base, u1, Uuid::new_v4()).await;
    let other_conv = Uuid::parse_str(other_conv["id"].as_str().unwrap()).unwrap();
    let foreign = send_message(&client, &app.base, other_conv, u1, "elsewhere").await;
    let resp = client
        .post(format!("{}/api/v1/conversations/{conv}/messages", app.base))
        .json(&serde_json::json!({
            "sender_id": u1,
            "content": "re",
            "reply_to": foreign["id"].as_i64().unwrap(),
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
}

#[tokio::test]
#[ignore = "requires docker"]
async fn edit_is_sender_only_and_keeps_the_id() {
    let (_pg, pool) = start_postgres().await;
    let app = spawn_app(pool).await;
    let client = reqwest::Client::new();
    let (u1, u2) = (Uuid::new_v4(), Uuid::new_v4());
    let conv = create_direct(&client, &app.base, u1, u2).await;
    let conv = Uuid::parse_str(conv["id"].as_str().unwrap()).unwrap();
    let msg = send_message(&client, &app.base, conv, u1, "teh message").await;
    let msg_id = msg["id"].as_i64().unwrap();

    let resp = client
        .put(format!("{}/api/v1/messages/{msg_id}", app.base))
        .json(&serde_json::json!({ "requester_id": u2, "content": "hijacked" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 403);

    let edited: serde_json::Value = client
        .put(format!("{}/api/v1/messages/{msg_id}", app.base))
        .json(&serde_json::json!({ "requester_id": u1, "content": "the message" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(edited["id"].as_i64().unwrap(), msg_id);
    assert_eq!(edited["content"], "the message");
    assert!(edited["edited_at"].is_string());
}

#[tokio::test]
#[ignore = "requires docker"]
async fn delete_requires_sender_or_privileged_role() {
    let (_pg, pool) = start_postgres().await;
    let app = spawn_app(pool).await;
    let client = reqwest::Client::new();
    let owner = Uuid::new_v4();
    let member = Uuid::new_v4();

    let conv: serde_json::Value = client
        .post(format!("{}/api/v1/conversations", app.base))
        .json(&serde_json::json!({
            "creator_id": owner,
            "kind": "group",
            "participant_ids": [member],
            "title": "party",
        }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let conv = Uuid::parse_str(conv["id"].as_str().unwrap()).unwrap();

    let owners_msg = send_message(&client, &app.base, conv, owner, "keep out").await;
    let owners_msg = owners_msg["id"].as_i64().unwrap();

    // A plain member cannot delete someone else's message.
    let resp = client
        .delete(format!("{}/api/v1/messages/{owners_msg}", app.base))
        .query(&[("requester_id", member.to_string())])
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 403);

    // The owner can delete a member's message; the row is gone for good.
    let members_msg = send_message(&client, &app.base, conv, member, "oops").await;
    let members_msg = members_msg["id"].as_i64().unwrap();
    let resp = client
        .delete(format!("{}/api/v1/messages/{members_msg}", app.base))
        .query(&[("requester_id", owner.to_string())])
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 204);
    let remaining: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM messages WHERE id = $1")
        .bind(members_msg)
        .fetch_one(&app.db)
        .await
        .unwrap();
    assert_eq!(remaining, 0);

    // Deleting it again distinguishes not-found from not-allowed.
    let resp = client
        .delete(format!("{}/api/v1/messages/{members_msg}", app.base))
        .query(&[("requester_id", owner.to_string())])
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
}
