//! Gateway Integration Tests
//!
//! Each test spawns an in-process gateway backed by in-memory stores and talks
//! to it over real WebSocket connections. No external services are needed.
//!
//! Run with: cargo test -p integration-tests --test gateway_tests

use chat_common::{Claims, TokenType};
use chat_core::{Snowflake, UserStatus, DEFAULT_ROOM};
use integration_tests::{eventually, TestServer, QUIET_PERIOD, TEST_SECRET, TEST_TYPING_TTL};
use reqwest::StatusCode as HttpStatus;
use futures_util::StreamExt;
use serde_json::{json, Value};
use std::time::Duration;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::tungstenite::Message;

fn id_of(data: &Value) -> Snowflake {
    data["id"]
        .as_str()
        .expect("id should be a string")
        .parse()
        .expect("id should be a snowflake")
}

fn in_room(server: &TestServer, room: &str, user_id: Snowflake) -> bool {
    server
        .state
        .rooms()
        .members_of(room)
        .iter()
        .any(|member| member.user_id() == user_id)
}

fn close_code_of(frame: Option<tokio_tungstenite::tungstenite::protocol::CloseFrame<'_>>) -> u16 {
    u16::from(frame.expect("close frame should carry a code").code)
}

// ============================================================================
// Handshake Tests
// ============================================================================

#[tokio::test]
async fn test_health_check() {
    let server = TestServer::start().await.expect("Failed to start server");

    let response = reqwest::get(format!("{}/health", server.base_url()))
        .await
        .expect("Request failed");

    assert_eq!(response.status(), HttpStatus::OK);
    assert_eq!(response.text().await.unwrap(), "OK");
}

#[tokio::test]
async fn test_handshake_without_token_is_rejected() {
    let server = TestServer::start().await.expect("Failed to start server");

    let status = server
        .rejected_status(&server.gateway_url(), None)
        .await
        .unwrap();
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_handshake_with_invalid_token_is_rejected() {
    let server = TestServer::start().await.expect("Failed to start server");

    let url = format!("{}?token=not-a-jwt", server.gateway_url());
    let status = server.rejected_status(&url, None).await.unwrap();
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let status = server
        .rejected_status(&server.gateway_url(), Some("still-not-a-jwt"))
        .await
        .unwrap();
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_handshake_for_unknown_user_is_rejected() {
    let server = TestServer::start().await.expect("Failed to start server");

    // Valid signature, but the user was never stored
    let token = server.token_for(Snowflake::new(987_654_321)).unwrap();
    let url = format!("{}?token={token}", server.gateway_url());

    let status = server.rejected_status(&url, None).await.unwrap();
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(server.state.registry().is_empty());
}

#[tokio::test]
async fn test_handshake_with_bearer_header() {
    let server = TestServer::start().await.expect("Failed to start server");
    let alice = server.add_user("alice");

    let mut request = server.gateway_url().into_client_request().unwrap();
    request.headers_mut().insert(
        "Authorization",
        format!("Bearer {}", server.token_for(alice.id).unwrap())
            .parse()
            .unwrap(),
    );

    let (_stream, response) = connect_async(request).await.expect("Handshake failed");
    assert_eq!(response.status(), StatusCode::SWITCHING_PROTOCOLS);

    eventually(|| server.state.registry().is_online(alice.id))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_handshake_with_refresh_token_is_rejected() {
    let server = TestServer::start().await.expect("Failed to start server");
    let alice = server.add_user("alice");

    let now = chrono::Utc::now().timestamp();
    let claims = Claims {
        sub: alice.id.to_string(),
        iat: now,
        exp: now + 600,
        token_type: TokenType::Refresh,
    };
    let token = jsonwebtoken::encode(
        &jsonwebtoken::Header::default(),
        &claims,
        &jsonwebtoken::EncodingKey::from_secret(TEST_SECRET.as_bytes()),
    )
    .unwrap();

    let url = format!("{}?token={token}", server.gateway_url());
    let status = server.rejected_status(&url, None).await.unwrap();
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(!server.state.registry().is_online(alice.id));
}

// ============================================================================
// Presence Tests
// ============================================================================

#[tokio::test]
async fn test_connect_announces_presence() {
    let server = TestServer::start().await.expect("Failed to start server");
    let alice = server.add_user("alice");
    let bob = server.add_user("bob");

    let mut alice_ws = server.connect(&alice).await.unwrap();
    assert_eq!(
        server.users.presence_of(alice.id).map(|p| p.status),
        Some(UserStatus::Online)
    );

    let bob_url = format!(
        "{}?token={}",
        server.gateway_url(),
        server.token_for(bob.id).unwrap()
    );
    let (mut bob_raw, _) = connect_async(bob_url).await.unwrap();

    // The snapshot Bob receives already includes himself
    let snapshot = loop {
        match bob_raw.next().await {
            Some(Ok(Message::Text(text))) => {
                let event: Value = serde_json::from_str(&text).unwrap();
                if event["event"] == "online-users" {
                    break event;
                }
            }
            Some(Ok(_)) => {}
            other => panic!("unexpected frame: {other:?}"),
        }
    };
    let online: Vec<&str> = snapshot["data"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(Value::as_str)
        .collect();
    assert!(online.contains(&alice.id.to_string().as_str()));
    assert!(online.contains(&bob.id.to_string().as_str()));

    let change = alice_ws.recv_event("user-status-change").await.unwrap();
    assert_eq!(change["userId"], bob.id.to_string());
    assert_eq!(change["status"], "online");
    assert_eq!(change["username"], "bob");
}

#[tokio::test]
async fn test_disconnect_announces_offline() {
    let server = TestServer::start().await.expect("Failed to start server");
    let alice = server.add_user("alice");
    let bob = server.add_user("bob");

    let mut alice_ws = server.connect(&alice).await.unwrap();
    let bob_ws = server.connect(&bob).await.unwrap();
    bob_ws.close().await.unwrap();

    let change = loop {
        let change = alice_ws.recv_event("user-status-change").await.unwrap();
        if change["status"] == "offline" {
            break change;
        }
    };
    assert_eq!(change["userId"], bob.id.to_string());
    assert!(change["lastSeen"].is_string());

    eventually(|| !server.state.registry().is_online(bob.id))
        .await
        .unwrap();
    assert_eq!(
        server.users.presence_of(bob.id).map(|p| p.status),
        Some(UserStatus::Offline)
    );
}

#[tokio::test]
async fn test_reconnect_supersedes_previous_connection() {
    let server = TestServer::start().await.expect("Failed to start server");
    let alice = server.add_user("alice");
    let bob = server.add_user("bob");

    let mut bob_ws = server.connect(&bob).await.unwrap();
    let mut first = server.connect(&alice).await.unwrap();
    let mut second = server.connect(&alice).await.unwrap();

    let frame = first.recv_close().await.unwrap();
    assert_eq!(close_code_of(frame), 4006);

    second.sync().await.unwrap();
    tokio::time::sleep(QUIET_PERIOD).await;

    // The stale connection's teardown must not take Alice offline
    assert_eq!(server.state.registry().len(), 2);
    assert!(server.state.registry().is_online(alice.id));
    assert_eq!(
        server.users.presence_of(alice.id).map(|p| p.status),
        Some(UserStatus::Online)
    );

    let changes = bob_ws
        .collect_events("user-status-change", QUIET_PERIOD)
        .await;
    assert!(changes
        .iter()
        .all(|c| c["userId"] != alice.id.to_string() || c["status"] == "online"));
}

#[tokio::test]
async fn test_shutdown_closes_connections() {
    let server = TestServer::start().await.expect("Failed to start server");
    let alice = server.add_user("alice");

    let mut alice_ws = server.connect(&alice).await.unwrap();
    server.state.shutdown();

    let frame = alice_ws.recv_close().await.unwrap();
    assert_eq!(close_code_of(frame), 4010);
    assert!(server.state.registry().is_empty());
}

// ============================================================================
// Room Tests
// ============================================================================

#[tokio::test]
async fn test_join_and_leave_room() {
    let server = TestServer::start().await.expect("Failed to start server");
    let alice = server.add_user("alice");
    let bob = server.add_user("bob");

    let mut alice_ws = server.connect(&alice).await.unwrap();
    let mut bob_ws = server.connect(&bob).await.unwrap();
    alice_ws.join("general").await.unwrap();
    bob_ws.join("general").await.unwrap();

    let joined = alice_ws.recv_event("user-joined").await.unwrap();
    assert_eq!(joined["userId"], bob.id.to_string());
    assert_eq!(joined["room"], "general");

    bob_ws
        .send("leave-room", json!({ "room": "general" }))
        .await
        .unwrap();

    let left = bob_ws.recv_event("user-left").await.unwrap();
    assert_eq!(left["userId"], bob.id.to_string());
    let left = alice_ws.recv_event("user-left").await.unwrap();
    assert_eq!(left["userId"], bob.id.to_string());

    assert!(!in_room(&server, "general", bob.id));
}

#[tokio::test]
async fn test_room_message_fanout_and_notification() {
    let server = TestServer::start().await.expect("Failed to start server");
    let alice = server.add_user("alice");
    let bob = server.add_user("bob");
    let carol = server.add_user("carol");

    let mut alice_ws = server.connect(&alice).await.unwrap();
    let mut bob_ws = server.connect(&bob).await.unwrap();
    let mut carol_ws = server.connect(&carol).await.unwrap();
    alice_ws.join("general").await.unwrap();
    bob_ws.join("general").await.unwrap();

    alice_ws
        .send("send-message", json!({ "content": "hello room", "room": "general" }))
        .await
        .unwrap();

    let own = alice_ws.recv_event("new-message").await.unwrap();
    assert_eq!(own["content"], "hello room");
    assert_eq!(own["room"], "general");
    assert_eq!(own["isPrivate"], false);

    let received = bob_ws.recv_event("new-message").await.unwrap();
    assert_eq!(received["id"], own["id"]);
    assert_eq!(received["sender"]["username"], "alice");

    let notification = bob_ws.recv_event("notification").await.unwrap();
    assert_eq!(notification["type"], "new-message");
    assert_eq!(notification["message"], "alice: hello room");
    assert_eq!(notification["room"], "general");

    // The sender is never notified, and non-members see nothing
    alice_ws.expect_no_event("notification").await.unwrap();
    carol_ws.expect_no_event("new-message").await.unwrap();

    assert!(server.messages.get(id_of(&own)).is_some());
}

#[tokio::test]
async fn test_room_message_defaults_to_global_room() {
    let server = TestServer::start().await.expect("Failed to start server");
    let alice = server.add_user("alice");

    let mut alice_ws = server.connect(&alice).await.unwrap();
    alice_ws.join(DEFAULT_ROOM).await.unwrap();

    alice_ws
        .send("send-message", json!({ "content": "no room given" }))
        .await
        .unwrap();

    let message = alice_ws.recv_event("new-message").await.unwrap();
    assert_eq!(message["room"], DEFAULT_ROOM);
}

#[tokio::test]
async fn test_empty_message_is_rejected() {
    let server = TestServer::start().await.expect("Failed to start server");
    let alice = server.add_user("alice");

    let mut alice_ws = server.connect(&alice).await.unwrap();
    alice_ws.join("general").await.unwrap();

    alice_ws
        .send("send-message", json!({ "content": "   ", "room": "general" }))
        .await
        .unwrap();

    let error = alice_ws.recv_event("error").await.unwrap();
    assert_eq!(
        error["message"],
        "Message content or an attachment is required"
    );
    alice_ws.expect_no_event("new-message").await.unwrap();
}

#[tokio::test]
async fn test_persistence_failure_reports_error() {
    let server = TestServer::start().await.expect("Failed to start server");
    let alice = server.add_user("alice");

    let mut alice_ws = server.connect(&alice).await.unwrap();
    alice_ws.join("general").await.unwrap();
    server.messages.fail_writes(true);

    alice_ws
        .send("send-message", json!({ "content": "lost", "room": "general" }))
        .await
        .unwrap();

    let error = alice_ws.recv_event("error").await.unwrap();
    assert_eq!(error["message"], "Failed to send message");

    // The connection survives
    alice_ws.sync().await.unwrap();
    alice_ws.expect_no_event("new-message").await.unwrap();
}

// ============================================================================
// Private Message Tests
// ============================================================================

#[tokio::test]
async fn test_private_message_to_online_recipient() {
    let server = TestServer::start().await.expect("Failed to start server");
    let alice = server.add_user("alice");
    let bob = server.add_user("bob");

    let mut alice_ws = server.connect(&alice).await.unwrap();
    let mut bob_ws = server.connect(&bob).await.unwrap();

    alice_ws
        .send(
            "send-private-message",
            json!({ "content": "psst", "recipientId": bob.id.to_string() }),
        )
        .await
        .unwrap();

    let echo = alice_ws.recv_event("new-private-message").await.unwrap();
    assert_eq!(echo["isPrivate"], true);
    assert_eq!(echo["recipientId"], bob.id.to_string());
    assert_eq!(echo["recipient"]["username"], "bob");

    let received = bob_ws.recv_event("new-private-message").await.unwrap();
    assert_eq!(received["id"], echo["id"]);

    let notification = bob_ws.recv_event("notification").await.unwrap();
    assert_eq!(notification["type"], "private-message");
    assert_eq!(notification["fromId"], alice.id.to_string());
    assert_eq!(notification["unreadCount"], 1);
}

#[tokio::test]
async fn test_private_message_to_offline_recipient_is_stored_only() {
    let server = TestServer::start().await.expect("Failed to start server");
    let alice = server.add_user("alice");
    let bob = server.add_user("bob");

    let mut alice_ws = server.connect(&alice).await.unwrap();

    alice_ws
        .send(
            "send-private-message",
            json!({ "content": "see you later", "recipientId": bob.id.to_string() }),
        )
        .await
        .unwrap();

    alice_ws.recv_event("new-private-message").await.unwrap();
    assert_eq!(server.messages.inbox(bob.id).len(), 1);

    // Nothing is replayed when Bob shows up
    let mut bob_ws = server.connect(&bob).await.unwrap();
    bob_ws.expect_no_event("new-private-message").await.unwrap();
}

#[tokio::test]
async fn test_private_message_to_self_is_rejected() {
    let server = TestServer::start().await.expect("Failed to start server");
    let alice = server.add_user("alice");

    let mut alice_ws = server.connect(&alice).await.unwrap();

    alice_ws
        .send(
            "send-private-message",
            json!({ "content": "me", "recipientId": alice.id.to_string() }),
        )
        .await
        .unwrap();

    let error = alice_ws.recv_event("error").await.unwrap();
    assert_eq!(error["message"], "Cannot send a private message to yourself");
    assert!(server.messages.inbox(alice.id).is_empty());
}

#[tokio::test]
async fn test_private_message_to_unknown_user_is_rejected() {
    let server = TestServer::start().await.expect("Failed to start server");
    let alice = server.add_user("alice");

    let mut alice_ws = server.connect(&alice).await.unwrap();

    alice_ws
        .send(
            "send-private-message",
            json!({ "content": "anyone?", "recipientId": "123456789" }),
        )
        .await
        .unwrap();

    let error = alice_ws.recv_event("error").await.unwrap();
    assert_eq!(error["message"], "Unknown recipient");
}

// ============================================================================
// Reaction Tests
// ============================================================================

#[tokio::test]
async fn test_room_reaction_reaches_members_only() {
    let server = TestServer::start().await.expect("Failed to start server");
    let alice = server.add_user("alice");
    let bob = server.add_user("bob");
    let carol = server.add_user("carol");

    let mut alice_ws = server.connect(&alice).await.unwrap();
    let mut bob_ws = server.connect(&bob).await.unwrap();
    let mut carol_ws = server.connect(&carol).await.unwrap();
    alice_ws.join("general").await.unwrap();
    bob_ws.join("general").await.unwrap();

    alice_ws
        .send("send-message", json!({ "content": "react to me", "room": "general" }))
        .await
        .unwrap();
    let message = alice_ws.recv_event("new-message").await.unwrap();
    let message_id = id_of(&message);

    bob_ws
        .send(
            "add-reaction",
            json!({ "messageId": message_id.to_string(), "reactionType": "like" }),
        )
        .await
        .unwrap();

    for ws in [&mut alice_ws, &mut bob_ws] {
        let update = ws.recv_event("reaction-updated").await.unwrap();
        assert_eq!(update["messageId"], message_id.to_string());
        assert_eq!(
            update["reactions"],
            json!([{ "userId": bob.id.to_string(), "type": "like" }])
        );
    }
    carol_ws.expect_no_event("reaction-updated").await.unwrap();

    let stored = server.messages.get(message_id).unwrap();
    assert!(stored.reactions.contains(bob.id, chat_core::ReactionKind::Like));
}

#[tokio::test]
async fn test_room_reaction_skips_member_who_left() {
    let server = TestServer::start().await.expect("Failed to start server");
    let alice = server.add_user("alice");
    let carol = server.add_user("carol");

    let mut alice_ws = server.connect(&alice).await.unwrap();
    let mut carol_ws = server.connect(&carol).await.unwrap();
    alice_ws.join("general").await.unwrap();
    carol_ws.join("general").await.unwrap();

    alice_ws
        .send("send-message", json!({ "content": "before you go", "room": "general" }))
        .await
        .unwrap();
    let message = carol_ws.recv_event("new-message").await.unwrap();

    carol_ws
        .send("leave-room", json!({ "room": "general" }))
        .await
        .unwrap();
    carol_ws.recv_event("user-left").await.unwrap();

    alice_ws
        .send(
            "add-reaction",
            json!({ "messageId": message["id"], "reactionType": "wow" }),
        )
        .await
        .unwrap();

    alice_ws.recv_event("reaction-updated").await.unwrap();
    carol_ws.expect_no_event("reaction-updated").await.unwrap();
}

#[tokio::test]
async fn test_concurrent_reactions_are_all_kept() {
    let server = TestServer::start().await.expect("Failed to start server");
    let alice = server.add_user("alice");
    let bob = server.add_user("bob");

    let mut alice_ws = server.connect(&alice).await.unwrap();
    let mut bob_ws = server.connect(&bob).await.unwrap();
    alice_ws.join("general").await.unwrap();
    bob_ws.join("general").await.unwrap();

    alice_ws
        .send("send-message", json!({ "content": "pile on", "room": "general" }))
        .await
        .unwrap();
    let message = alice_ws.recv_event("new-message").await.unwrap();
    let message_id = id_of(&message);

    // Both toggles load the message while the other is in flight
    server.messages.delay_reads(Duration::from_millis(200));

    let reaction = json!({ "messageId": message_id.to_string(), "reactionType": "like" });
    alice_ws.send("add-reaction", reaction.clone()).await.unwrap();
    bob_ws.send("add-reaction", reaction).await.unwrap();

    alice_ws.recv_event("reaction-updated").await.unwrap();
    let last = alice_ws.recv_event("reaction-updated").await.unwrap();
    assert_eq!(last["reactions"].as_array().unwrap().len(), 2);

    let stored = server.messages.get(message_id).unwrap();
    assert!(stored.reactions.contains(alice.id, chat_core::ReactionKind::Like));
    assert!(stored.reactions.contains(bob.id, chat_core::ReactionKind::Like));
}

#[tokio::test]
async fn test_reaction_toggle_twice_restores_state() {
    let server = TestServer::start().await.expect("Failed to start server");
    let alice = server.add_user("alice");
    let bob = server.add_user("bob");

    let mut alice_ws = server.connect(&alice).await.unwrap();
    let mut bob_ws = server.connect(&bob).await.unwrap();

    alice_ws
        .send(
            "send-private-message",
            json!({ "content": "dm", "recipientId": bob.id.to_string() }),
        )
        .await
        .unwrap();
    let message = alice_ws.recv_event("new-private-message").await.unwrap();
    let message_id = id_of(&message);

    let reaction = json!({ "messageId": message_id.to_string(), "reactionType": "love" });
    bob_ws.send("add-reaction", reaction.clone()).await.unwrap();
    let update = alice_ws.recv_event("reaction-updated").await.unwrap();
    assert_eq!(update["reactions"].as_array().unwrap().len(), 1);

    bob_ws.send("add-reaction", reaction).await.unwrap();
    let update = alice_ws.recv_event("reaction-updated").await.unwrap();
    assert_eq!(update["reactions"], json!([]));

    // Bob, as the actor, sees both updates too
    let updates = bob_ws
        .collect_events("reaction-updated", QUIET_PERIOD)
        .await;
    assert_eq!(updates.len(), 2);

    let stored = server.messages.get(message_id).unwrap();
    assert_eq!(stored.reactions.iter().count(), 0);
}

#[tokio::test]
async fn test_unknown_reaction_type_is_rejected() {
    let server = TestServer::start().await.expect("Failed to start server");
    let alice = server.add_user("alice");

    let mut alice_ws = server.connect(&alice).await.unwrap();
    alice_ws.join("general").await.unwrap();
    alice_ws
        .send("send-message", json!({ "content": "hi", "room": "general" }))
        .await
        .unwrap();
    let message = alice_ws.recv_event("new-message").await.unwrap();

    alice_ws
        .send(
            "add-reaction",
            json!({ "messageId": message["id"], "reactionType": "boom" }),
        )
        .await
        .unwrap();

    let error = alice_ws.recv_event("error").await.unwrap();
    assert_eq!(error["message"], "unknown reaction type: boom");
}

#[tokio::test]
async fn test_reaction_on_missing_message_is_silent() {
    let server = TestServer::start().await.expect("Failed to start server");
    let alice = server.add_user("alice");

    let mut alice_ws = server.connect(&alice).await.unwrap();
    alice_ws
        .send(
            "add-reaction",
            json!({ "messageId": "42", "reactionType": "like" }),
        )
        .await
        .unwrap();

    alice_ws.sync().await.unwrap();
    alice_ws.expect_no_event("error").await.unwrap();
    alice_ws.expect_no_event("reaction-updated").await.unwrap();
}

// ============================================================================
// Read Receipt Tests
// ============================================================================

#[tokio::test]
async fn test_read_receipt_sent_once() {
    let server = TestServer::start().await.expect("Failed to start server");
    let alice = server.add_user("alice");
    let bob = server.add_user("bob");

    let mut alice_ws = server.connect(&alice).await.unwrap();
    let mut bob_ws = server.connect(&bob).await.unwrap();

    alice_ws
        .send(
            "send-private-message",
            json!({ "content": "read me", "recipientId": bob.id.to_string() }),
        )
        .await
        .unwrap();
    let message = bob_ws.recv_event("new-private-message").await.unwrap();
    let message_id = id_of(&message);

    let read = json!({ "messageId": message_id.to_string() });
    bob_ws.send("message-read", read.clone()).await.unwrap();
    bob_ws.send("message-read", read).await.unwrap();
    bob_ws.sync().await.unwrap();

    let receipts = alice_ws
        .collect_events("message-read-receipt", QUIET_PERIOD)
        .await;
    assert_eq!(receipts.len(), 1);
    assert_eq!(receipts[0]["messageId"], message_id.to_string());
    assert_eq!(receipts[0]["readBy"], bob.id.to_string());
    assert_eq!(receipts[0]["username"], "bob");

    let stored = server.messages.get(message_id).unwrap();
    assert_eq!(stored.read_by.len(), 1);
    bob_ws.expect_no_event("error").await.unwrap();
}

#[tokio::test]
async fn test_sender_reading_own_message_is_ignored() {
    let server = TestServer::start().await.expect("Failed to start server");
    let alice = server.add_user("alice");
    let bob = server.add_user("bob");

    let mut alice_ws = server.connect(&alice).await.unwrap();
    alice_ws
        .send(
            "send-private-message",
            json!({ "content": "mine", "recipientId": bob.id.to_string() }),
        )
        .await
        .unwrap();
    let message = alice_ws.recv_event("new-private-message").await.unwrap();
    let message_id = id_of(&message);

    alice_ws
        .send("message-read", json!({ "messageId": message_id.to_string() }))
        .await
        .unwrap();

    alice_ws
        .expect_no_event("message-read-receipt")
        .await
        .unwrap();
    assert!(server.messages.get(message_id).unwrap().read_by.is_empty());
}

// ============================================================================
// Typing Tests
// ============================================================================

#[tokio::test]
async fn test_typing_expires_with_single_stop() {
    let server = TestServer::start().await.expect("Failed to start server");
    let alice = server.add_user("alice");
    let bob = server.add_user("bob");

    let mut alice_ws = server.connect(&alice).await.unwrap();
    let mut bob_ws = server.connect(&bob).await.unwrap();
    alice_ws.join("general").await.unwrap();
    bob_ws.join("general").await.unwrap();

    alice_ws
        .send("typing-start", json!({ "room": "general" }))
        .await
        .unwrap();

    let typing = bob_ws.recv_event("user-typing").await.unwrap();
    assert_eq!(typing["userId"], alice.id.to_string());
    assert_eq!(typing["username"], "alice");
    assert_eq!(typing["room"], "general");

    let stops = bob_ws
        .collect_events("user-stopped-typing", TEST_TYPING_TTL * 3)
        .await;
    assert_eq!(stops.len(), 1);
    assert_eq!(stops[0]["userId"], alice.id.to_string());

    // The typer does not hear about their own indicator
    alice_ws.expect_no_event("user-typing").await.unwrap();
    assert!(!server.state.typing().is_typing(
        &chat_gateway::typing::TypingKey::Room("general".to_string()),
        alice.id
    ));
}

#[tokio::test]
async fn test_typing_stop_cancels_expiry() {
    let server = TestServer::start().await.expect("Failed to start server");
    let alice = server.add_user("alice");
    let bob = server.add_user("bob");

    let mut alice_ws = server.connect(&alice).await.unwrap();
    let mut bob_ws = server.connect(&bob).await.unwrap();
    alice_ws.join("general").await.unwrap();
    bob_ws.join("general").await.unwrap();

    alice_ws
        .send("typing-start", json!({ "room": "general" }))
        .await
        .unwrap();
    bob_ws.recv_event("user-typing").await.unwrap();

    alice_ws
        .send("typing-stop", json!({ "room": "general" }))
        .await
        .unwrap();
    // A second stop has nothing to clear
    alice_ws
        .send("typing-stop", json!({ "room": "general" }))
        .await
        .unwrap();

    let stops = bob_ws
        .collect_events("user-stopped-typing", TEST_TYPING_TTL * 3)
        .await;
    assert_eq!(stops.len(), 1);
}

#[tokio::test]
async fn test_direct_typing_reaches_counterpart() {
    let server = TestServer::start().await.expect("Failed to start server");
    let alice = server.add_user("alice");
    let bob = server.add_user("bob");
    let carol = server.add_user("carol");

    let mut alice_ws = server.connect(&alice).await.unwrap();
    let mut bob_ws = server.connect(&bob).await.unwrap();
    let mut carol_ws = server.connect(&carol).await.unwrap();

    alice_ws
        .send("typing-start", json!({ "recipientId": bob.id.to_string() }))
        .await
        .unwrap();

    let typing = bob_ws.recv_event("user-typing").await.unwrap();
    assert_eq!(typing["userId"], alice.id.to_string());
    assert_eq!(typing["isPrivate"], true);

    carol_ws.expect_no_event("user-typing").await.unwrap();
}

#[tokio::test]
async fn test_disconnect_clears_typing() {
    let server = TestServer::start().await.expect("Failed to start server");
    let alice = server.add_user("alice");
    let bob = server.add_user("bob");

    let mut alice_ws = server.connect(&alice).await.unwrap();
    let mut bob_ws = server.connect(&bob).await.unwrap();
    alice_ws.join("general").await.unwrap();
    bob_ws.join("general").await.unwrap();

    bob_ws
        .send("typing-start", json!({ "recipientId": alice.id.to_string() }))
        .await
        .unwrap();
    alice_ws.recv_event("user-typing").await.unwrap();

    bob_ws.close().await.unwrap();

    let stopped = alice_ws.recv_event("user-stopped-typing").await.unwrap();
    assert_eq!(stopped["userId"], bob.id.to_string());

    let stops = alice_ws
        .collect_events("user-stopped-typing", TEST_TYPING_TTL * 2)
        .await;
    assert!(stops.is_empty());
}

#[tokio::test]
async fn test_typing_refresh_is_announced_once() {
    let server = TestServer::start().await.expect("Failed to start server");
    let alice = server.add_user("alice");
    let bob = server.add_user("bob");

    let mut alice_ws = server.connect(&alice).await.unwrap();
    let mut bob_ws = server.connect(&bob).await.unwrap();
    alice_ws.join("general").await.unwrap();
    bob_ws.join("general").await.unwrap();

    for _ in 0..3 {
        alice_ws
            .send("typing-start", json!({ "room": "general" }))
            .await
            .unwrap();
    }
    alice_ws.sync().await.unwrap();

    let typing = bob_ws
        .collect_events("user-typing", TEST_TYPING_TTL / 2)
        .await;
    assert_eq!(typing.len(), 1);

    // Refreshes still end in a single stop
    let stops = bob_ws
        .collect_events("user-stopped-typing", TEST_TYPING_TTL * 3)
        .await;
    assert_eq!(stops.len(), 1);
}

// ============================================================================
// Protocol Tests
// ============================================================================

#[tokio::test]
async fn test_heartbeat_ack() {
    let server = TestServer::start().await.expect("Failed to start server");
    let alice = server.add_user("alice");

    let mut alice_ws = server.connect(&alice).await.unwrap();
    alice_ws.sync().await.unwrap();
}

#[tokio::test]
async fn test_undecodable_frame_keeps_connection_open() {
    let server = TestServer::start().await.expect("Failed to start server");
    let alice = server.add_user("alice");

    let mut alice_ws = server.connect(&alice).await.unwrap();
    alice_ws
        .send_raw(Message::Text("not json".to_string()))
        .await
        .unwrap();

    let error = alice_ws.recv_event("error").await.unwrap();
    assert!(error["message"]
        .as_str()
        .unwrap()
        .starts_with("Invalid event"));

    alice_ws.send("rename-room", json!({})).await.unwrap();
    alice_ws.recv_event("error").await.unwrap();

    alice_ws.sync().await.unwrap();
}

#[tokio::test]
async fn test_binary_frame_closes_connection() {
    let server = TestServer::start().await.expect("Failed to start server");
    let alice = server.add_user("alice");

    let mut alice_ws = server.connect(&alice).await.unwrap();
    alice_ws
        .send_raw(Message::Binary(vec![1, 2, 3]))
        .await
        .unwrap();

    let frame = alice_ws.recv_close().await.unwrap();
    assert_eq!(close_code_of(frame), 4002);

    eventually(|| !server.state.registry().is_online(alice.id))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_room_membership_cleared_on_disconnect() {
    let server = TestServer::start().await.expect("Failed to start server");
    let alice = server.add_user("alice");

    let mut alice_ws = server.connect(&alice).await.unwrap();
    alice_ws.join("general").await.unwrap();
    alice_ws.join("random").await.unwrap();
    assert_eq!(server.state.rooms().room_count(), 2);

    alice_ws.close().await.unwrap();

    eventually(|| server.state.rooms().room_count() == 0)
        .await
        .unwrap();
    assert!(!in_room(&server, "general", alice.id));
}
