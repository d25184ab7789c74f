#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

mod common;

use std::sync::Arc;

use wshub_gateway::dispatch::{MessageRouter, RouteOutcome};
use wshub_gateway::hub::ConnectionHub;
use wshub_gateway::services;

use common::connect;

fn setup() -> (Arc<ConnectionHub>, MessageRouter) {
    let hub = Arc::new(ConnectionHub::default());
    let mut router = MessageRouter::with_builtins(Arc::clone(&hub));
    services::register(&mut router);
    (hub, router)
}

#[tokio::test]
async fn join_notifies_existing_members() {
    let (hub, router) = setup();
    let alice = connect(&hub, "a", Some("alice"));
    let bob = connect(&hub, "b", Some("bob"));

    router.handle_incoming("a", r#"{"type":"join_room","room_id":"lobby"}"#).await;
    router.handle_incoming("b", r#"{"type":"join_room","data":{"room_id":"lobby"}}"#).await;

    let joined = &bob.of_type("room_joined")[0];
    assert_eq!(joined["room_id"], "lobby");
    assert_eq!(joined["data"]["member_count"], 2);

    let updates = alice.of_type("room_update");
    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0]["data"]["action"], "user_joined");
    assert_eq!(updates[0]["data"]["user_id"], "bob");
    assert_eq!(updates[0]["data"]["member_count"], 2);
    assert!(bob.of_type("room_update").is_empty());
}

#[tokio::test]
async fn leave_notifies_remaining_members() {
    let (hub, router) = setup();
    let alice = connect(&hub, "a", Some("alice"));
    let bob = connect(&hub, "b", Some("bob"));
    hub.subscribe("a", "lobby").unwrap();
    hub.subscribe("b", "lobby").unwrap();

    router.handle_incoming("b", r#"{"type":"leave_room","room_id":"lobby"}"#).await;

    assert!(!hub.is_member("lobby", "b"));
    assert_eq!(bob.of_type("room_left")[0]["data"]["member_count"], 1);
    let update = &alice.of_type("room_update")[0];
    assert_eq!(update["data"]["action"], "user_left");
    assert_eq!(update["data"]["user_id"], "bob");

    // Leaving again is harmless and announces nothing.
    router.handle_incoming("b", r#"{"type":"leave_room","room_id":"lobby"}"#).await;
    assert_eq!(alice.of_type("room_update").len(), 1);
}

#[tokio::test]
async fn room_message_relays_to_other_members() {
    let (hub, router) = setup();
    let alice = connect(&hub, "a", Some("alice"));
    let bob = connect(&hub, "b", Some("bob"));
    let carol = connect(&hub, "c", Some("carol"));
    hub.subscribe("a", "lobby").unwrap();
    hub.subscribe("b", "lobby").unwrap();

    let out = router
        .handle_incoming(
            "a",
            r#"{"type":"room_message","room_id":"lobby","payload":{"text":"hi"},"agent_id":"planner"}"#,
        )
        .await;

    assert_eq!(out, RouteOutcome::Handled);
    assert!(alice.of_type("room_message").is_empty());
    assert!(carol.of_type("room_message").is_empty());
    let got = &bob.of_type("room_message")[0];
    assert_eq!(got["room_id"], "lobby");
    assert_eq!(got["user_id"], "alice");
    assert_eq!(got["agent_id"], "planner");
    assert_eq!(got["data"]["text"], "hi");
}

#[tokio::test]
async fn room_message_requires_membership() {
    let (hub, router) = setup();
    let outsider = connect(&hub, "x", None);
    let member = connect(&hub, "m", None);
    hub.subscribe("m", "lobby").unwrap();

    let out = router
        .handle_incoming("x", r#"{"type":"room_message","room_id":"lobby","payload":{}}"#)
        .await;

    assert_eq!(out, RouteOutcome::HandlerFailed);
    let err = &outsider.of_type("error")[0];
    assert_eq!(err["code"], "BAD_REQUEST");
    assert!(err["detail"].as_str().unwrap().contains("not a member"));
    assert_eq!(member.count(), 0);
}

#[tokio::test]
async fn stats_reports_counts_and_own_channels() {
    let (hub, router) = setup();
    let a = connect(&hub, "a", None);
    connect(&hub, "b", None);
    hub.subscribe("a", "beta").unwrap();
    hub.subscribe("a", "alpha").unwrap();
    hub.subscribe("b", "gamma").unwrap();

    router.handle_incoming("a", r#"{"type":"get_stats"}"#).await;

    let stats = &a.of_type("stats")[0];
    assert_eq!(stats["data"]["connection_count"], 2);
    assert_eq!(stats["data"]["channel_count"], 3);
    assert_eq!(stats["data"]["subscribed_channels"], serde_json::json!(["alpha", "beta"]));
}
