//! End-to-end tests over the local host.

use futures_util::FutureExt;
use presence_client::local::LocalHost;
use presence_client::{ClientConfig, Presence};
use presence_core::{EventHandler, PresenceError, EVENTS};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "presence_client=debug".into()),
        )
        .with_test_writer()
        .try_init();
}

fn raw_userstate(user: &str, status: &str) -> Value {
    json!({
        "id": format!("evt-{user}-{status}"),
        "event": "event:usersub.userstate",
        "data": {
            "eventType": "usersub.userstate",
            "user": user,
            "ttl": 300,
            "compositions": [
                {"type": "availability", "composition": {"type": status}},
                {"type": "lastActivity", "composition": {"lastActiveTime": "2024-05-01T10:00:00Z"}},
            ],
        },
    })
}

fn collecting_handler(seen: Arc<Mutex<Vec<Value>>>) -> EventHandler {
    Arc::new(move |payload: Value| {
        let seen = seen.clone();
        async move {
            seen.lock().unwrap().push(payload);
        }
        .boxed()
    })
}

fn client(local: &LocalHost) -> Presence {
    let config = ClientConfig::from_toml("default_ttl = 600\nbatch_limit = 50").unwrap();
    Presence::with_config(local.host(), config)
}

#[tokio::test]
async fn test_raw_event_reaches_cache_and_wildcard() {
    init_tracing();
    let local = LocalHost::recording();
    let presence = client(&local);
    presence.initialize().await.unwrap();

    let seen = Arc::new(Mutex::new(Vec::new()));
    let id = presence.stream().on_all(collecting_handler(seen.clone()));

    local
        .bus
        .inject("usersub.userstate", raw_userstate("person-a", "active"))
        .await
        .unwrap();

    let records = presence.presences();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].subject, "person-a");
    assert_eq!(records[0].status, "active");
    assert_eq!(records[0].expires_ttl, 300);

    let seen_events = seen.lock().unwrap().clone();
    assert_eq!(seen_events.len(), 1);
    assert_eq!(seen_events[0]["event"], EVENTS.external.userstate);
    assert_eq!(seen_events[0]["id"], "evt-person-a-active");

    assert!(presence.stream().off_all(id));
}

#[tokio::test]
async fn test_unrecognized_and_malformed_events_are_dropped() {
    init_tracing();
    let local = LocalHost::recording();
    let presence = client(&local);
    presence.initialize().await.unwrap();

    local
        .bus
        .inject(
            "usersub.userstate",
            json!({"data": {"eventType": "apheleia.subscription_update"}}),
        )
        .await
        .unwrap();

    let mut malformed = raw_userstate("person-a", "active");
    malformed["data"]["compositions"] = json!([]);
    local
        .bus
        .inject("usersub.userstate", malformed)
        .await
        .unwrap();

    assert!(presence.presences().is_empty());
    // The malformed event is still broadcast; only caching rejects it
    let names: Vec<String> = local.bus.published().into_iter().map(|(n, _)| n).collect();
    assert_eq!(names.iter().filter(|n| n.as_str() == "all").count(), 1);
}

#[tokio::test]
async fn test_repeated_events_accumulate_and_unsubscribe_clears() {
    init_tracing();
    let local = LocalHost::recording();
    let presence = client(&local);
    presence.initialize().await.unwrap();
    presence.initialize().await.unwrap();

    for (user, status) in [("A", "active"), ("B", "active"), ("A", "dnd"), ("C", "inactive")] {
        local
            .bus
            .inject("usersub.userstate", raw_userstate(user, status))
            .await
            .unwrap();
    }

    assert_eq!(presence.presences().len(), 4);
    assert_eq!(presence.get("A").unwrap().unwrap().status, "dnd");

    presence.unsubscribe(vec!["A", "C"]).await.unwrap();

    let subjects: Vec<String> = presence
        .presences()
        .into_iter()
        .map(|r| r.subject)
        .collect();
    assert_eq!(subjects, vec!["B"]);
}

#[tokio::test]
async fn test_shutdown_stops_routing() {
    init_tracing();
    let local = LocalHost::recording();
    let presence = client(&local);
    presence.initialize().await.unwrap();

    assert_eq!(presence.shutdown().await.unwrap(), vec!["usersub.userstate"]);
    assert_eq!(local.bus.handler_count("event:usersub.userstate"), 0);
    assert_eq!(local.bus.handler_count(EVENTS.external.userstate), 0);

    local
        .bus
        .inject("usersub.userstate", raw_userstate("person-a", "active"))
        .await
        .unwrap();
    assert!(presence.presences().is_empty());

    assert!(matches!(
        presence.stream().stop_listening_to("usersub.userstate").await,
        Err(PresenceError::NotActive(_))
    ));
}

#[tokio::test]
async fn test_initialize_fails_when_transport_is_down() {
    init_tracing();
    let local = LocalHost::recording();
    local.transport.set_failure(Some("mercury offline"));
    let presence = client(&local);

    assert!(matches!(
        presence.initialize().await,
        Err(PresenceError::Host(_))
    ));
    assert_eq!(local.bus.handler_count(EVENTS.external.userstate), 0);

    local.transport.set_failure(None);
    presence.initialize().await.unwrap();
    assert_eq!(local.bus.handler_count(EVENTS.external.userstate), 1);
}
