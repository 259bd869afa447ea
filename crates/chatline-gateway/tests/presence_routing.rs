//! Registry, presence, binding, and routing behavior.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::extract::ws::Message;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::time::{sleep, Duration};

use chatline_core::attachment::Attachment;
use chatline_core::error::{ChatError, ClientCode};
use chatline_core::message::{ChatMessage, RouteOutcome};
use chatline_gateway::obs::GatewayMetrics;
use chatline_gateway::realtime::{
    Connection, Credentials, MessageSink, RealtimeCore, RealtimeSettings, TracingSink,
    UnbindGuard, UnbindOutcome,
};

fn core() -> RealtimeCore {
    core_with(RealtimeSettings::default(), Arc::new(TracingSink))
}

fn core_with(settings: RealtimeSettings, sink: Arc<dyn MessageSink>) -> RealtimeCore {
    RealtimeCore::new(settings, sink, Arc::new(GatewayMetrics::default()))
}

fn open(rt: &RealtimeCore, cap: usize) -> (Connection, mpsc::Receiver<Message>) {
    let (tx, rx) = mpsc::channel(cap);
    (Connection::new(rt.registry.next_conn_id(), tx), rx)
}

fn user(id: &str) -> Credentials {
    Credentials::new(None, Some(id.to_string()))
}

fn text(from: &str, to: &str, body: &str) -> ChatMessage {
    ChatMessage::new(from, to, Some(body.to_string()), None)
}

/// Every text frame currently queued, parsed.
fn drain(rx: &mut mpsc::Receiver<Message>) -> Vec<Value> {
    let mut out = Vec::new();
    while let Ok(msg) = rx.try_recv() {
        if let Message::Text(s) = msg {
            out.push(serde_json::from_str(&s).unwrap());
        }
    }
    out
}

fn of_type<'a>(frames: &'a [Value], ty: &str) -> Vec<&'a Value> {
    frames.iter().filter(|f| f["type"] == ty).collect()
}

fn online_lists(frames: &[Value]) -> Vec<Vec<String>> {
    of_type(frames, "getOnlineUsers")
        .into_iter()
        .map(|f| serde_json::from_value(f["data"].clone()).unwrap())
        .collect()
}

#[derive(Default)]
struct RecordingSink {
    seen: Mutex<Vec<(ChatMessage, RouteOutcome)>>,
}

#[async_trait]
impl MessageSink for RecordingSink {
    async fn record(&self, msg: &ChatMessage, outcome: RouteOutcome) -> chatline_core::Result<()> {
        self.seen.lock().unwrap().push((msg.clone(), outcome));
        Ok(())
    }
}

struct FailingSink;

#[async_trait]
impl MessageSink for FailingSink {
    async fn record(&self, _msg: &ChatMessage, _outcome: RouteOutcome) -> chatline_core::Result<()> {
        Err(ChatError::Internal("store down".into()))
    }
}

#[tokio::test]
async fn connect_route_disconnect_scenario() {
    let rt = core();

    let (h1, mut rx1) = open(&rt, 64);
    let s1 = rt.binder.bind(h1.clone(), &user("u1")).await;
    assert_eq!(rt.registry.snapshot_keys(), vec!["u1"]);
    assert_eq!(rt.registry.get("u1"), Some(h1));

    let (h2, mut rx2) = open(&rt, 64);
    let s2 = rt.binder.bind(h2.clone(), &user("u2")).await;
    assert_eq!(rt.registry.snapshot_keys(), vec!["u1", "u2"]);

    let lists = online_lists(&drain(&mut rx1));
    assert_eq!(lists, vec![vec!["u1"], vec!["u1", "u2"]]);
    assert_eq!(online_lists(&drain(&mut rx2)), vec![vec!["u1", "u2"]]);

    let outcome = rt.router.route(text("u1", "u2", "hi")).await.unwrap();
    assert_eq!(outcome, RouteOutcome::Delivered);
    let frames = drain(&mut rx2);
    let delivered = of_type(&frames, "new_message");
    assert_eq!(delivered.len(), 1);
    assert_eq!(delivered[0]["data"]["from"], "u1");
    assert_eq!(delivered[0]["data"]["text"], "hi");
    assert!(drain(&mut rx1).is_empty());

    assert_eq!(rt.binder.unbind(&s2).await, UnbindOutcome::Removed);
    assert_eq!(rt.registry.snapshot_keys(), vec!["u1"]);
    assert_eq!(online_lists(&drain(&mut rx1)), vec![vec!["u1"]]);

    let outcome = rt.router.route(text("u1", "u2", "bye")).await.unwrap();
    assert_eq!(outcome, RouteOutcome::Queued);
    assert!(of_type(&drain(&mut rx1), "new_message").is_empty());
    assert!(of_type(&drain(&mut rx2), "new_message").is_empty());

    assert_eq!(rt.binder.unbind(&s1).await, UnbindOutcome::Removed);
    assert!(rt.registry.snapshot_keys().is_empty());
    assert_eq!(rt.registry.peer_count(), 0);
}

#[tokio::test]
async fn stale_disconnect_keeps_newer_connection() {
    let rt = core();

    let (h1, _rx1) = open(&rt, 64);
    let (h2, mut rx2) = open(&rt, 64);
    let s1 = rt.binder.bind(h1, &user("u1")).await;
    let s2 = rt.binder.bind(h2.clone(), &user("u1")).await;

    // H1's disconnect arrives after the reconnect.
    assert_eq!(rt.binder.unbind(&s1).await, UnbindOutcome::Stale);
    assert_eq!(rt.registry.get("u1"), Some(h2));
    assert_eq!(rt.registry.snapshot_keys(), vec!["u1"]);

    // Peers were still told, and the list still has u1.
    let lists = online_lists(&drain(&mut rx2));
    assert_eq!(lists.last().unwrap(), &vec!["u1".to_string()]);

    let outcome = rt.router.route(text("u9", "u1", "still here?")).await.unwrap();
    assert_eq!(outcome, RouteOutcome::Delivered);
    assert_eq!(of_type(&drain(&mut rx2), "new_message").len(), 1);

    assert_eq!(rt.binder.unbind(&s2).await, UnbindOutcome::Removed);
    assert!(rt.registry.get("u1").is_none());
}

#[tokio::test]
async fn remove_if_matches_is_compare_and_delete() {
    let rt = core();
    let (a1, _r1) = open(&rt, 1);
    let (a2, _r2) = open(&rt, 1);

    assert!(rt.registry.put("a".into(), a1.clone()).is_none());
    assert_eq!(rt.registry.put("a".into(), a2.clone()), Some(a1.clone()));
    assert!(!rt.registry.remove_if_matches("a", &a1));
    assert_eq!(rt.registry.get("a"), Some(a2.clone()));
    assert!(rt.registry.remove_if_matches("a", &a2));
    assert!(!rt.registry.remove_if_matches("a", &a2));
}

#[tokio::test]
async fn broadcast_matches_registry_after_each_mutation() {
    let rt = core();
    let (watch, mut watch_rx) = open(&rt, 64);
    let w = rt.binder.bind(watch, &user("watcher")).await;

    let mut sessions = Vec::new();
    for id in ["c", "a", "b"] {
        let (h, _rx) = open(&rt, 64);
        sessions.push(rt.binder.bind(h, &user(id)).await);
        let lists = online_lists(&drain(&mut watch_rx));
        assert_eq!(lists.last().unwrap(), &rt.registry.snapshot_keys());
    }

    rt.binder.unbind(&sessions[0]).await;
    let lists = online_lists(&drain(&mut watch_rx));
    assert_eq!(lists.last().unwrap(), &vec!["a", "b", "watcher"]);

    rt.binder.unbind(&w).await;
    assert!(drain(&mut watch_rx).is_empty());
}

#[tokio::test]
async fn anonymous_connection_sees_presence_but_is_not_routable() {
    let rt = core();
    let (anon, mut anon_rx) = open(&rt, 64);
    let session = rt.binder.bind(anon, &Credentials::default()).await;

    assert!(session.user().is_none());
    assert!(matches!(session.identity(), Err(ChatError::Unauthenticated)));
    assert_eq!(rt.registry.online_count(), 0);
    assert_eq!(rt.registry.peer_count(), 1);
    assert_eq!(online_lists(&drain(&mut anon_rx)), vec![Vec::<String>::new()]);

    let (h, _rx) = open(&rt, 64);
    let named = rt.binder.bind(h, &user("u1")).await;
    assert_eq!(online_lists(&drain(&mut anon_rx)), vec![vec!["u1"]]);

    assert_eq!(rt.binder.unbind(&session).await, UnbindOutcome::Anonymous);
    assert_eq!(rt.registry.snapshot_keys(), vec!["u1"]);
    rt.binder.unbind(&named).await;
}

#[test]
fn credentials_prefer_auth_field_and_ignore_blanks() {
    let both = Credentials::new(Some("from-auth".into()), Some("from-query".into()));
    assert_eq!(both.identity().unwrap(), "from-auth");

    let blank_auth = Credentials::new(Some("  ".into()), Some("q".into()));
    assert_eq!(blank_auth.identity().unwrap(), "q");

    let none = Credentials::new(Some(String::new()), None);
    assert!(matches!(none.identity(), Err(ChatError::Unauthenticated)));
}

#[tokio::test]
async fn empty_payload_is_rejected_without_delivery() {
    let sink = Arc::new(RecordingSink::default());
    let rt = core_with(RealtimeSettings::default(), sink.clone());
    let (h, mut rx) = open(&rt, 64);
    let s = rt.binder.bind(h, &user("u2")).await;
    drain(&mut rx);

    for body in [None, Some(String::new()), Some("   ".to_string())] {
        let err = rt
            .router
            .route(ChatMessage::new("u1", "u2", body, None))
            .await
            .unwrap_err();
        assert_eq!(err.client_code(), ClientCode::InvalidPayload);
    }
    assert!(drain(&mut rx).is_empty());
    assert!(sink.seen.lock().unwrap().is_empty());

    rt.binder.unbind(&s).await;
}

#[tokio::test]
async fn attachment_only_message_is_delivered() {
    let rt = core();
    let (h, mut rx) = open(&rt, 64);
    let s = rt.binder.bind(h, &user("u2")).await;
    drain(&mut rx);

    let att = Attachment {
        url: "https://files.example/cat.png".into(),
        mime: "image/png".into(),
        size: 2048,
        name: Some("cat.png".into()),
    };
    let outcome = rt
        .router
        .route(ChatMessage::new("u1", "u2", None, Some(att)))
        .await
        .unwrap();
    assert_eq!(outcome, RouteOutcome::Delivered);

    let frames = drain(&mut rx);
    let msg = of_type(&frames, "new_message")[0];
    assert_eq!(msg["data"]["attachment"]["url"], "https://files.example/cat.png");
    assert!(msg["data"].get("text").is_none());

    rt.binder.unbind(&s).await;
}

#[tokio::test]
async fn sink_sees_delivered_and_queued() {
    let sink = Arc::new(RecordingSink::default());
    let rt = core_with(RealtimeSettings::default(), sink.clone());
    let (h, _rx) = open(&rt, 64);
    let s = rt.binder.bind(h, &user("u2")).await;

    rt.router.route(text("u1", "u2", "one")).await.unwrap();
    rt.router.route(text("u1", "u3", "two")).await.unwrap();

    let seen = sink.seen.lock().unwrap().clone();
    assert_eq!(seen.len(), 2);
    assert_eq!(seen[0].1, RouteOutcome::Delivered);
    assert_eq!(seen[1].0.to, "u3");
    assert_eq!(seen[1].1, RouteOutcome::Queued);

    rt.binder.unbind(&s).await;
}

#[tokio::test]
async fn failing_sink_does_not_change_outcome() {
    let rt = core_with(RealtimeSettings::default(), Arc::new(FailingSink));
    let (h, _rx) = open(&rt, 64);
    let s = rt.binder.bind(h, &user("u2")).await;

    assert_eq!(rt.router.route(text("u1", "u2", "x")).await.unwrap(), RouteOutcome::Delivered);
    assert_eq!(rt.router.route(text("u1", "nobody", "x")).await.unwrap(), RouteOutcome::Queued);

    rt.binder.unbind(&s).await;
}

#[tokio::test]
async fn dead_recipient_handle_queues() {
    let rt = core();
    let (h, rx) = open(&rt, 64);
    let s = rt.binder.bind(h, &user("u2")).await;
    drop(rx);

    let outcome = rt.router.route(text("u1", "u2", "anyone?")).await.unwrap();
    assert_eq!(outcome, RouteOutcome::Queued);

    assert_eq!(rt.binder.unbind(&s).await, UnbindOutcome::Removed);
}

#[tokio::test]
async fn slow_or_closed_peers_do_not_block_announce() {
    let settings = RealtimeSettings {
        presence_send_timeout: Duration::from_millis(50),
        deliver_timeout: Duration::from_millis(50),
    };
    let rt = core_with(settings, Arc::new(TracingSink));

    let (healthy, mut healthy_rx) = open(&rt, 64);
    let (closed, closed_rx) = open(&rt, 64);
    let (full, _full_rx) = open(&rt, 1);
    drop(closed_rx);
    full.send_text("filler".into(), Duration::from_millis(10)).await.unwrap();

    rt.registry.attach(healthy);
    rt.registry.attach(closed);
    rt.registry.attach(full.clone());
    rt.registry.put("slow".into(), full);

    let report = rt.broadcaster.announce().await;
    assert_eq!(report.online, 1);
    assert_eq!(report.sent, 1);
    assert_eq!(report.failed, 2);
    assert_eq!(online_lists(&drain(&mut healthy_rx)), vec![vec!["slow"]]);

    // A stalled recipient degrades to queued.
    let outcome = rt.router.route(text("u1", "slow", "hello")).await.unwrap();
    assert_eq!(outcome, RouteOutcome::Queued);
}

#[tokio::test]
async fn release_runs_unbind() {
    let rt = core();
    let (h, _rx) = open(&rt, 64);
    let s = rt.binder.bind(h, &user("u1")).await;

    let guard = UnbindGuard::arm(rt.binder.clone(), s);
    assert_eq!(guard.release().await, Some(UnbindOutcome::Removed));
    assert!(rt.registry.snapshot_keys().is_empty());
}

#[tokio::test]
async fn dropped_guard_still_unbinds() {
    let rt = core();
    let (h, _rx) = open(&rt, 64);
    let s = rt.binder.bind(h, &user("u1")).await;

    let guard = UnbindGuard::arm(rt.binder.clone(), s);
    drop(guard);

    for _ in 0..100 {
        if rt.registry.online_count() == 0 {
            break;
        }
        sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(rt.registry.online_count(), 0);
    assert_eq!(rt.registry.peer_count(), 0);
}

#[tokio::test]
async fn cancelled_bind_still_unbinds() {
    let settings = RealtimeSettings {
        presence_send_timeout: Duration::from_secs(5),
        ..RealtimeSettings::default()
    };
    let rt = core_with(settings, Arc::new(TracingSink));

    // A peer whose queue is already full stalls the announce.
    let (slow, _slow_rx) = open(&rt, 1);
    rt.binder.bind(slow, &Credentials::default()).await;

    let (h, _rx) = open(&rt, 64);
    let creds = user("u1");
    let bound = tokio::time::timeout(Duration::from_millis(50), rt.binder.bind_guarded(h, &creds)).await;
    assert!(bound.is_err(), "announce should still be blocked");

    for _ in 0..100 {
        if rt.registry.online_count() == 0 {
            break;
        }
        sleep(Duration::from_millis(10)).await;
    }
    assert!(rt.registry.get("u1").is_none());
    assert_eq!(rt.registry.peer_count(), 1);
}

#[test]
fn dropped_guard_without_runtime_updates_metrics() {
    let metrics = Arc::new(GatewayMetrics::default());
    let rt = RealtimeCore::new(RealtimeSettings::default(), Arc::new(TracingSink), Arc::clone(&metrics));
    let (tx, _rx) = mpsc::channel(8);
    let h = Connection::new(rt.registry.next_conn_id(), tx);

    let s = rt.binder.register(h, &user("u1"));
    assert_eq!(metrics.connections_open.get(&[]), 1);

    drop(UnbindGuard::arm(rt.binder.clone(), s));

    assert_eq!(rt.registry.online_count(), 0);
    assert_eq!(rt.registry.peer_count(), 0);
    assert_eq!(metrics.connections_open.get(&[]), 0);
    assert_eq!(metrics.unbinds.get(&[("outcome", "removed")]), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_churn_leaves_registry_consistent() {
    let settings = RealtimeSettings {
        presence_send_timeout: Duration::from_millis(10),
        deliver_timeout: Duration::from_millis(10),
    };
    let rt = Arc::new(core_with(settings, Arc::new(TracingSink)));

    let mut tasks = Vec::new();
    for i in 0..16 {
        let rt = Arc::clone(&rt);
        tasks.push(tokio::spawn(async move {
            let id = format!("user-{}", i % 4);
            let (tx, _rx) = mpsc::channel(256);
            let conn = Connection::new(rt.registry.next_conn_id(), tx);
            let s = rt.binder.bind(conn, &user(&id)).await;
            tokio::task::yield_now().await;
            rt.binder.unbind(&s).await
        }));
    }

    let mut removed = 0;
    for t in tasks {
        if t.await.unwrap() == UnbindOutcome::Removed {
            removed += 1;
        }
    }

    assert!(removed >= 4);
    assert!(rt.registry.snapshot_keys().is_empty());
    assert_eq!(rt.registry.peer_count(), 0);
}
