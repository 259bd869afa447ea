//! Event envelope and payload parsing tests.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use chatline_core::error::ClientCode;
use chatline_core::message::RouteOutcome;
use chatline_core::protocol::envelope::Envelope;
use chatline_core::protocol::events::{self, PrivateMessage};

#[test]
fn parse_envelope_min() {
    let env = Envelope::parse(r#"{"v":1,"type":"ping"}"#).unwrap();
    assert_eq!(env.event, "ping");
    assert!(env.seq.is_none());
    assert!(env.data.is_none());
}

#[test]
fn parse_private_message() {
    let s = r#"{"v":1,"type":"private_message","seq":7,
        "data":{"to":"u2","text":"hi","attachment":{"url":"https://cdn/x.png","mime":"image/png","size":10}}}"#;
    let env = Envelope::parse(s).unwrap();
    assert_eq!(env.seq, Some(7));

    let pm: PrivateMessage = env.data_as().unwrap();
    let msg = pm.into_message("u1");
    assert_eq!(msg.from, "u1");
    assert_eq!(msg.to, "u2");
    assert_eq!(msg.text.as_deref(), Some("hi"));
    assert_eq!(msg.attachment.unwrap().kind(), "image");
}

#[test]
fn rejects_wrong_version() {
    let err = Envelope::parse(r#"{"v":2,"type":"ping"}"#).unwrap_err();
    assert_eq!(err.client_code(), ClientCode::UnsupportedVersion);
}

#[test]
fn rejects_unknown_fields() {
    let err = Envelope::parse(r#"{"v":1,"type":"ping","room":"x"}"#).unwrap_err();
    assert_eq!(err.client_code(), ClientCode::BadRequest);
}

#[test]
fn missing_data_is_bad_request() {
    let env = Envelope::parse(r#"{"v":1,"type":"private_message"}"#).unwrap();
    let err = env.data_as::<PrivateMessage>().unwrap_err();
    assert_eq!(err.client_code().as_str(), "BAD_REQUEST");
}

#[test]
fn outbound_frames_carry_event_names() {
    let online: serde_json::Value =
        serde_json::from_str(&events::online_users_json(&["u1".to_string(), "u2".to_string()])).unwrap();
    assert_eq!(online["type"], "getOnlineUsers");
    assert_eq!(online["data"], serde_json::json!(["u1", "u2"]));

    let status: serde_json::Value =
        serde_json::from_str(&events::message_status_json(Some(3), "u2", RouteOutcome::Queued)).unwrap();
    assert_eq!(status["seq"], 3);
    assert_eq!(status["data"]["outcome"], "queued");

    let msg = chatline_core::message::ChatMessage::new("u1", "u2", Some("hi".into()), None);
    let delivered: serde_json::Value = serde_json::from_str(&events::new_message_json(&msg)).unwrap();
    assert_eq!(delivered["type"], "new_message");
    assert_eq!(delivered["data"]["from"], "u1");
    assert_eq!(delivered["data"]["text"], "hi");
    assert!(delivered["data"].get("attachment").is_none());
}
