#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use chatline_core::error::ClientCode;
use chatline_core::message::ChatMessage;

fn to(recipient: &str) -> ChatMessage {
    ChatMessage::new("u1", recipient, Some("hi".into()), None)
}

#[test]
fn blank_recipient_is_bad_request() {
    for r in ["", " ", "\t\n"] {
        let err = to(r).check_recipient().expect_err("must reject");
        assert_eq!(err.client_code(), ClientCode::BadRequest, "recipient {r:?}");
    }
}

#[test]
fn named_recipient_passes() {
    to("u2").check_recipient().unwrap();
    to(" u2 ").check_recipient().unwrap();
}

#[test]
fn whitespace_text_is_not_content() {
    let m = ChatMessage::new("u1", "u2", Some("   ".into()), None);
    assert!(!m.has_text());
    assert!(!m.has_content());
}
