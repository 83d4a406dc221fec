//! Wire-level round-trip and validation properties for the codec.

use loommcp_protocol::codec::{
    Framing, ParseErrorCode, decode_message, encode_message, encode_notification, encode_request,
    encode_response_ok,
};
use loommcp_protocol::jsonrpc::{
    JsonRpcMessage, JsonRpcNotification, JsonRpcRequest, RequestId,
};
use proptest::prelude::*;
use serde_json::json;

fn arb_request_id() -> impl Strategy<Value = RequestId> {
    prop_oneof![
        (0i64..1_000_000).prop_map(RequestId::Number),
        "[a-zA-Z0-9_-]{1,24}".prop_map(RequestId::String),
    ]
}

fn arb_method() -> impl Strategy<Value = String> {
    "[a-z]{1,12}(/[a-zA-Z]{1,12}){0,2}"
}

proptest! {
    #[test]
    fn request_round_trips(id in arb_request_id(), method in arb_method(), n in 0i64..100) {
        let request = JsonRpcRequest::new(id.clone(), method.clone(), Some(json!({"n": n})));
        let bytes = encode_request(&request, Framing::None);
        let decoded = decode_message(&bytes).unwrap();
        match decoded {
            JsonRpcMessage::Request(r) => {
                prop_assert_eq!(r.id, id);
                prop_assert_eq!(r.method, method);
                prop_assert_eq!(r.params, Some(json!({"n": n})));
            }
            other => prop_assert!(false, "expected request, got {:?}", other),
        }
    }

    #[test]
    fn response_round_trips(id in arb_request_id(), n in 0i64..100) {
        let bytes = encode_response_ok(id.clone(), json!({"v": n}), Framing::None);
        let decoded = decode_message(&bytes).unwrap();
        match decoded {
            JsonRpcMessage::Response(r) => {
                prop_assert_eq!(r.id.as_request_id(), Some(&id));
                prop_assert_eq!(r.result(), Some(&json!({"v": n})));
            }
            other => prop_assert!(false, "expected response, got {:?}", other),
        }
    }

    #[test]
    fn notification_round_trips(method in arb_method()) {
        let note = JsonRpcNotification::new(method.clone(), None);
        let bytes = encode_notification(&note, Framing::None);
        let decoded = decode_message(&bytes).unwrap();
        match decoded {
            JsonRpcMessage::Notification(n) => prop_assert_eq!(n.method, method),
            other => prop_assert!(false, "expected notification, got {:?}", other),
        }
    }

    #[test]
    fn newline_framed_messages_end_with_single_newline(
        id in arb_request_id(),
        method in arb_method(),
    ) {
        let request = JsonRpcRequest::new(id, method, None);
        let bytes = encode_message(&JsonRpcMessage::Request(request), Framing::Newline);
        prop_assert_eq!(bytes.last(), Some(&b'\n'));
        prop_assert_eq!(bytes.iter().filter(|&&b| b == b'\n').count(), 1);
    }
}

#[test]
fn intermixed_string_and_integer_ids() {
    for raw in [
        r#"{"jsonrpc":"2.0","id":1,"method":"a"}"#,
        r#"{"jsonrpc":"2.0","id":"one","method":"a"}"#,
        r#"{"jsonrpc":"2.0","id":2,"method":"a"}"#,
    ] {
        assert!(matches!(
            decode_message(raw.as_bytes()).unwrap(),
            JsonRpcMessage::Request(_)
        ));
    }
}

#[test]
fn empty_params_object_is_valid() {
    let msg = decode_message(br#"{"jsonrpc":"2.0","id":1,"method":"tools/list","params":{}}"#)
        .unwrap();
    match msg {
        JsonRpcMessage::Request(r) => assert_eq!(r.params, Some(json!({}))),
        other => panic!("expected request, got {other:?}"),
    }
}

#[test]
fn array_params_are_valid() {
    let msg = decode_message(br#"{"jsonrpc":"2.0","id":1,"method":"m","params":[1,2]}"#).unwrap();
    assert!(matches!(msg, JsonRpcMessage::Request(_)));
}

#[test]
fn invalid_params_recovers_string_id() {
    let err = decode_message(br#"{"jsonrpc":"2.0","id":"req-9","method":"m","params":7}"#)
        .unwrap_err();
    assert_eq!(err.code, ParseErrorCode::InvalidParamsType);
    assert_eq!(err.recovered_id, Some(RequestId::String("req-9".into())));
}
