//! List-changed gating, observed at the wire: notifications appear only
//! after the handshake, and only when the capability was advertised.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures::FutureExt;
use loommcp_protocol::types::{CallToolResult, Tool};
use loommcp_server::{Server, ToolHandlerFn};
use loommcp_transport::{MemoryTransport, Transport};
use parking_lot::Mutex;
use serde_json::{Value, json};

fn tool(name: &str) -> Tool {
    Tool {
        name: name.into(),
        description: None,
        input_schema: json!({"type": "object"}),
        output_schema: None,
        annotations: None,
        meta: None,
    }
}

fn noop_handler() -> ToolHandlerFn {
    Arc::new(|_name, _args, _ctx| async move { Ok(CallToolResult::text("ok")) }.boxed())
}

/// Raw client end capturing every frame the server emits
async fn raw_stack(list_changed: bool) -> (MemoryTransport, Server, Arc<Mutex<Vec<Value>>>) {
    let (raw_end, server_end) = MemoryTransport::pair();
    let server = Server::builder("gated", "1.0")
        .with_list_changed(list_changed)
        .build(Box::new(server_end));

    let frames: Arc<Mutex<Vec<Value>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = frames.clone();
    raw_end.set_message_callback(Arc::new(move |frame: Bytes| {
        if let Ok(value) = serde_json::from_slice(&frame) {
            sink.lock().push(value);
        }
    }));

    server.connect().await.unwrap();
    raw_end.connect().await.unwrap();
    (raw_end, server, frames)
}

fn notifications_named(frames: &[Value], method: &str) -> usize {
    frames
        .iter()
        .filter(|frame| frame["method"] == json!(method))
        .count()
}

async fn run_handshake(raw_end: &MemoryTransport) {
    let initialize = json!({
        "jsonrpc": "2.0",
        "id": 1,
        "method": "initialize",
        "params": {
            "protocolVersion": loommcp_protocol::PROTOCOL_VERSION,
            "capabilities": {},
            "clientInfo": {"name": "raw", "version": "0"}
        }
    });
    raw_end
        .send(Bytes::from(initialize.to_string()))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    raw_end
        .send(Bytes::from(
            json!({"jsonrpc": "2.0", "method": "notifications/initialized"}).to_string(),
        ))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
}

#[tokio::test]
async fn nothing_is_emitted_before_the_handshake() {
    let (_raw_end, server, frames) = raw_stack(true).await;

    server.register_tool(tool("early"), noop_handler()).unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(
        notifications_named(&frames.lock(), "notifications/tools/list_changed"),
        0
    );
}

#[tokio::test]
async fn emitted_after_handshake_when_advertised() {
    let (raw_end, server, frames) = raw_stack(true).await;
    run_handshake(&raw_end).await;

    server.register_tool(tool("late"), noop_handler()).unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(
        notifications_named(&frames.lock(), "notifications/tools/list_changed"),
        1
    );

    server.tools().unregister("late");
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(
        notifications_named(&frames.lock(), "notifications/tools/list_changed"),
        2
    );
}

#[tokio::test]
async fn silent_when_capability_not_advertised() {
    let (raw_end, server, frames) = raw_stack(false).await;
    run_handshake(&raw_end).await;

    server.register_tool(tool("quiet"), noop_handler()).unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(
        notifications_named(&frames.lock(), "notifications/tools/list_changed"),
        0
    );
}

#[tokio::test]
async fn prompts_and_resources_notify_too() {
    use loommcp_protocol::types::{
        GetPromptResult, Prompt, ReadResourceResult, Resource, ResourceContents,
        TextResourceContents,
    };

    let (raw_end, server, frames) = raw_stack(true).await;
    run_handshake(&raw_end).await;

    server
        .register_prompt(
            Prompt {
                name: "p".into(),
                description: None,
                arguments: None,
            },
            Arc::new(|_args, _ctx| {
                async move {
                    Ok(GetPromptResult {
                        description: None,
                        messages: vec![],
                    })
                }
                .boxed()
            }),
        )
        .unwrap();
    server
        .register_resource(
            Resource {
                uri: "file:///r".into(),
                name: "r".into(),
                description: None,
                mime_type: None,
                annotations: None,
                meta: None,
            },
            Arc::new(|uri, _ctx| {
                async move {
                    Ok(ReadResourceResult {
                        contents: vec![ResourceContents::Text(TextResourceContents {
                            uri,
                            text: String::new(),
                            mime_type: None,
                        })],
                    })
                }
                .boxed()
            }),
        )
        .unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    let frames = frames.lock();
    assert_eq!(
        notifications_named(&frames, "notifications/prompts/list_changed"),
        1
    );
    assert_eq!(
        notifications_named(&frames, "notifications/resources/list_changed"),
        1
    );
}
