//! Full-stack scenarios: a real client and server joined by an in-memory
//! transport pair.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures::FutureExt;
use loommcp_client::{Client, ElicitationHandler, SamplingHandler, UrlElicitationHandler};
use loommcp_core::RequestOptions;
use loommcp_protocol::types::{
    CallToolResult, ContentBlock, CreateMessageParams, CreateMessageResult, ElicitParams,
    ElicitResult, ElicitationAction, ElicitationCompleteParams, FormElicitParams, Root, Role,
    SamplingMessage, StopReason, Tool, ToolUseContent, UrlElicitParams,
};
use loommcp_protocol::types::ProgressToken;
use loommcp_protocol::{Error, PROTOCOL_VERSION};
use loommcp_server::{Server, ToolHandlerFn};
use loommcp_transport::MemoryTransport;
use parking_lot::Mutex;
use serde_json::{Value, json};

fn echo_tool() -> Tool {
    Tool {
        name: "echo".into(),
        description: Some("Echo a message back".into()),
        input_schema: json!({
            "type": "object",
            "properties": { "message": { "type": "string" } },
            "required": ["message"]
        }),
        output_schema: None,
        annotations: None,
        meta: None,
    }
}

fn echo_handler() -> ToolHandlerFn {
    Arc::new(|_name, args, _ctx| {
        async move {
            let message = args["message"].as_str().unwrap_or_default().to_string();
            Ok(CallToolResult::text(message))
        }
        .boxed()
    })
}

async fn connected_stack() -> (Client, Server) {
    let (client_end, server_end) = MemoryTransport::pair();
    let server = Server::builder("test-server", "1.0").build(Box::new(server_end));
    let client = Client::builder("test-client", "1.0")
        .with_roots(true)
        .build(Box::new(client_end));
    server.connect().await.unwrap();
    client.connect().await.unwrap();
    (client, server)
}

#[tokio::test]
async fn handshake_negotiates_version_and_capabilities() {
    let (client, _server) = connected_stack().await;

    let result = client.initialize().await.unwrap();
    assert_eq!(result.protocol_version, PROTOCOL_VERSION);
    assert!(!result.server_info.name.is_empty());
    assert!(result.capabilities.tools.is_some());
    assert!(result.capabilities.resources.is_some());
    assert!(result.capabilities.prompts.is_some());
    assert!(client.is_initialized());

    // Peer info is recorded exactly once.
    let peer = client.session().peer_info().unwrap();
    assert_eq!(peer.implementation.name, "test-server");
}

#[tokio::test]
async fn tool_call_round_trip() {
    let (client, server) = connected_stack().await;
    server.register_tool(echo_tool(), echo_handler()).unwrap();
    client.initialize().await.unwrap();

    let result = client
        .call_tool("echo", Some(json!({"message": "hi"})))
        .await
        .unwrap();
    assert!(!result.is_error);
    assert_eq!(result.content, vec![ContentBlock::text("hi")]);
}

#[tokio::test]
async fn unknown_tool_is_mcp_level_error_not_jsonrpc() {
    let (client, server) = connected_stack().await;
    server.register_tool(echo_tool(), echo_handler()).unwrap();
    client.initialize().await.unwrap();

    let result = client.call_tool("frobnicate", Some(json!({}))).await.unwrap();
    assert!(result.is_error);
}

#[tokio::test]
async fn tool_list_pagination_walks_every_page() {
    let (client, server) = connected_stack().await;
    for n in 0..130 {
        let mut tool = echo_tool();
        tool.name = format!("tool-{n:03}");
        server.register_tool(tool, echo_handler()).unwrap();
    }
    client.initialize().await.unwrap();

    let first_page = client.list_tools(None).await.unwrap();
    assert_eq!(first_page.tools.len(), 50);
    assert!(first_page.next_cursor.is_some());

    let all = client.list_all_tools().await.unwrap();
    assert_eq!(all.len(), 130);
    let names: Vec<&str> = all.iter().map(|t| t.name.as_str()).collect();
    let mut sorted = names.clone();
    sorted.sort_unstable();
    assert_eq!(names, sorted, "pages concatenate in registry order");
}

#[tokio::test]
async fn cancellation_reaches_tool_handler_and_client_gets_error() {
    let (client, server) = connected_stack().await;

    let progress_seen = Arc::new(Mutex::new(Vec::new()));
    let handler_cancelled = Arc::new(std::sync::atomic::AtomicBool::new(false));

    let cancelled_flag = handler_cancelled.clone();
    server
        .register_tool(
            Tool {
                name: "long-haul".into(),
                description: None,
                input_schema: json!({"type": "object"}),
                output_schema: None,
                annotations: None,
                meta: None,
            },
            Arc::new(move |_name, _args, ctx| {
                let cancelled_flag = cancelled_flag.clone();
                async move {
                    ctx.report_progress(25.0, None).await.ok();
                    ctx.report_progress(50.0, None).await.ok();
                    for _ in 0..200 {
                        if ctx.is_cancelled() {
                            cancelled_flag.store(true, Ordering::SeqCst);
                            return Err(Error::Cancelled);
                        }
                        tokio::time::sleep(Duration::from_millis(5)).await;
                    }
                    Ok(CallToolResult::text("finished"))
                }
                .boxed()
            }),
        )
        .unwrap();
    client.initialize().await.unwrap();

    let seen = progress_seen.clone();
    let errors = Arc::new(AtomicUsize::new(0));
    let errors_clone = errors.clone();
    let id = client
        .session()
        .send_request_with_callbacks(
            "tools/call",
            Some(json!({"name": "long-haul", "arguments": {}})),
            Box::new(|_| panic!("tool result must not arrive after cancel")),
            Box::new(move |err| {
                assert!(matches!(err, Error::Cancelled));
                errors_clone.fetch_add(1, Ordering::SeqCst);
            }),
            RequestOptions {
                progress_token: Some(ProgressToken::from("p1")),
                on_progress: Some(Arc::new(move |value, _| seen.lock().push(value))),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    // Let both progress updates land, then cancel.
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(*progress_seen.lock(), vec![25.0, 50.0]);

    client.cancel_request(&id, Some("user aborted".into())).await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert!(handler_cancelled.load(Ordering::SeqCst));
    assert_eq!(errors.load(Ordering::SeqCst), 1);
    assert_eq!(client.session().pending_requests(), 0);
}

/// Scripted sampling handler: one tool use, then a settled answer built
/// from the tool result it saw.
struct ToolUsingSampler {
    invocations: AtomicUsize,
}

#[async_trait]
impl SamplingHandler for ToolUsingSampler {
    async fn create_message(&self, params: CreateMessageParams) -> loommcp_protocol::Result<CreateMessageResult> {
        let round = self.invocations.fetch_add(1, Ordering::SeqCst);
        if round == 0 {
            return Ok(CreateMessageResult {
                role: Role::Assistant,
                content: vec![ContentBlock::ToolUse(ToolUseContent {
                    id: "use-1".into(),
                    name: "echo".into(),
                    input: json!({"message": "from the loop"}),
                })],
                model: "scripted".into(),
                stop_reason: Some(StopReason::ToolUse),
            });
        }

        // The threaded conversation must now carry the tool result.
        let tool_result_text = params
            .messages
            .iter()
            .find_map(|m| match &m.content {
                ContentBlock::ToolResult(r) => match r.content.first() {
                    Some(ContentBlock::Text(t)) => Some(t.text.clone()),
                    _ => None,
                },
                _ => None,
            })
            .unwrap_or_default();

        Ok(CreateMessageResult {
            role: Role::Assistant,
            content: vec![ContentBlock::text(format!("tool said: {tool_result_text}"))],
            model: "scripted".into(),
            stop_reason: Some(StopReason::EndTurn),
        })
    }
}

#[tokio::test]
async fn sampling_tool_loop_round_trips_through_server_tools() {
    let (client_end, server_end) = MemoryTransport::pair();
    let server = Server::builder("test-server", "1.0").build(Box::new(server_end));
    server.register_tool(echo_tool(), echo_handler()).unwrap();

    let client = Client::builder("test-client", "1.0")
        .with_sampling_handler(Arc::new(ToolUsingSampler {
            invocations: AtomicUsize::new(0),
        }))
        .build(Box::new(client_end));

    server.connect().await.unwrap();
    client.connect().await.unwrap();
    client.initialize().await.unwrap();

    let result = server
        .create_message(CreateMessageParams {
            messages: vec![SamplingMessage::user(ContentBlock::text("use the echo tool"))],
            model_preferences: None,
            system_prompt: None,
            max_tokens: 256,
            temperature: None,
            stop_sequences: None,
            tools: Some(vec![echo_tool()]),
            metadata: None,
        })
        .await
        .unwrap();

    assert_eq!(result.stop_reason, Some(StopReason::EndTurn));
    match &result.content[0] {
        ContentBlock::Text(text) => assert_eq!(text.text, "tool said: from the loop"),
        other => panic!("expected text, got {other:?}"),
    }
}

#[tokio::test]
async fn sampling_without_handler_is_method_not_found() {
    let (client, server) = connected_stack().await;
    client.initialize().await.unwrap();

    let err = server
        .create_message(CreateMessageParams {
            messages: vec![SamplingMessage::user(ContentBlock::text("hi"))],
            model_preferences: None,
            system_prompt: None,
            max_tokens: 16,
            temperature: None,
            stop_sequences: None,
            tools: None,
            metadata: None,
        })
        .await
        .unwrap_err();
    match err {
        Error::Peer { code, .. } => assert_eq!(code, -32601),
        other => panic!("expected method-not-found from peer, got {other:?}"),
    }
}

struct AcceptingForm;

#[async_trait]
impl ElicitationHandler for AcceptingForm {
    async fn elicit(&self, _params: FormElicitParams) -> loommcp_protocol::Result<ElicitResult> {
        let mut content = HashMap::new();
        content.insert("name".to_string(), Value::String("Ada".into()));
        Ok(ElicitResult::accept(content))
    }
}

#[tokio::test]
async fn form_elicitation_returns_synchronously() {
    let (client_end, server_end) = MemoryTransport::pair();
    let server = Server::builder("test-server", "1.0").build(Box::new(server_end));
    let client = Client::builder("test-client", "1.0")
        .with_elicitation_handler(Arc::new(AcceptingForm))
        .build(Box::new(client_end));
    server.connect().await.unwrap();
    client.connect().await.unwrap();
    client.initialize().await.unwrap();

    let result = server
        .elicit(ElicitParams::Form(FormElicitParams {
            message: "Who are you?".into(),
            requested_schema: serde_json::from_value(json!({
                "type": "object",
                "properties": { "name": { "type": "string" } }
            }))
            .unwrap(),
        }))
        .await
        .unwrap();

    assert_eq!(result.action, ElicitationAction::Accept);
    assert_eq!(result.content.unwrap()["name"], json!("Ada"));
}

struct UrlOpener {
    opened: Arc<Mutex<Vec<String>>>,
    completed: Arc<Mutex<Vec<(String, ElicitationAction)>>>,
}

#[async_trait]
impl UrlElicitationHandler for UrlOpener {
    async fn open_url(&self, params: UrlElicitParams) -> loommcp_protocol::Result<()> {
        self.opened.lock().push(params.url);
        Ok(())
    }

    async fn on_complete(&self, elicitation_id: &str, result: ElicitResult) {
        self.completed
            .lock()
            .push((elicitation_id.to_string(), result.action));
    }
}

#[tokio::test]
async fn url_elicitation_answers_pending_then_resolves() {
    let opened = Arc::new(Mutex::new(Vec::new()));
    let completed = Arc::new(Mutex::new(Vec::new()));

    let (client_end, server_end) = MemoryTransport::pair();
    let server = Server::builder("test-server", "1.0").build(Box::new(server_end));
    let client = Client::builder("test-client", "1.0")
        .with_url_elicitation_handler(Arc::new(UrlOpener {
            opened: opened.clone(),
            completed: completed.clone(),
        }))
        .build(Box::new(client_end));
    server.connect().await.unwrap();
    client.connect().await.unwrap();
    client.initialize().await.unwrap();

    let result = server
        .elicit(ElicitParams::Url(UrlElicitParams {
            message: "Sign in".into(),
            elicitation_id: "e-7".into(),
            url: "https://example.com/auth".into(),
        }))
        .await
        .unwrap();
    assert_eq!(result.action, ElicitationAction::Pending);
    assert_eq!(opened.lock().as_slice(), ["https://example.com/auth"]);
    assert_eq!(client.pending_elicitations(), 1);

    server
        .complete_elicitation(ElicitationCompleteParams {
            elicitation_id: "e-7".into(),
            result: ElicitResult::decline(),
        })
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(
        completed.lock().as_slice(),
        [("e-7".to_string(), ElicitationAction::Decline)]
    );
    assert_eq!(client.pending_elicitations(), 0);

    // A second completion for the same ID is dropped.
    server
        .complete_elicitation(ElicitationCompleteParams {
            elicitation_id: "e-7".into(),
            result: ElicitResult::cancel(),
        })
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(completed.lock().len(), 1);
}

#[tokio::test]
async fn server_reads_client_roots() {
    let (client, server) = connected_stack().await;
    client.initialize().await.unwrap();
    client
        .add_root(Root {
            uri: "file:///workspace".into(),
            name: Some("workspace".into()),
        })
        .unwrap();

    let roots = server.list_roots().await.unwrap();
    assert_eq!(roots.roots.len(), 1);
    assert_eq!(roots.roots[0].uri, "file:///workspace");
}

#[tokio::test]
async fn ping_works_in_both_directions() {
    let (client, server) = connected_stack().await;
    client.initialize().await.unwrap();

    client.ping().await.unwrap();
    let raw = server.session().request("ping", None, None).await.unwrap();
    assert_eq!(raw, json!({}));
}

#[tokio::test]
async fn version_mismatch_is_rejected() {
    let (client, _server) = connected_stack().await;

    // Bypass Client::initialize to offer a stale version.
    let err = client
        .session()
        .request(
            "initialize",
            Some(json!({
                "protocolVersion": "2024-11-05",
                "capabilities": {},
                "clientInfo": {"name": "t", "version": "1"}
            })),
            None,
        )
        .await
        .unwrap_err();
    match err {
        Error::Peer { code, .. } => assert_eq!(code, -32602),
        other => panic!("expected invalid-params from peer, got {other:?}"),
    }
}
