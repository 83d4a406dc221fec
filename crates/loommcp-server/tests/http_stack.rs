//! The streamable HTTP transport driving a real server session: POST
//! ingress, SSE egress, and Last-Event-ID resumption.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use loommcp_server::Server;
use loommcp_transport::{
    SseWriter, StreamableHttpConfig, StreamableHttpConfigBuilder, StreamableHttpTransport,
};

/// Short keep-alive so stream loops end promptly once a writer hangs up
fn short_keepalive_config() -> StreamableHttpConfig {
    StreamableHttpConfigBuilder::new()
        .with_keep_alive(Duration::from_millis(30))
        .build()
}
use parking_lot::Mutex;
use serde_json::{Value, json};

/// Writer that collects a bounded number of chunks, then hangs up
struct CollectingWriter {
    chunks: Arc<Mutex<Vec<String>>>,
    budget: usize,
}

#[async_trait]
impl SseWriter for CollectingWriter {
    async fn write(&mut self, chunk: &str) -> bool {
        if self.budget == 0 {
            return false;
        }
        self.budget -= 1;
        self.chunks.lock().push(chunk.to_string());
        true
    }
}

fn data_payloads(chunks: &[String]) -> Vec<Value> {
    chunks
        .iter()
        .filter(|chunk| chunk.starts_with("id: "))
        .filter_map(|chunk| {
            let data_line = chunk.lines().find(|line| line.starts_with("data: "))?;
            serde_json::from_str(data_line.trim_start_matches("data: ")).ok()
        })
        .collect()
}

fn initialize_body() -> String {
    json!({
        "jsonrpc": "2.0",
        "id": 1,
        "method": "initialize",
        "params": {
            "protocolVersion": loommcp_protocol::PROTOCOL_VERSION,
            "capabilities": {},
            "clientInfo": {"name": "http-client", "version": "1"}
        }
    })
    .to_string()
}

#[tokio::test]
async fn post_initialize_then_stream_response_over_sse() {
    let transport = Arc::new(StreamableHttpTransport::new(short_keepalive_config()));
    let server = Server::builder("http-server", "1.0").build(Box::new(ArcTransport(
        transport.clone(),
    )));
    server.connect().await.unwrap();

    let outcome = transport.handle_post(initialize_body().as_bytes(), None);
    assert_eq!(outcome.status, 202);
    let session_id = outcome.session_id.unwrap();

    // Give the session a moment to dispatch and enqueue the response.
    tokio::time::sleep(Duration::from_millis(100)).await;

    let chunks = Arc::new(Mutex::new(Vec::new()));
    let mut writer = CollectingWriter {
        chunks: chunks.clone(),
        budget: 2, // retry priming + one event
    };
    transport
        .handle_get(&session_id, None, &mut writer)
        .await
        .unwrap();

    let chunks = chunks.lock().clone();
    assert!(chunks[0].starts_with("retry: 3000"));
    let payloads = data_payloads(&chunks);
    assert_eq!(payloads.len(), 1);
    assert_eq!(payloads[0]["id"], json!(1));
    assert_eq!(
        payloads[0]["result"]["protocolVersion"],
        json!(loommcp_protocol::PROTOCOL_VERSION)
    );
    assert_eq!(payloads[0]["result"]["serverInfo"]["name"], json!("http-server"));
}

#[tokio::test]
async fn reconnect_with_last_event_id_replays_the_tail() {
    let transport = Arc::new(StreamableHttpTransport::new(short_keepalive_config()));
    let server = Server::builder("http-server", "1.0").build(Box::new(ArcTransport(
        transport.clone(),
    )));
    server.connect().await.unwrap();

    let session_id = transport
        .handle_post(initialize_body().as_bytes(), None)
        .session_id
        .unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;

    // Three more pings produce events 2, 3, and 4 behind the initialize
    // response at event 1.
    for n in 2..=4 {
        let body = json!({"jsonrpc": "2.0", "id": n, "method": "ping"}).to_string();
        assert_eq!(
            transport.handle_post(body.as_bytes(), Some(&session_id)).status,
            202
        );
    }
    tokio::time::sleep(Duration::from_millis(100)).await;

    // The client saw events up to 2 before disconnecting; expect 3 and 4,
    // in order.
    let chunks = Arc::new(Mutex::new(Vec::new()));
    let mut writer = CollectingWriter {
        chunks: chunks.clone(),
        budget: 3,
    };
    transport
        .handle_get(&session_id, Some(2), &mut writer)
        .await
        .unwrap();

    let chunks = chunks.lock().clone();
    let ids: Vec<&str> = chunks
        .iter()
        .filter(|chunk| chunk.starts_with("id: "))
        .map(|chunk| chunk.lines().next().unwrap())
        .collect();
    assert_eq!(ids, ["id: 3", "id: 4"]);
}

#[tokio::test]
async fn delete_closes_the_session() {
    let transport = Arc::new(StreamableHttpTransport::new(short_keepalive_config()));
    let server = Server::builder("http-server", "1.0").build(Box::new(ArcTransport(
        transport.clone(),
    )));
    server.connect().await.unwrap();

    let session_id = transport
        .handle_post(initialize_body().as_bytes(), None)
        .session_id
        .unwrap();

    assert_eq!(transport.handle_delete(&session_id), 204);
    assert_eq!(
        transport.handle_post(b"{}", Some(&session_id)).status,
        404
    );
}

/// Shares one transport between the server session and the test driver
struct ArcTransport(Arc<StreamableHttpTransport>);

#[async_trait]
impl loommcp_transport::Transport for ArcTransport {
    async fn connect(&self) -> loommcp_transport::TransportResult<()> {
        self.0.connect().await
    }
    async fn disconnect(&self) -> loommcp_transport::TransportResult<()> {
        self.0.disconnect().await
    }
    fn is_connected(&self) -> bool {
        self.0.is_connected()
    }
    async fn send(&self, frame: bytes::Bytes) -> loommcp_transport::TransportResult<()> {
        self.0.send(frame).await
    }
    fn set_message_callback(&self, callback: loommcp_transport::MessageCallback) {
        self.0.set_message_callback(callback);
    }
    fn set_error_callback(&self, callback: loommcp_transport::ErrorCallback) {
        self.0.set_error_callback(callback);
    }
}
