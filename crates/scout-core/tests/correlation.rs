//! Correlated request client tests over an in-memory transport

use async_trait::async_trait;
use scout_core::mcp::error::McpError;
use scout_core::mcp::protocol::{RpcError, RpcMessage, RpcRequest, RpcResponse};
use scout_core::mcp::transport::McpTransport;
use scout_core::mcp::McpClient;
use serde_json::{Value, json};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::timeout;

/// Transport backed by channels instead of a child process
struct MockTransport {
    outgoing: mpsc::UnboundedSender<RpcMessage>,
    inbound: mpsc::UnboundedReceiver<RpcMessage>,
    connected: bool,
}

#[async_trait]
impl McpTransport for MockTransport {
    async fn send(&mut self, message: RpcMessage) -> Result<(), McpError> {
        self.outgoing
            .send(message)
            .map_err(|_| McpError::transport("peer gone"))
    }

    async fn receive(&mut self) -> Result<RpcMessage, McpError> {
        self.inbound
            .recv()
            .await
            .ok_or_else(|| McpError::connection("peer closed"))
    }

    async fn close(&mut self) -> Result<(), McpError> {
        self.connected = false;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected
    }
}

/// Build a mock transport plus the peer-side channel ends
fn mock_pair() -> (
    MockTransport,
    mpsc::UnboundedReceiver<RpcMessage>,
    mpsc::UnboundedSender<RpcMessage>,
) {
    let (out_tx, out_rx) = mpsc::unbounded_channel();
    let (in_tx, in_rx) = mpsc::unbounded_channel();
    (
        MockTransport {
            outgoing: out_tx,
            inbound: in_rx,
            connected: true,
        },
        out_rx,
        in_tx,
    )
}

fn initialize_result() -> Value {
    json!({
        "protocolVersion": "2024-11-05",
        "capabilities": {},
        "serverInfo": {"name": "mock", "version": "0.0.1"}
    })
}

fn tool_result_with_text(text: &str) -> Value {
    json!({
        "isError": false,
        "content": [{"type": "text", "text": text}]
    })
}

/// Answer the handshake, swallowing the initialized notification
async fn complete_handshake(
    requests: &mut mpsc::UnboundedReceiver<RpcMessage>,
    responses: &mpsc::UnboundedSender<RpcMessage>,
) {
    loop {
        match requests.recv().await.expect("client hung up") {
            RpcMessage::Request(req) if req.method == "initialize" => {
                responses
                    .send(RpcMessage::Response(RpcResponse::success(
                        req.id,
                        initialize_result(),
                    )))
                    .unwrap();
                return;
            }
            other => panic!("unexpected message before initialize: {:?}", other),
        }
    }
}

async fn next_request(requests: &mut mpsc::UnboundedReceiver<RpcMessage>) -> RpcRequest {
    loop {
        match requests.recv().await.expect("client hung up") {
            RpcMessage::Request(req) => return req,
            RpcMessage::Notification(_) => continue,
            other => panic!("unexpected message: {:?}", other),
        }
    }
}

#[tokio::test]
async fn responses_are_demultiplexed_by_id_regardless_of_order() {
    let (transport, mut requests, responses) = mock_pair();
    let client = McpClient::new(Box::new(transport));

    let responses_clone = responses.clone();
    let responder = tokio::spawn(async move {
        complete_handshake(&mut requests, &responses_clone).await;

        // Collect all four calls first, then answer them newest-first
        let mut pending = Vec::new();
        for _ in 0..4 {
            let req = next_request(&mut requests).await;
            assert_eq!(req.method, "tools/call");
            let tag = req.params.as_ref().unwrap()["arguments"]["tag"]
                .as_str()
                .unwrap()
                .to_string();
            pending.push((req.id, tag));
        }
        for (id, tag) in pending.into_iter().rev() {
            responses_clone
                .send(RpcMessage::Response(RpcResponse::success(
                    id,
                    tool_result_with_text(&tag),
                )))
                .unwrap();
        }
    });

    client.initialize().await.unwrap();

    let (a, b, c, d) = tokio::join!(
        client.call_tool("echo", json!({"tag": "tag-0"})),
        client.call_tool("echo", json!({"tag": "tag-1"})),
        client.call_tool("echo", json!({"tag": "tag-2"})),
        client.call_tool("echo", json!({"tag": "tag-3"})),
    );

    assert_eq!(a.unwrap().text(), "tag-0");
    assert_eq!(b.unwrap().text(), "tag-1");
    assert_eq!(c.unwrap().text(), "tag-2");
    assert_eq!(d.unwrap().text(), "tag-3");

    responder.await.unwrap();
    client.close().await.unwrap();
}

#[tokio::test]
async fn close_fails_all_outstanding_requests() {
    let (transport, mut requests, responses) = mock_pair();
    let client = std::sync::Arc::new(McpClient::new(Box::new(transport)));

    let responses_clone = responses.clone();
    let silent_peer = tokio::spawn(async move {
        complete_handshake(&mut requests, &responses_clone).await;
        // Swallow the calls and never answer
        loop {
            if requests.recv().await.is_none() {
                break;
            }
        }
    });

    client.initialize().await.unwrap();

    let mut waiters = Vec::new();
    for i in 0..3 {
        let client = std::sync::Arc::clone(&client);
        waiters.push(tokio::spawn(async move {
            client.call_tool("hang", json!({"i": i})).await
        }));
    }

    // Let the calls get registered before pulling the plug
    tokio::time::sleep(Duration::from_millis(50)).await;

    timeout(Duration::from_secs(5), client.close())
        .await
        .expect("close must not hang")
        .unwrap();

    for waiter in waiters {
        let result = timeout(Duration::from_secs(5), waiter)
            .await
            .expect("pending request must not hang")
            .unwrap();
        let err = result.unwrap_err();
        assert!(matches!(err, McpError::Transport(_)), "got {:?}", err);
    }

    drop(responses);
    silent_peer.abort();
}

#[tokio::test]
async fn unanswered_request_times_out() {
    let (transport, mut requests, responses) = mock_pair();
    let client = McpClient::with_timeouts(
        Box::new(transport),
        Duration::from_millis(100),
        Duration::from_secs(5),
    );

    let responses_clone = responses.clone();
    let responder = tokio::spawn(async move {
        complete_handshake(&mut requests, &responses_clone).await;
        // Keep the channel open but never answer the call
        let _hold = requests.recv().await;
        std::future::pending::<()>().await;
    });

    client.initialize().await.unwrap();

    let err = client.call_tool("hang", json!({})).await.unwrap_err();
    assert!(matches!(err, McpError::Timeout(_)), "got {:?}", err);

    responder.abort();
    client.close().await.unwrap();
}

#[tokio::test]
async fn late_response_after_timeout_is_discarded() {
    let (transport, mut requests, responses) = mock_pair();
    let client = McpClient::with_timeouts(
        Box::new(transport),
        Duration::from_millis(100),
        Duration::from_secs(5),
    );

    let responses_clone = responses.clone();
    let responder = tokio::spawn(async move {
        complete_handshake(&mut requests, &responses_clone).await;

        // The second request only arrives after the first has timed out,
        // so answering the stale one first exercises the dead entry
        let stale = next_request(&mut requests).await;
        let fresh = next_request(&mut requests).await;
        responses_clone
            .send(RpcMessage::Response(RpcResponse::success(
                stale.id,
                tool_result_with_text("stale"),
            )))
            .unwrap();
        responses_clone
            .send(RpcMessage::Response(RpcResponse::success(
                fresh.id,
                tool_result_with_text("fresh"),
            )))
            .unwrap();
    });

    client.initialize().await.unwrap();

    let err = client.call_tool("slow", json!({})).await.unwrap_err();
    assert!(matches!(err, McpError::Timeout(_)), "got {:?}", err);

    let result = client.call_tool("fast", json!({})).await.unwrap();
    assert_eq!(result.text(), "fresh");

    responder.await.unwrap();
    client.close().await.unwrap();
}

#[tokio::test]
async fn peer_error_surfaces_as_remote_error() {
    let (transport, mut requests, responses) = mock_pair();
    let client = McpClient::new(Box::new(transport));

    let responses_clone = responses.clone();
    let responder = tokio::spawn(async move {
        complete_handshake(&mut requests, &responses_clone).await;
        let req = next_request(&mut requests).await;
        responses_clone
            .send(RpcMessage::Response(RpcResponse::error(
                req.id,
                RpcError::new(-32601, "Method not found"),
            )))
            .unwrap();
    });

    client.initialize().await.unwrap();

    let err = client.call_tool("missing", json!({})).await.unwrap_err();
    match err {
        McpError::Remote { code, message } => {
            assert_eq!(code, -32601);
            assert_eq!(message, "Method not found");
        }
        other => panic!("expected remote error, got {:?}", other),
    }

    responder.await.unwrap();
    client.close().await.unwrap();
}

#[tokio::test]
async fn transport_failure_fails_outstanding_requests() {
    let (transport, mut requests, responses) = mock_pair();
    let client = std::sync::Arc::new(McpClient::new(Box::new(transport)));

    let responses_clone = responses.clone();
    tokio::spawn(async move {
        complete_handshake(&mut requests, &responses_clone).await;
        let _ = next_request(&mut requests).await;
        // Dropping the response sender simulates the peer dying mid-request
        drop(responses_clone);
    });

    client.initialize().await.unwrap();
    drop(responses);

    let err = timeout(
        Duration::from_secs(5),
        client.call_tool("doomed", json!({})),
    )
    .await
    .expect("request must resolve after transport failure")
    .unwrap_err();

    assert!(matches!(err, McpError::Transport(_)), "got {:?}", err);
    // The receiver stores the dead connection before failing the waiters
    assert!(!client.is_connected());
}
