//! Correlated request client
//!
//! Sends JSON-RPC requests with unique correlation ids and resolves exactly
//! one response per request. A single persistent background task owns the
//! transport and routes every inbound message to its waiter, so any number
//! of requests can be outstanding at once without handler re-registration
//! or locking.

mod operations;
mod receiver;

use super::error::McpError;
use super::protocol::{
    PROTOCOL_VERSION, RequestId, RpcMessage, RpcNotification, RpcRequest, methods,
};
use super::transport::McpTransport;
use super::types::{ClientCapabilities, ClientInfo, InitializeParams, InitializeResult, ServerInfo};
use receiver::ReceiverCommand;
use serde_json::{Value, json};
use std::sync::Arc;
use std::sync::Mutex as StdMutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::{RwLock, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::timeout;

/// Default per-request timeout in seconds
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 300;

/// Default handshake timeout in seconds
const DEFAULT_HANDSHAKE_TIMEOUT_SECS: u64 = 30;

/// Client for the tool-server protocol
pub struct McpClient {
    /// Correlation id counter
    request_id: AtomicU64,
    /// Command channel to the background receiver
    commands: mpsc::Sender<ReceiverCommand>,
    /// Whether the handshake completed
    initialized: RwLock<bool>,
    /// Whether the client is running
    running: Arc<AtomicBool>,
    /// Per-request timeout
    request_timeout: Duration,
    /// Handshake timeout
    handshake_timeout: Duration,
    /// Server identification from the handshake
    server_info: RwLock<Option<ServerInfo>>,
    /// Background receiver task
    receiver_handle: StdMutex<Option<JoinHandle<()>>>,
}

impl McpClient {
    /// Create a client over the given transport with default timeouts
    pub fn new(transport: Box<dyn McpTransport>) -> Self {
        Self::with_timeouts(
            transport,
            Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            Duration::from_secs(DEFAULT_HANDSHAKE_TIMEOUT_SECS),
        )
    }

    /// Create a client with explicit timeouts
    pub fn with_timeouts(
        transport: Box<dyn McpTransport>,
        request_timeout: Duration,
        handshake_timeout: Duration,
    ) -> Self {
        let (commands, command_receiver) = mpsc::channel(64);
        let running = Arc::new(AtomicBool::new(true));

        let receiver_handle = tokio::spawn(receiver::run_receiver(
            transport,
            command_receiver,
            Arc::clone(&running),
        ));

        Self {
            request_id: AtomicU64::new(1),
            commands,
            initialized: RwLock::new(false),
            running,
            request_timeout,
            handshake_timeout,
            server_info: RwLock::new(None),
            receiver_handle: StdMutex::new(Some(receiver_handle)),
        }
    }

    /// Perform the startup handshake, bounded by the handshake timeout
    pub async fn initialize(&self) -> Result<ServerInfo, McpError> {
        if *self.initialized.read().await {
            return Err(McpError::AlreadyInitialized);
        }

        let params = InitializeParams {
            protocol_version: PROTOCOL_VERSION.to_string(),
            capabilities: ClientCapabilities::default(),
            client_info: ClientInfo::default(),
        };

        let call = self.call::<InitializeResult>(methods::INITIALIZE, Some(json!(params)));
        let result = match timeout(self.handshake_timeout, call).await {
            Ok(result) => result.map_err(|e| McpError::handshake(e.to_string()))?,
            Err(_) => {
                return Err(McpError::handshake(format!(
                    "No response within {} seconds",
                    self.handshake_timeout.as_secs()
                )));
            }
        };

        *self.server_info.write().await = Some(result.server_info.clone());
        *self.initialized.write().await = true;

        self.notify(methods::INITIALIZED, None).await?;

        Ok(result.server_info)
    }

    /// Whether the handshake completed
    pub async fn is_initialized(&self) -> bool {
        *self.initialized.read().await
    }

    /// Server identification, if the handshake completed
    pub async fn server_info(&self) -> Option<ServerInfo> {
        self.server_info.read().await.clone()
    }

    /// Whether the client is running
    pub fn is_connected(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Stop the client: close the transport and fail any outstanding request
    pub async fn close(&self) -> Result<(), McpError> {
        self.running.store(false, Ordering::SeqCst);

        let (ack, closed) = oneshot::channel();
        if self
            .commands
            .send(ReceiverCommand::Shutdown { ack })
            .await
            .is_ok()
        {
            // The receiver may already be gone after a transport failure
            let _ = closed.await;
        }

        let handle = {
            let mut guard = self
                .receiver_handle
                .lock()
                .map_err(|_| McpError::transport("Receiver handle lock poisoned"))?;
            guard.take()
        };
        if let Some(handle) = handle {
            let _ = handle.await;
        }

        *self.initialized.write().await = false;
        Ok(())
    }

    /// Send a request and wait for its correlated response
    pub(crate) async fn call<T>(&self, method: &str, params: Option<Value>) -> Result<T, McpError>
    where
        T: serde::de::DeserializeOwned,
    {
        let id = self.next_request_id();
        let id_str = id.to_string();

        let request = RpcRequest::new(id, method);
        let request = match params {
            Some(p) => request.with_params(p),
            None => request,
        };

        // Registration and write happen as one command in the receiver task,
        // so a fast response cannot arrive unrouted.
        let (slot, waiter) = oneshot::channel();
        self.commands
            .send(ReceiverCommand::Request {
                id: id_str.clone(),
                message: RpcMessage::Request(request),
                slot,
            })
            .await
            .map_err(|_| McpError::connection("Receiver is gone"))?;

        let response = match timeout(self.request_timeout, waiter).await {
            Ok(result) => result
                .map_err(|_| McpError::connection("Response channel closed"))??,
            Err(_) => {
                // Deregister so the pending map does not keep a dead slot
                let _ = self
                    .commands
                    .send(ReceiverCommand::Cancel { id: id_str })
                    .await;
                return Err(McpError::Timeout(self.request_timeout.as_secs()));
            }
        };

        match response.into_result() {
            Ok(value) => serde_json::from_value(value).map_err(McpError::from),
            Err(e) => Err(McpError::remote(e.code, e.message)),
        }
    }

    /// Send a notification (no response expected)
    async fn notify(&self, method: &str, params: Option<Value>) -> Result<(), McpError> {
        let mut notification = RpcNotification::new(method);
        notification.params = params;

        let (ack, sent) = oneshot::channel();
        self.commands
            .send(ReceiverCommand::Notify {
                message: RpcMessage::Notification(notification),
                ack,
            })
            .await
            .map_err(|_| McpError::connection("Receiver is gone"))?;

        sent.await
            .map_err(|_| McpError::connection("Receiver is gone"))?
    }

    /// Allocate the next correlation id; unique per outstanding request
    fn next_request_id(&self) -> RequestId {
        let id = self.request_id.fetch_add(1, Ordering::SeqCst);
        match i64::try_from(id) {
            Ok(n) => RequestId::Number(n),
            Err(_) => RequestId::String(format!("req-{}", id)),
        }
    }

    /// Guard operations that require a completed handshake
    pub(crate) async fn ensure_initialized(&self) -> Result<(), McpError> {
        if !*self.initialized.read().await {
            return Err(McpError::NotInitialized);
        }
        Ok(())
    }
}

impl Drop for McpClient {
    fn drop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Ok(mut guard) = self.receiver_handle.lock() {
            if let Some(handle) = guard.take() {
                handle.abort();
            }
        }
    }
}
