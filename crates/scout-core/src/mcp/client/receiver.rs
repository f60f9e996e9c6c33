//! Background receiver task
//!
//! The task is the sole owner of the transport. Requests are registered and
//! written in one command, so a response can never arrive unrouted, and every
//! inbound message is dispatched to the pending slot whose correlation id
//! matches, independent of send order. Outstanding requests never hang:
//! transport failure or shutdown resolves each of them with a transport
//! error.

use super::super::error::McpError;
use super::super::protocol::{RpcMessage, RpcResponse};
use super::super::transport::McpTransport;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, warn};

/// Slot a pending request waits on
pub(super) type ResponseSlot = oneshot::Sender<Result<RpcResponse, McpError>>;

/// Commands from the client to the receiver task
pub(super) enum ReceiverCommand {
    /// Register a pending request and write its message
    Request {
        id: String,
        message: RpcMessage,
        slot: ResponseSlot,
    },
    /// Write a notification (no response expected)
    Notify {
        message: RpcMessage,
        ack: oneshot::Sender<Result<(), McpError>>,
    },
    /// Deregister a request whose caller gave up (timeout)
    Cancel { id: String },
    /// Close the transport and stop
    Shutdown {
        ack: oneshot::Sender<Result<(), McpError>>,
    },
}

/// Receiver loop: demultiplexes inbound messages by correlation id
pub(super) async fn run_receiver(
    mut transport: Box<dyn McpTransport>,
    mut commands: mpsc::Receiver<ReceiverCommand>,
    running: Arc<AtomicBool>,
) {
    let mut pending: HashMap<String, ResponseSlot> = HashMap::new();

    while running.load(Ordering::SeqCst) {
        tokio::select! {
            cmd = commands.recv() => {
                match cmd {
                    Some(ReceiverCommand::Request { id, message, slot }) => {
                        match transport.send(message).await {
                            Ok(()) => {
                                if pending.insert(id.clone(), slot).is_some() {
                                    // Correlation ids are unique among
                                    // outstanding requests; a duplicate means
                                    // a client bug.
                                    warn!("Duplicate pending request id {}", id);
                                }
                            }
                            Err(e) => {
                                let _ = slot.send(Err(e));
                            }
                        }
                    }
                    Some(ReceiverCommand::Notify { message, ack }) => {
                        let _ = ack.send(transport.send(message).await);
                    }
                    Some(ReceiverCommand::Cancel { id }) => {
                        if pending.remove(&id).is_some() {
                            debug!("Deregistered timed-out request {}", id);
                        }
                    }
                    Some(ReceiverCommand::Shutdown { ack }) => {
                        debug!("Message receiver shutting down");
                        fail_pending(&mut pending, "Channel stopped");
                        let _ = ack.send(transport.close().await);
                        break;
                    }
                    None => {
                        fail_pending(&mut pending, "Channel stopped");
                        let _ = transport.close().await;
                        break;
                    }
                }
            }
            result = transport.receive() => {
                match result {
                    Ok(RpcMessage::Response(response)) => {
                        let id = response.id.to_string();
                        match pending.remove(&id) {
                            Some(slot) => {
                                if slot.send(Ok(response)).is_err() {
                                    // Caller gave up (timeout); drop the response
                                    debug!("No waiter left for response {}", id);
                                }
                            }
                            None => warn!("Response for unknown request id {}", id),
                        }
                    }
                    Ok(RpcMessage::Notification(notification)) => {
                        debug!("Server notification: {}", notification.method);
                    }
                    Ok(RpcMessage::Request(request)) => {
                        // Server-initiated requests are not part of this protocol
                        warn!("Ignoring server request: {}", request.method);
                    }
                    Err(e) => {
                        if running.load(Ordering::SeqCst) {
                            error!("Transport failure: {}", e);
                        }
                        // The client must observe the dead connection
                        running.store(false, Ordering::SeqCst);
                        fail_pending(&mut pending, &e.to_string());
                        break;
                    }
                }
            }
        }
    }
}

/// Resolve every outstanding request with a transport error
fn fail_pending(pending: &mut HashMap<String, ResponseSlot>, reason: &str) {
    for (id, slot) in pending.drain() {
        debug!("Failing pending request {}: {}", id, reason);
        let _ = slot.send(Err(McpError::transport(reason.to_string())));
    }
}
