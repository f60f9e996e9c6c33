//! Message transport over the process channel
//!
//! Frames JSON-RPC messages as newline-delimited JSON on the child's
//! stdin/stdout.

use crate::mcp::channel::ProcessChannel;
use crate::mcp::error::McpError;
use crate::mcp::protocol::RpcMessage;
use async_trait::async_trait;
use std::path::Path;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{ChildStdin, ChildStdout};

/// Transport trait for tool-server communication
#[async_trait]
pub trait McpTransport: Send + Sync {
    /// Send one message
    async fn send(&mut self, message: RpcMessage) -> Result<(), McpError>;

    /// Receive one message
    ///
    /// Must be cancellation safe: the client's receiver task polls this
    /// inside a `select!` and drops the future whenever a command wins.
    /// Partially read input has to survive into the next call.
    async fn receive(&mut self) -> Result<RpcMessage, McpError>;

    /// Close the transport and release the channel it owns
    async fn close(&mut self) -> Result<(), McpError>;

    /// Whether the transport is still usable
    fn is_connected(&self) -> bool;
}

/// Stdio transport over a spawned tool server
pub struct StdioTransport {
    channel: Option<ProcessChannel>,
    stdin: Option<ChildStdin>,
    stdout: Option<Lines<BufReader<ChildStdout>>>,
    connected: bool,
}

impl StdioTransport {
    /// Spawn the tool server and bind to its streams
    pub fn spawn(
        runtime: &str,
        script: &Path,
        allowed_dirs: &[impl AsRef<Path>],
    ) -> Result<Self, McpError> {
        let mut channel = ProcessChannel::spawn(runtime, script, allowed_dirs)?;

        let stdin = channel
            .take_stdin()
            .ok_or_else(|| McpError::spawn("Channel stdin already taken"))?;
        let stdout = channel
            .take_stdout()
            .ok_or_else(|| McpError::spawn("Channel stdout already taken"))?;

        Ok(Self {
            channel: Some(channel),
            stdin: Some(stdin),
            stdout: Some(BufReader::new(stdout).lines()),
            connected: true,
        })
    }

    /// Describe why the stream ended, consulting the child's exit status
    fn closed_reason(&mut self) -> McpError {
        match self.channel.as_mut().and_then(|c| c.exit_status()) {
            Some(status) if !status.success() => {
                McpError::transport(format!("Tool server exited abnormally ({})", status))
            }
            _ => McpError::connection("Tool server closed the connection"),
        }
    }
}

#[async_trait]
impl McpTransport for StdioTransport {
    async fn send(&mut self, message: RpcMessage) -> Result<(), McpError> {
        let stdin = self.stdin.as_mut().ok_or(McpError::NotInitialized)?;

        let json = serde_json::to_string(&message)?;
        stdin.write_all(json.as_bytes()).await?;
        stdin.write_all(b"\n").await?;
        stdin.flush().await?;

        Ok(())
    }

    async fn receive(&mut self) -> Result<RpcMessage, McpError> {
        // next_line is cancellation safe, so the select! in the receiver
        // task cannot drop a partially read line
        loop {
            let line = {
                let stdout = self.stdout.as_mut().ok_or(McpError::NotInitialized)?;
                stdout.next_line().await?
            };

            let Some(line) = line else {
                self.connected = false;
                return Err(self.closed_reason());
            };

            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            return Ok(serde_json::from_str(line)?);
        }
    }

    async fn close(&mut self) -> Result<(), McpError> {
        self.connected = false;
        self.stdin.take();
        self.stdout.take();

        if let Some(mut channel) = self.channel.take() {
            channel.stop().await?;
        }

        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected
    }
}
