//! Tool-server protocol plumbing
//!
//! JSON-RPC over the stdio of a spawned child process, with a correlated
//! request client on top.

pub mod channel;
pub mod client;
pub mod error;
pub mod protocol;
pub mod transport;
pub mod types;

pub use channel::ProcessChannel;
pub use client::McpClient;
pub use error::McpError;
pub use transport::{McpTransport, StdioTransport};
pub use types::{RemoteTool, ToolContent, ToolInvokeResult};
