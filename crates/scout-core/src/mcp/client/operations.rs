//! High-level protocol operations

use super::McpClient;
use super::super::error::McpError;
use super::super::protocol::methods;
use super::super::types::{RemoteTool, ToolInvokeResult};
use serde_json::{Value, json};

impl McpClient {
    /// Enumerate the tools the server exposes
    pub async fn list_tools(&self) -> Result<Vec<RemoteTool>, McpError> {
        self.ensure_initialized().await?;

        let result: Value = self.call(methods::TOOLS_LIST, None).await?;

        let tools: Vec<RemoteTool> =
            serde_json::from_value(result["tools"].clone()).unwrap_or_default();

        Ok(tools)
    }

    /// Invoke a named tool with the given arguments
    ///
    /// A `Remote` error means the peer rejected the request itself; a result
    /// with `is_error` set means the tool ran and failed. Callers treat both
    /// as recoverable.
    pub async fn call_tool(
        &self,
        name: &str,
        arguments: Value,
    ) -> Result<ToolInvokeResult, McpError> {
        self.ensure_initialized().await?;

        let params = json!({
            "name": name,
            "arguments": arguments
        });

        self.call(methods::TOOLS_CALL, Some(params)).await
    }
}
