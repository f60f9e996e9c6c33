//! Streaming tool-call detector
//!
//! Scans the model's token stream for a fenced JSON tool call as it streams,
//! without waiting for the reply to finish. One scanner per model
//! invocation.

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

/// Opening fence for an embedded tool call
pub const OPEN_FENCE: &str = "```json";

/// Closing fence
pub const CLOSE_FENCE: &str = "```";

/// Parsed tool call extracted from the stream
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ToolCallPayload {
    /// Tool name
    pub name: String,
    /// Arguments mapping
    pub arguments: Value,
}

/// Detection state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanState {
    /// Still watching the stream
    Scanning,
    /// A tool call was found; the rest of this invocation is discarded
    Dispatching,
    /// Stream ended with no tool call
    Done,
}

/// Result of feeding one token
#[derive(Debug, Clone, PartialEq)]
pub enum ScanOutcome {
    /// Nothing yet; keep streaming
    Continue,
    /// A qualifying tool call appeared
    ToolCall(ToolCallPayload),
}

/// Incremental scanner over the accumulated model output
pub struct StreamScanner {
    buffer: String,
    /// Byte offset below which fences are already ruled out
    scan_from: usize,
    state: ScanState,
}

impl StreamScanner {
    /// Create a scanner for a fresh model invocation
    pub fn new() -> Self {
        Self {
            buffer: String::new(),
            scan_from: 0,
            state: ScanState::Scanning,
        }
    }

    /// Append a token and look for a completed fenced call.
    ///
    /// Detection is insensitive to token boundaries: the fences may arrive
    /// split across any number of tokens.
    pub fn push(&mut self, token: &str) -> ScanOutcome {
        if self.state != ScanState::Scanning {
            return ScanOutcome::Continue;
        }

        self.buffer.push_str(token);
        self.try_extract()
    }

    /// Mark the stream as finished and take the accumulated text
    pub fn finish(&mut self) -> String {
        self.state = ScanState::Done;
        std::mem::take(&mut self.buffer)
    }

    /// Current detection state
    pub fn state(&self) -> ScanState {
        self.state
    }

    /// Accumulated text so far
    pub fn text(&self) -> &str {
        &self.buffer
    }

    fn try_extract(&mut self) -> ScanOutcome {
        loop {
            let Some(open_rel) = self.buffer[self.scan_from..].find(OPEN_FENCE) else {
                return ScanOutcome::Continue;
            };
            let body_start = self.scan_from + open_rel + OPEN_FENCE.len();

            let Some(close_rel) = self.buffer[body_start..].find(CLOSE_FENCE) else {
                // Opening fence without its close yet; wait for more tokens
                return ScanOutcome::Continue;
            };
            let body = self.buffer[body_start..body_start + close_rel].trim();

            match serde_json::from_str::<Value>(body) {
                Ok(value) => {
                    if let Some(call) = as_tool_call(&value) {
                        self.state = ScanState::Dispatching;
                        return ScanOutcome::ToolCall(call);
                    }
                    // Fenced JSON without the tool-call shape is ordinary
                    // text, e.g. example code in the answer
                    debug!("Fenced JSON block is not a tool call; continuing");
                }
                Err(e) => {
                    warn!("Malformed fenced block ignored: {}", e);
                }
            }

            // Skip past this block and keep scanning
            self.scan_from = body_start + close_rel + CLOSE_FENCE.len();
        }
    }
}

impl Default for StreamScanner {
    fn default() -> Self {
        Self::new()
    }
}

/// A block qualifies only with a string `name` and an `arguments` field
fn as_tool_call(value: &Value) -> Option<ToolCallPayload> {
    let name = value.get("name")?.as_str()?;
    let arguments = value.get("arguments")?;
    Some(ToolCallPayload {
        name: name.to_string(),
        arguments: arguments.clone(),
    })
}
