//! Agent configuration
//!
//! All knobs live in one value passed into [`crate::Agent`]; there is no
//! global state, so independent agents can run side by side in tests.

use crate::error::{ScoutError, ScoutResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

fn default_model() -> String {
    "qwen2.5-coder".to_string()
}

fn default_base_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_runtime() -> String {
    "deno".to_string()
}

fn default_server_script() -> PathBuf {
    PathBuf::from("server.ts")
}

fn default_request_timeout() -> u64 {
    300 // 5 minutes
}

fn default_handshake_timeout() -> u64 {
    30
}

fn default_max_tool_rounds() -> u32 {
    8
}

/// Configuration for one agent session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Chat model identifier
    #[serde(default = "default_model")]
    pub model: String,
    /// Base URL of the OpenAI-compatible chat service
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Runtime used to launch the tool server (spawned as `<runtime> run -A <script> <dirs...>`)
    #[serde(default = "default_runtime")]
    pub runtime: String,
    /// Path to the tool server entry script
    #[serde(default = "default_server_script")]
    pub server_script: PathBuf,
    /// Directories the tool server is allowed to touch, passed as positional args
    #[serde(default)]
    pub allowed_dirs: Vec<PathBuf>,
    /// Timeout for a single tool-server request in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    /// Timeout for the startup handshake in seconds
    #[serde(default = "default_handshake_timeout")]
    pub handshake_timeout_secs: u64,
    /// Maximum tool-call rounds per user input before the loop fails closed
    #[serde(default = "default_max_tool_rounds")]
    pub max_tool_rounds: u32,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            base_url: default_base_url(),
            runtime: default_runtime(),
            server_script: default_server_script(),
            allowed_dirs: Vec::new(),
            request_timeout_secs: default_request_timeout(),
            handshake_timeout_secs: default_handshake_timeout(),
            max_tool_rounds: default_max_tool_rounds(),
        }
    }
}

impl AgentConfig {
    /// Load configuration from a JSON file
    pub fn load(path: impl AsRef<Path>) -> ScoutResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            ScoutError::config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        serde_json::from_str(&content).map_err(|e| {
            ScoutError::config(format!("Failed to parse {}: {}", path.display(), e))
        })
    }
}
