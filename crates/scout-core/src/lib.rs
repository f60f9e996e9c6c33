//! Core library for the scout agent
//!
//! Connects a streaming chat model to an external tool server spawned as a
//! child process. The model's token stream is scanned live for fenced JSON
//! tool calls; detected calls are dispatched over a JSON-RPC stdio channel
//! and the results fed back into the conversation until the model produces
//! a final answer.

pub mod agent;
pub mod config;
pub mod error;
pub mod llm;
pub mod mcp;

pub use agent::{Agent, AgentEvent};
pub use config::AgentConfig;
pub use error::{ScoutError, ScoutResult};
