//! Chat model client
//!
//! Talks to an OpenAI-compatible chat service and exposes the reply as an
//! incremental token stream.

pub mod client;
pub mod messages;
pub mod schema;

pub use client::{ChatBackend, ChatClient, TokenStream};
pub use messages::{ChatMessage, ChatRole};
pub use schema::{FunctionDecl, FunctionParameters, ParameterSpec};
