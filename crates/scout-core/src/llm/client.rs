//! Streaming chat client
//!
//! Posts to an OpenAI-compatible `/v1/chat/completions` endpoint with
//! `stream: true` and turns the SSE reply into a plain token stream.

use crate::error::{ScoutError, ScoutResult};
use crate::llm::messages::ChatMessage;
use crate::llm::schema::FunctionDecl;
use async_trait::async_trait;
use futures::{Stream, StreamExt};
use serde_json::{Value, json};
use std::pin::Pin;

/// Incremental model output
pub type TokenStream = Pin<Box<dyn Stream<Item = ScoutResult<String>> + Send>>;

/// Source of streamed chat completions
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Start a streaming chat completion over the full history
    async fn chat_stream(
        &self,
        messages: &[ChatMessage],
        tools: &[FunctionDecl],
    ) -> ScoutResult<TokenStream>;
}

/// Client for the chat service
pub struct ChatClient {
    base_url: String,
    model: String,
    http: reqwest::Client,
}

impl ChatClient {
    /// Create a client for the given service and model
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            model: model.into(),
            http: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl ChatBackend for ChatClient {
    async fn chat_stream(
        &self,
        messages: &[ChatMessage],
        tools: &[FunctionDecl],
    ) -> ScoutResult<TokenStream> {
        let url = format!("{}/v1/chat/completions", self.base_url);

        let mut body = json!({
            "model": self.model,
            "messages": messages,
            "stream": true,
        });
        if !tools.is_empty() {
            body["tools"] = Value::Array(
                tools
                    .iter()
                    .map(|decl| json!({"type": "function", "function": decl}))
                    .collect(),
            );
        }

        tracing::debug!(model = %self.model, turns = messages.len(), "chat request");

        let response = self
            .http
            .post(&url)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| ScoutError::llm(format!("Chat request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(ScoutError::llm(format!(
                "Chat service error (status {}): {}",
                status, error_text
            )));
        }

        Ok(sse_token_stream(response.bytes_stream()))
    }
}

/// Parse an OpenAI-compatible SSE byte stream into a token stream.
///
/// The format: lines prefixed `data: `, JSON with
/// `choices[0].delta.content`, and a `[DONE]` terminator. Network chunks can
/// split a line anywhere, so undelivered bytes carry over between chunks.
pub(crate) fn sse_token_stream<B, E>(
    byte_stream: impl Stream<Item = Result<B, E>> + Send + 'static,
) -> TokenStream
where
    B: AsRef<[u8]> + Send + 'static,
    E: std::fmt::Display + Send + 'static,
{
    let stream = byte_stream
        .scan(String::new(), |carry, chunk_result| {
            let tokens: Vec<ScoutResult<String>> = match chunk_result {
                Ok(chunk) => {
                    carry.push_str(&String::from_utf8_lossy(chunk.as_ref()));
                    drain_tokens(carry)
                }
                Err(e) => vec![Err(ScoutError::llm(format!("Stream error: {}", e)))],
            };
            futures::future::ready(Some(futures::stream::iter(tokens)))
        })
        .flatten();

    Box::pin(stream)
}

/// Pull every complete SSE line out of the carry buffer
fn drain_tokens(carry: &mut String) -> Vec<ScoutResult<String>> {
    let mut tokens = Vec::new();

    while let Some(pos) = carry.find('\n') {
        let line: String = carry.drain(..=pos).collect();
        let line = line.trim();

        let Some(data) = line.strip_prefix("data: ") else {
            continue;
        };
        if data == "[DONE]" {
            continue;
        }

        match serde_json::from_str::<Value>(data) {
            Ok(event) => {
                if let Some(content) = event["choices"][0]["delta"]["content"].as_str() {
                    if !content.is_empty() {
                        tokens.push(Ok(content.to_string()));
                    }
                }
            }
            Err(e) => {
                tracing::warn!("Skipping unparseable SSE line: {}", e);
            }
        }
    }

    tokens
}
