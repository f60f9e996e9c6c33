//! Agent loop
//!
//! Drives one user input to completion: stream the model's reply, watch for
//! a fenced tool call, dispatch it against the tool server, feed the result
//! back, and re-invoke the model over the grown history until it answers in
//! plain text or the round limit trips.

pub mod detector;
pub mod schema;

use crate::config::AgentConfig;
use crate::error::{ScoutError, ScoutResult};
use crate::llm::client::{ChatBackend, ChatClient};
use crate::llm::messages::ChatMessage;
use crate::llm::schema::FunctionDecl;
use crate::mcp::client::McpClient;
use crate::mcp::error::McpError;
use crate::mcp::transport::StdioTransport;
use crate::mcp::types::ToolInvokeResult;
use detector::{ScanOutcome, StreamScanner, ToolCallPayload};
use futures::StreamExt;
use schema::SchemaAdapter;
use std::time::Duration;
use tracing::{info, warn};

/// Events surfaced to the caller while a turn runs
#[derive(Debug)]
pub enum AgentEvent<'a> {
    /// One token of model output
    Token(&'a str),
    /// A tool call was detected and is being dispatched
    ToolDispatch(&'a str),
    /// The dispatched tool finished
    ToolResult { name: &'a str, is_error: bool },
}

const SYSTEM_PROMPT: &str = "You are a helpful assistant with access to tools. \
To call a tool, reply with a fenced block of the form:\n\
```json\n{\"name\": \"<tool name>\", \"arguments\": { ... }}\n```\n\
Emit at most one tool call per reply and nothing after it. When you have \
everything you need, answer in plain text without a fenced json block.\n\n\
Available tools:\n";

/// Conversational agent bound to one tool server
pub struct Agent {
    config: AgentConfig,
    chat: Box<dyn ChatBackend>,
    mcp: McpClient,
    tools: Vec<FunctionDecl>,
    history: Vec<ChatMessage>,
}

impl Agent {
    /// Spawn the tool server, perform the handshake, and fetch the tool list
    pub async fn connect(config: AgentConfig) -> ScoutResult<Self> {
        let transport = StdioTransport::spawn(
            &config.runtime,
            &config.server_script,
            &config.allowed_dirs,
        )?;
        let mcp = McpClient::with_timeouts(
            Box::new(transport),
            Duration::from_secs(config.request_timeout_secs),
            Duration::from_secs(config.handshake_timeout_secs),
        );

        let server = mcp.initialize().await?;
        info!(server = %server.name, version = %server.version, "connected to tool server");

        let remote_tools = mcp.list_tools().await?;
        info!(count = remote_tools.len(), "tools discovered");
        let tools = SchemaAdapter::to_function_decls(&remote_tools);

        let chat: Box<dyn ChatBackend> = Box::new(ChatClient::new(&config.base_url, &config.model));
        let history = vec![ChatMessage::system(system_prompt(&tools))];

        Ok(Self {
            config,
            chat,
            mcp,
            tools,
            history,
        })
    }

    /// Names of the tools advertised to the model
    pub fn tool_names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name.as_str()).collect()
    }

    /// Conversation history so far
    pub fn history(&self) -> &[ChatMessage] {
        &self.history
    }

    /// Process one user input to completion, including tool round-trips.
    ///
    /// Returns the assistant's final text for this turn.
    pub async fn run_turn(
        &mut self,
        input: &str,
        mut on_event: impl FnMut(AgentEvent<'_>),
    ) -> ScoutResult<String> {
        self.history.push(ChatMessage::user(input));

        for _round in 0..self.config.max_tool_rounds {
            let mut stream = self.chat.chat_stream(&self.history, &self.tools).await?;
            let mut scanner = StreamScanner::new();
            let mut call: Option<ToolCallPayload> = None;

            while let Some(token) = stream.next().await {
                let token = token?;
                on_event(AgentEvent::Token(&token));
                if let ScanOutcome::ToolCall(payload) = scanner.push(&token) {
                    // The rest of this invocation's output is discarded
                    call = Some(payload);
                    break;
                }
            }
            drop(stream);

            let Some(call) = call else {
                let text = scanner.finish();
                self.history.push(ChatMessage::assistant(text.clone()));
                return Ok(text);
            };

            on_event(AgentEvent::ToolDispatch(&call.name));
            self.history
                .push(ChatMessage::assistant(scanner.text().to_string()));

            let (result_text, is_error) = self.dispatch(&call).await?;
            on_event(AgentEvent::ToolResult {
                name: &call.name,
                is_error,
            });
            self.history.push(ChatMessage::user(result_text));
        }

        // Fail closed instead of looping forever
        warn!(rounds = self.config.max_tool_rounds, "tool round limit hit");
        let notice = format!(
            "Maximum tool rounds ({}) exceeded; stopping this turn.",
            self.config.max_tool_rounds
        );
        self.history.push(ChatMessage::assistant(notice.clone()));
        Ok(notice)
    }

    /// Invoke one tool. Peer-level failures come back as conversation text
    /// so the model can self-correct; channel failures propagate as fatal.
    async fn dispatch(&self, call: &ToolCallPayload) -> ScoutResult<(String, bool)> {
        info!(tool = %call.name, "dispatching tool call");

        match self.mcp.call_tool(&call.name, call.arguments.clone()).await {
            Ok(result) => Ok((format_tool_output(&call.name, &result), result.is_error)),
            Err(McpError::Remote { code, message }) => {
                warn!(tool = %call.name, code, "tool server rejected the call");
                Ok((
                    format!("Tool {} error:\n[{}] {}", call.name, code, message),
                    true,
                ))
            }
            Err(McpError::Timeout(secs)) => Ok((
                format!("Tool {} error:\ntimed out after {} seconds", call.name, secs),
                true,
            )),
            Err(e) => Err(ScoutError::from(e)),
        }
    }

    /// Stop the tool server and release the channel
    pub async fn shutdown(&self) -> ScoutResult<()> {
        self.mcp.close().await?;
        Ok(())
    }
}

/// Render a tool result as the text of a conversation turn
fn format_tool_output(name: &str, result: &ToolInvokeResult) -> String {
    let text = result.text();
    if result.is_error {
        format!("Tool {} error:\n{}", name, text)
    } else {
        format!("Tool {} output:\n{}", name, text)
    }
}

/// System prompt including the advertised tool list
fn system_prompt(tools: &[FunctionDecl]) -> String {
    let mut prompt = String::from(SYSTEM_PROMPT);
    for tool in tools {
        prompt.push_str(&format!("- {}: {}\n", tool.name, tool.description));
    }
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::client::TokenStream;
    use crate::llm::messages::ChatRole;
    use crate::mcp::protocol::{RpcMessage, RpcResponse};
    use crate::mcp::transport::McpTransport;
    use crate::mcp::types::ToolContent;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Backend that plays back one canned token list per invocation
    struct ScriptedChat {
        replies: Mutex<VecDeque<Vec<String>>>,
    }

    impl ScriptedChat {
        fn new(replies: Vec<Vec<&str>>) -> Self {
            Self {
                replies: Mutex::new(
                    replies
                        .into_iter()
                        .map(|tokens| tokens.into_iter().map(str::to_string).collect())
                        .collect(),
                ),
            }
        }
    }

    #[async_trait::async_trait]
    impl ChatBackend for ScriptedChat {
        async fn chat_stream(
            &self,
            _messages: &[ChatMessage],
            _tools: &[FunctionDecl],
        ) -> ScoutResult<TokenStream> {
            let tokens = self
                .replies
                .lock()
                .unwrap()
                .pop_front()
                .expect("no scripted reply left");
            Ok(Box::pin(futures::stream::iter(
                tokens.into_iter().map(ScoutResult::Ok),
            )))
        }
    }

    /// Transport that answers every request itself, without a child process
    struct ScriptedTransport {
        queue: VecDeque<RpcMessage>,
    }

    impl ScriptedTransport {
        fn new() -> Self {
            Self {
                queue: VecDeque::new(),
            }
        }
    }

    #[async_trait::async_trait]
    impl McpTransport for ScriptedTransport {
        async fn send(&mut self, message: RpcMessage) -> Result<(), McpError> {
            if let RpcMessage::Request(req) = message {
                let result = match req.method.as_str() {
                    "initialize" => json!({
                        "protocolVersion": "2024-11-05",
                        "capabilities": {},
                        "serverInfo": {"name": "scripted", "version": "0.0.1"}
                    }),
                    "tools/call" => json!({
                        "isError": false,
                        "content": [{"type": "text", "text": "ok"}]
                    }),
                    _ => json!({}),
                };
                self.queue
                    .push_back(RpcMessage::Response(RpcResponse::success(req.id, result)));
            }
            Ok(())
        }

        async fn receive(&mut self) -> Result<RpcMessage, McpError> {
            match self.queue.pop_front() {
                Some(message) => Ok(message),
                None => std::future::pending().await,
            }
        }

        async fn close(&mut self) -> Result<(), McpError> {
            Ok(())
        }

        fn is_connected(&self) -> bool {
            true
        }
    }

    async fn scripted_agent(chat: ScriptedChat, max_tool_rounds: u32) -> Agent {
        let mcp = McpClient::new(Box::new(ScriptedTransport::new()));
        mcp.initialize().await.unwrap();

        Agent {
            config: AgentConfig {
                max_tool_rounds,
                ..Default::default()
            },
            chat: Box::new(chat),
            mcp,
            tools: Vec::new(),
            history: vec![ChatMessage::system("test")],
        }
    }

    #[tokio::test]
    async fn test_tool_result_recorded_as_history_turn() {
        let chat = ScriptedChat::new(vec![
            vec!["```json\n", "{\"name\":\"x\",\"arguments\":{}}", "\n```"],
            vec!["done"],
        ]);
        let mut agent = scripted_agent(chat, 8).await;

        let mut dispatched = Vec::new();
        let answer = agent
            .run_turn("hi", |event| {
                if let AgentEvent::ToolDispatch(name) = event {
                    dispatched.push(name.to_string());
                }
            })
            .await
            .unwrap();

        assert_eq!(answer, "done");
        assert_eq!(dispatched, vec!["x"]);

        let turn = agent
            .history()
            .iter()
            .find(|m| m.role == ChatRole::User && m.content.starts_with("Tool "))
            .expect("tool result turn missing from history");
        assert_eq!(turn.content, "Tool x output:\nok");

        assert_eq!(agent.history().last().unwrap().content, "done");
        agent.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_round_limit_fails_closed() {
        let call = vec!["```json\n{\"name\":\"x\",\"arguments\":{}}\n```"];
        let chat = ScriptedChat::new(vec![call.clone(), call]);
        let mut agent = scripted_agent(chat, 2).await;

        let mut rounds = 0;
        let answer = agent
            .run_turn("hi", |event| {
                if matches!(event, AgentEvent::ToolDispatch(_)) {
                    rounds += 1;
                }
            })
            .await
            .unwrap();

        assert_eq!(rounds, 2);
        assert_eq!(answer, "Maximum tool rounds (2) exceeded; stopping this turn.");
        assert_eq!(agent.history().last().unwrap().content, answer);
        agent.shutdown().await.unwrap();
    }

    #[test]
    fn test_format_tool_output_success() {
        let result = ToolInvokeResult {
            content: vec![ToolContent::text("ok")],
            is_error: false,
        };
        assert_eq!(format_tool_output("x", &result), "Tool x output:\nok");
    }

    #[test]
    fn test_format_tool_output_error() {
        let result = ToolInvokeResult {
            content: vec![ToolContent::text("no such file")],
            is_error: true,
        };
        assert_eq!(
            format_tool_output("read_file", &result),
            "Tool read_file error:\nno such file"
        );
    }

    #[test]
    fn test_system_prompt_lists_tools() {
        let tools = vec![FunctionDecl {
            name: "search".to_string(),
            description: "Search files".to_string(),
            parameters: Default::default(),
        }];
        let prompt = system_prompt(&tools);
        assert!(prompt.contains("- search: Search files"));
    }
}
