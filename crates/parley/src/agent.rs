use async_stream::stream;
use futures::stream::BoxStream;
use futures::StreamExt;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::conversation::Conversation;
use crate::errors::{AgentError, AgentResult};
use crate::models::message::Message;
use crate::models::tool::{ToolCallRequest, ToolSchema};
use crate::providers::base::{DeltaStream, Provider, ProviderResponse};
use crate::providers::errors::ProviderError;
use crate::schema::generate_tool_schemas;
use crate::tools::{ToolError, ToolRegistry};

/// Bounds and pacing for one conversation loop
#[derive(Debug, Clone, PartialEq)]
pub struct AgentConfig {
    /// Provider calls allowed before the loop gives up
    pub max_turns: usize,
    pub tool_timeout: Duration,
    pub provider_timeout: Duration,
    /// Characters per simulated streaming fragment
    pub fragment_size: usize,
    pub fragment_delay: Duration,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_turns: 10,
            tool_timeout: Duration::from_secs(30),
            provider_timeout: Duration::from_secs(600),
            fragment_size: 2,
            fragment_delay: Duration::from_millis(30),
        }
    }
}

impl AgentConfig {
    pub fn with_max_turns(mut self, max_turns: usize) -> Self {
        self.max_turns = max_turns;
        self
    }

    pub fn with_tool_timeout(mut self, timeout: Duration) -> Self {
        self.tool_timeout = timeout;
        self
    }

    pub fn with_provider_timeout(mut self, timeout: Duration) -> Self {
        self.provider_timeout = timeout;
        self
    }

    pub fn with_fragments(mut self, size: usize, delay: Duration) -> Self {
        self.fragment_size = size;
        self.fragment_delay = delay;
        self
    }
}

/// What a streamed reply produces. Every stream ends with exactly one `Done`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    Fragment(String),
    Error(String),
    Done,
}

/// Agent drives a provider through tool calls until it produces a final answer
pub struct Agent {
    provider: Box<dyn Provider>,
    registry: Arc<ToolRegistry>,
    tools: Vec<ToolSchema>,
    config: AgentConfig,
}

impl Agent {
    /// Create a new Agent offering every tool in the registry
    pub fn new(provider: Box<dyn Provider>, registry: Arc<ToolRegistry>) -> Self {
        let tools = generate_tool_schemas(&registry);
        Self {
            provider,
            registry,
            tools,
            config: AgentConfig::default(),
        }
    }

    pub fn with_config(mut self, config: AgentConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn provider(&self) -> &dyn Provider {
        self.provider.as_ref()
    }

    /// The schemas offered to the model on every turn
    pub fn tools(&self) -> &[ToolSchema] {
        &self.tools
    }

    /// Answer `user` and return the final text, or a prefixed error message in
    /// its place
    pub async fn chat(&self, system: &str, user: &str, history: &[Message]) -> String {
        match self.reply(system, user, history).await {
            Ok(text) => text,
            Err(e) => {
                error!(error = %e, "chat failed");
                format!("[Error during chat]: {}", e)
            }
        }
    }

    /// Run the conversation loop to a final answer
    pub async fn reply(&self, system: &str, user: &str, history: &[Message]) -> AgentResult<String> {
        let mut conversation = Conversation::new(system, history, user)?;
        self.resolve(&mut conversation).await
    }

    /// Answer `user` as a stream of fragments. Failures become a single
    /// `Error` event; the stream always ends with `Done`.
    pub fn chat_stream<'a>(
        &'a self,
        system: &'a str,
        user: &'a str,
        history: &'a [Message],
    ) -> BoxStream<'a, StreamEvent> {
        Box::pin(stream! {
            match Conversation::new(system, history, user) {
                Err(e) => {
                    yield streaming_error(e);
                }
                Ok(conversation) if self.tools.is_empty() && self.provider.supports_streaming() => {
                    match self.open_stream(conversation.messages()).await {
                        Ok(mut deltas) => {
                            while let Some(delta) = deltas.next().await {
                                match delta {
                                    Ok(text) if text.is_empty() => {}
                                    Ok(text) => {
                                        yield StreamEvent::Fragment(text);
                                    }
                                    Err(e) => {
                                        yield streaming_error(e.into());
                                        break;
                                    }
                                }
                            }
                        }
                        Err(e) => {
                            yield streaming_error(e);
                        }
                    }
                }
                Ok(mut conversation) => match self.resolve(&mut conversation).await {
                    Ok(text) => {
                        let pieces = fragments(&text, self.config.fragment_size);
                        let count = pieces.len();
                        for (index, piece) in pieces.into_iter().enumerate() {
                            yield StreamEvent::Fragment(piece);
                            if index + 1 < count && !self.config.fragment_delay.is_zero() {
                                tokio::time::sleep(self.config.fragment_delay).await;
                            }
                        }
                    }
                    Err(e) => {
                        yield streaming_error(e);
                    }
                },
            }
            yield StreamEvent::Done;
        })
    }

    fn offered_tools(&self) -> Option<&[ToolSchema]> {
        if self.tools.is_empty() {
            None
        } else {
            Some(&self.tools)
        }
    }

    async fn resolve(&self, conversation: &mut Conversation) -> AgentResult<String> {
        // at least one provider call, like fragment_size in `fragments`
        let max_turns = self.config.max_turns.max(1);
        for turn in 1..=max_turns {
            debug!(turn, messages = conversation.len(), "awaiting model");
            let response = self.complete(conversation.messages()).await?;
            let message = response.message;

            if !message.has_tool_calls() {
                debug!(turn, "model produced a final answer");
                return Ok(message.text().to_string());
            }

            if turn == max_turns {
                // no turn is left to read the results
                warn!(turn, calls = message.tool_calls.len(), "tool calls requested on the last turn");
                break;
            }

            let results = self.run_tool_calls(&message.tool_calls).await;
            conversation.push_tool_round(message, results)?;
        }

        Err(AgentError::ToolLoopExceeded(max_turns))
    }

    async fn complete(&self, messages: &[Message]) -> AgentResult<ProviderResponse> {
        let timeout = self.config.provider_timeout;
        tokio::time::timeout(timeout, self.provider.complete(messages, self.offered_tools()))
            .await
            .map_err(|_| ProviderError::Timeout(timeout))?
            .map_err(AgentError::from)
    }

    async fn open_stream(&self, messages: &[Message]) -> AgentResult<DeltaStream> {
        let timeout = self.config.provider_timeout;
        tokio::time::timeout(timeout, self.provider.stream(messages))
            .await
            .map_err(|_| ProviderError::Timeout(timeout))?
            .map_err(AgentError::from)
    }

    /// Run every requested call concurrently; results come back in request
    /// order as tool messages
    async fn run_tool_calls(&self, calls: &[ToolCallRequest]) -> Vec<Message> {
        let outputs = futures::future::join_all(calls.iter().map(|call| self.run_tool_call(call))).await;
        calls
            .iter()
            .zip(outputs)
            .map(|(call, output)| Message::tool(call.id.clone()).with_text(output))
            .collect()
    }

    async fn run_tool_call(&self, call: &ToolCallRequest) -> String {
        info!(tool = %call.name, id = %call.id, arguments = %call.arguments, "running tool");
        match self.dispatch_tool_call(call).await {
            Ok(output) => output,
            Err(e) => {
                warn!(tool = %call.name, id = %call.id, error = %e, "tool call failed");
                e.as_tool_output()
            }
        }
    }

    async fn dispatch_tool_call(&self, call: &ToolCallRequest) -> Result<String, ToolError> {
        let tool = self
            .registry
            .resolve(&call.name)
            .ok_or_else(|| ToolError::ToolNotFound(call.name.clone()))?;

        let arguments = if call.arguments.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&call.arguments).map_err(|e| {
                ToolError::invalid(&call.name, format!("arguments are not valid JSON: {}", e))
            })?
        };
        let args = tool.signature().bind(&call.name, arguments)?;

        let timeout = self.config.tool_timeout;
        tokio::time::timeout(timeout, tool.call(args))
            .await
            .map_err(|_| ToolError::Timeout {
                tool: call.name.clone(),
                timeout,
            })?
    }
}

fn streaming_error(e: AgentError) -> StreamEvent {
    error!(error = %e, "streaming chat failed");
    StreamEvent::Error(format!("[Error during streaming]: {}", e))
}

/// Split text into pieces of `size` characters; concatenating them gives the
/// text back
pub fn fragments(text: &str, size: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    chars
        .chunks(size.max(1))
        .map(|chunk| chunk.iter().collect())
        .collect()
}
