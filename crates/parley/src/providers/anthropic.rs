use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde_json::{json, Value};
use tracing::debug;

use super::base::{DeltaStream, Provider, ProviderResponse, Usage};
use super::configs::ProviderConfig;
use super::errors::{ProviderError, ProviderResult};
use super::stream::{anthropic_deltas, sse_data};
use super::utils::split_system;
use crate::models::message::Message;
use crate::models::role::Role;
use crate::models::tool::{ToolCallRequest, ToolSchema};

pub const ANTHROPIC_VERSION: &str = "2023-06-01";

pub struct AnthropicProvider {
    client: Client,
    config: ProviderConfig,
    api_key: String,
}

impl AnthropicProvider {
    pub fn new(config: ProviderConfig) -> ProviderResult<Self> {
        let api_key = config
            .resolve_api_key()?
            .ok_or_else(|| ProviderError::MissingApiKey("ANTHROPIC_API_KEY".to_string()))?;
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ProviderError::InvalidConfig(e.to_string()))?;

        Ok(Self {
            client,
            config,
            api_key,
        })
    }

    fn get_usage(data: &Value) -> Usage {
        let usage = &data["usage"];
        let input_tokens = usage["input_tokens"].as_i64().map(|v| v as i32);
        let output_tokens = usage["output_tokens"].as_i64().map(|v| v as i32);
        let total_tokens = match (input_tokens, output_tokens) {
            (Some(input), Some(output)) => Some(input + output),
            _ => None,
        };
        Usage::new(input_tokens, output_tokens, total_tokens)
    }

    /// Anthropic takes tool calls and results as content blocks, and wants
    /// every result for one assistant turn inside a single user message
    fn messages_to_anthropic_spec(messages: &[&Message]) -> Vec<Value> {
        let mut anthropic_messages: Vec<Value> = Vec::new();

        for message in messages {
            match message.role {
                Role::Tool => {
                    let block = json!({
                        "type": "tool_result",
                        "tool_use_id": message.tool_call_id.clone().unwrap_or_default(),
                        "content": message.text(),
                    });
                    let merged = anthropic_messages.last_mut().and_then(|last| {
                        let is_results = last["role"] == "user"
                            && last["content"][0]["type"] == "tool_result";
                        if is_results {
                            last["content"].as_array_mut()
                        } else {
                            None
                        }
                    });
                    match merged {
                        Some(blocks) => blocks.push(block),
                        None => anthropic_messages.push(json!({
                            "role": "user",
                            "content": [block],
                        })),
                    }
                }
                Role::Assistant if message.has_tool_calls() => {
                    let mut blocks = Vec::new();
                    if !message.text().is_empty() {
                        blocks.push(json!({"type": "text", "text": message.text()}));
                    }
                    for call in &message.tool_calls {
                        let input = serde_json::from_str::<Value>(&call.arguments)
                            .ok()
                            .filter(Value::is_object)
                            .unwrap_or_else(|| json!({}));
                        blocks.push(json!({
                            "type": "tool_use",
                            "id": call.id,
                            "name": call.name,
                            "input": input,
                        }));
                    }
                    anthropic_messages.push(json!({"role": "assistant", "content": blocks}));
                }
                role => anthropic_messages.push(json!({
                    "role": role,
                    "content": message.text(),
                })),
            }
        }

        anthropic_messages
    }

    fn tools_to_anthropic_spec(tools: &[ToolSchema]) -> Vec<Value> {
        tools
            .iter()
            .map(|tool| {
                json!({
                    "name": tool.name,
                    "description": tool.description,
                    "input_schema": tool.input_schema(),
                })
            })
            .collect()
    }

    fn response_to_message(response: &Value) -> ProviderResult<Message> {
        let blocks = response["content"].as_array().ok_or_else(|| {
            ProviderError::MalformedResponse(format!("no content in response: {}", response))
        })?;

        let mut text = String::new();
        let mut message = Message::assistant();
        for block in blocks {
            match block["type"].as_str() {
                Some("text") => text.push_str(block["text"].as_str().unwrap_or_default()),
                Some("tool_use") => {
                    let id = block["id"].as_str().unwrap_or_default();
                    let name = block["name"].as_str().ok_or_else(|| {
                        ProviderError::MalformedResponse("tool_use block without a name".into())
                    })?;
                    message = message.with_tool_call(ToolCallRequest::new(
                        id,
                        name,
                        block["input"].to_string(),
                    ));
                }
                _ => {}
            }
        }

        if !text.is_empty() || !message.has_tool_calls() {
            message = message.with_text(text);
        }
        Ok(message)
    }

    fn payload(&self, messages: &[Message], tools: Option<&[ToolSchema]>) -> Value {
        let (system, rest) = split_system(messages);
        let mut payload = json!({
            "model": self.config.model,
            "messages": Self::messages_to_anthropic_spec(&rest),
            "max_tokens": self.config.max_tokens,
            "temperature": self.config.temperature,
        });
        if let Some(object) = payload.as_object_mut() {
            if let Some(system) = system {
                object.insert("system".to_string(), json!(system));
            }
            if let Some(tools) = tools.filter(|tools| !tools.is_empty()) {
                object.insert("tools".to_string(), json!(Self::tools_to_anthropic_spec(tools)));
            }
        }
        payload
    }

    async fn post(&self, payload: &Value) -> ProviderResult<Response> {
        let url = format!("{}/v1/messages", self.config.host());

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(payload)
            .send()
            .await
            .map_err(|e| match ProviderError::from(e) {
                ProviderError::Timeout(_) => ProviderError::Timeout(self.config.timeout),
                other => other,
            })?;

        match response.status() {
            StatusCode::OK => Ok(response),
            status => {
                let body = response.text().await.unwrap_or_default();
                if status == StatusCode::BAD_REQUEST && body.contains("prompt is too long") {
                    return Err(ProviderError::ContextLengthExceeded(body));
                }
                Err(ProviderError::from_status(status, body))
            }
        }
    }
}

#[async_trait]
impl Provider for AnthropicProvider {
    fn config(&self) -> &ProviderConfig {
        &self.config
    }

    async fn complete(
        &self,
        messages: &[Message],
        tools: Option<&[ToolSchema]>,
    ) -> ProviderResult<ProviderResponse> {
        let payload = self.payload(messages, tools);
        debug!(model = %self.config.model, messages = messages.len(), "requesting message");

        let response: Value = self.post(&payload).await?.json().await?;
        if response["type"] == "error" {
            return Err(ProviderError::Api(response["error"].to_string()));
        }

        let message = Self::response_to_message(&response)?;
        Ok(ProviderResponse::new(message, Self::get_usage(&response)))
    }

    fn supports_streaming(&self) -> bool {
        true
    }

    async fn stream(&self, messages: &[Message]) -> ProviderResult<DeltaStream> {
        let mut payload = self.payload(messages, None);
        payload["stream"] = json!(true);
        debug!(model = %self.config.model, messages = messages.len(), "requesting streamed message");

        let response = self.post(&payload).await?;
        Ok(anthropic_deltas(sse_data(response.bytes_stream())))
    }
}
