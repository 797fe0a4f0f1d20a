use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};

use super::configs::ProviderConfig;
use super::errors::ProviderResult;
use crate::models::message::Message;
use crate::models::tool::ToolSchema;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: Option<i32>,
    pub output_tokens: Option<i32>,
    pub total_tokens: Option<i32>,
}

impl Usage {
    pub fn new(
        input_tokens: Option<i32>,
        output_tokens: Option<i32>,
        total_tokens: Option<i32>,
    ) -> Self {
        Self {
            input_tokens,
            output_tokens,
            total_tokens,
        }
    }
}

/// One model turn: either final assistant text, or an assistant message
/// carrying one or more tool call requests
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderResponse {
    pub message: Message,
    pub usage: Usage,
}

impl ProviderResponse {
    pub fn new(message: Message, usage: Usage) -> Self {
        Self { message, usage }
    }
}

/// Text deltas from a natively streamed completion
pub type DeltaStream = BoxStream<'static, ProviderResult<String>>;

/// Base trait for LLM providers (OpenAI, Anthropic, etc)
#[async_trait]
pub trait Provider: Send + Sync {
    /// The configuration this adapter was built from
    fn config(&self) -> &ProviderConfig;

    /// Generate the next assistant message. `tools` is `None` when no tools
    /// should be offered; adapters then leave the tools field out entirely.
    async fn complete(
        &self,
        messages: &[Message],
        tools: Option<&[ToolSchema]>,
    ) -> ProviderResult<ProviderResponse>;

    /// Whether [`Provider::stream`] yields true incremental deltas
    fn supports_streaming(&self) -> bool {
        false
    }

    /// Stream the text of a tool-free completion as it is generated.
    ///
    /// The default runs a blocking completion and yields its text once.
    async fn stream(&self, messages: &[Message]) -> ProviderResult<DeltaStream> {
        let response = self.complete(messages, None).await?;
        let text = response.message.text().to_string();
        Ok(Box::pin(futures::stream::once(async move { Ok(text) })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_usage_creation() {
        let usage = Usage::new(Some(10), Some(20), Some(30));
        assert_eq!(usage.input_tokens, Some(10));
        assert_eq!(usage.output_tokens, Some(20));
        assert_eq!(usage.total_tokens, Some(30));
    }

    #[test]
    fn test_usage_serialization() -> anyhow::Result<()> {
        let usage = Usage::new(Some(10), Some(20), Some(30));
        let serialized = serde_json::to_string(&usage)?;
        let deserialized: Usage = serde_json::from_str(&serialized)?;
        assert_eq!(usage, deserialized);

        let json_value: serde_json::Value = serde_json::from_str(&serialized)?;
        assert_eq!(json_value["input_tokens"], json!(10));
        assert_eq!(json_value["total_tokens"], json!(30));
        Ok(())
    }
}
