use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use super::base::{DeltaStream, Provider, ProviderResponse, Usage};
use super::configs::{ProviderConfig, ProviderType};
use super::errors::{ProviderError, ProviderResult};
use crate::models::message::Message;
use crate::models::tool::ToolSchema;

/// One request the mock received
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub messages: Vec<Message>,
    /// `None` when the caller offered no tools
    pub tools: Option<Vec<String>>,
}

/// A mock provider that returns pre-configured responses for testing
pub struct MockProvider {
    config: ProviderConfig,
    responses: Arc<Mutex<VecDeque<ProviderResult<Message>>>>,
    fallback: Option<Message>,
    failure: Option<ProviderError>,
    deltas: Option<Vec<ProviderResult<String>>>,
    calls: Arc<Mutex<Vec<RecordedCall>>>,
}

impl MockProvider {
    /// Create a new mock provider with a sequence of responses
    pub fn new(responses: Vec<Message>) -> Self {
        Self::scripted(responses.into_iter().map(Ok).collect())
    }

    /// Responses that may include failures, returned in order
    pub fn scripted(responses: Vec<ProviderResult<Message>>) -> Self {
        Self {
            config: ProviderConfig::new(ProviderType::OpenAi).with_model("mock"),
            responses: Arc::new(Mutex::new(responses.into())),
            fallback: None,
            failure: None,
            deltas: None,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// A provider whose every call fails with `error`
    pub fn failing(error: ProviderError) -> Self {
        let mut provider = Self::scripted(Vec::new());
        provider.failure = Some(error);
        provider
    }

    /// Keep answering with `message` once the scripted responses run out
    pub fn repeating(mut self, message: Message) -> Self {
        self.fallback = Some(message);
        self
    }

    /// Advertise native streaming and yield these deltas from `stream`
    pub fn with_native_stream<I, S>(mut self, deltas: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.deltas = Some(deltas.into_iter().map(|delta| Ok(delta.into())).collect());
        self
    }

    /// End the native stream with `error` after the scripted deltas
    pub fn with_native_stream_error(mut self, error: ProviderError) -> Self {
        self.deltas.get_or_insert_with(Vec::new).push(Err(error));
        self
    }

    /// Every request made so far
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().map(|calls| calls.clone()).unwrap_or_default()
    }

    /// A handle that stays readable after the provider is moved into an agent
    pub fn call_log(&self) -> Arc<Mutex<Vec<RecordedCall>>> {
        Arc::clone(&self.calls)
    }

    fn record(&self, messages: &[Message], tools: Option<&[ToolSchema]>) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(RecordedCall {
                messages: messages.to_vec(),
                tools: tools.map(|tools| tools.iter().map(|t| t.name.clone()).collect()),
            });
        }
    }

    fn next_response(&self) -> ProviderResult<Message> {
        let scripted = self
            .responses
            .lock()
            .map_err(|e| ProviderError::Api(e.to_string()))?
            .pop_front();
        match (scripted, &self.failure, &self.fallback) {
            (Some(response), _, _) => response,
            (None, Some(error), _) => Err(error.clone()),
            (None, None, Some(message)) => Ok(message.clone()),
            (None, None, None) => Ok(Message::assistant().with_text("")),
        }
    }
}

#[async_trait]
impl Provider for MockProvider {
    fn config(&self) -> &ProviderConfig {
        &self.config
    }

    async fn complete(
        &self,
        messages: &[Message],
        tools: Option<&[ToolSchema]>,
    ) -> ProviderResult<ProviderResponse> {
        self.record(messages, tools);
        let message = self.next_response()?;
        Ok(ProviderResponse::new(message, Usage::default()))
    }

    fn supports_streaming(&self) -> bool {
        self.deltas.is_some()
    }

    async fn stream(&self, messages: &[Message]) -> ProviderResult<DeltaStream> {
        match &self.deltas {
            Some(deltas) => {
                self.record(messages, None);
                Ok(Box::pin(futures::stream::iter(deltas.clone())))
            }
            None => {
                let response = self.complete(messages, None).await?;
                let text = response.message.text().to_string();
                Ok(Box::pin(futures::stream::once(async move { Ok(text) })))
            }
        }
    }
}
