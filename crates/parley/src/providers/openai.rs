use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde_json::{json, Value};
use tracing::debug;

use super::base::{DeltaStream, Provider, ProviderResponse};
use super::configs::ProviderConfig;
use super::errors::{ProviderError, ProviderResult};
use super::stream::{openai_deltas, sse_data};
use super::utils::{
    check_openai_context_length_error, get_openai_usage, messages_to_openai_spec,
    openai_response_to_message, tools_to_openai_spec,
};
use crate::models::message::Message;
use crate::models::tool::ToolSchema;

/// Adapter for the OpenAI chat completions API and the compatible endpoints
/// of Google, Ollama, Hugging Face, xAI and Groq
pub struct OpenAiProvider {
    client: Client,
    config: ProviderConfig,
    api_key: Option<String>,
}

impl OpenAiProvider {
    pub fn new(config: ProviderConfig) -> ProviderResult<Self> {
        let api_key = config.resolve_api_key()?;
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

    fn request(&self) -> RequestBuilder {
        let url = format!("{}/chat/completions", self.config.host());
        let request = self.client.post(url);
        match &self.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }

    fn payload(&self, messages: &[Message], tools: Option<&[ToolSchema]>) -> ProviderResult<Value> {
        let mut payload = json!({
            "model": self.config.model,
            "messages": messages_to_openai_spec(messages),
            "temperature": self.config.temperature,
            "max_tokens": self.config.max_tokens,
        });

        if let Some(tools) = tools.filter(|tools| !tools.is_empty()) {
            if let Some(object) = payload.as_object_mut() {
                object.insert("tools".to_string(), json!(tools_to_openai_spec(tools)?));
            }
        }

        Ok(payload)
    }

    async fn post(&self, payload: &Value) -> ProviderResult<Response> {
        let response = self.request().json(payload).send().await.map_err(|e| {
            match ProviderError::from(e) {
                ProviderError::Timeout(_) => ProviderError::Timeout(self.config.timeout),
                other => other,
            }
        })?;

        match response.status() {
            StatusCode::OK => Ok(response),
            status => {
                let body = response.text().await.unwrap_or_default();
                if let Some(err) = serde_json::from_str::<Value>(&body)
                    .ok()
                    .and_then(|v| check_openai_context_length_error(&v["error"]))
                {
                    return Err(err);
                }
                Err(ProviderError::from_status(status, body))
            }
        }
    }
}

#[async_trait]
impl Provider for OpenAiProvider {
    fn config(&self) -> &ProviderConfig {
        &self.config
    }

    async fn complete(
        &self,
        messages: &[Message],
        tools: Option<&[ToolSchema]>,
    ) -> ProviderResult<ProviderResponse> {
        let payload = self.payload(messages, tools)?;
        debug!(model = %self.config.model, messages = messages.len(), "requesting completion");

        let response: Value = self.post(&payload).await?.json().await?;

        if let Some(error) = response.get("error") {
            if let Some(err) = check_openai_context_length_error(error) {
                return Err(err);
            }
            return Err(ProviderError::Api(error.to_string()));
        }

        let message = openai_response_to_message(&response)?;
        Ok(ProviderResponse::new(message, get_openai_usage(&response)))
    }

    fn supports_streaming(&self) -> bool {
        true
    }

    async fn stream(&self, messages: &[Message]) -> ProviderResult<DeltaStream> {
        let mut payload = self.payload(messages, None)?;
        payload["stream"] = json!(true);
        debug!(model = %self.config.model, messages = messages.len(), "requesting streamed completion");

        let response = self.post(&payload).await?;
        Ok(openai_deltas(sse_data(response.bytes_stream())))
    }
}
