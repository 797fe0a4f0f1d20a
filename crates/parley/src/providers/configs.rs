use serde::{Deserialize, Serialize};
use std::time::Duration;
use strum_macros::{AsRefStr, Display, EnumIter, EnumString};

use super::errors::{ProviderError, ProviderResult};

pub const DEFAULT_TEMPERATURE: f32 = 0.6;
pub const DEFAULT_MAX_TOKENS: u32 = 1500;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(600);

/// The LLM backends a provider can be built for
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum ProviderType {
    OpenAi,
    Anthropic,
    Google,
    Ollama,
    HuggingFace,
    Grok,
    Groq,
}

impl ProviderType {
    /// Base URL including the API version prefix
    pub fn default_host(&self) -> &'static str {
        match self {
            ProviderType::OpenAi => "https://api.openai.com/v1",
            ProviderType::Anthropic => "https://api.anthropic.com",
            ProviderType::Google => "https://generativelanguage.googleapis.com/v1beta/openai",
            ProviderType::Ollama => "http://localhost:11434/v1",
            ProviderType::HuggingFace => "https://router.huggingface.co/v1",
            ProviderType::Grok => "https://api.x.ai/v1",
            ProviderType::Groq => "https://api.groq.com/openai/v1",
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            ProviderType::OpenAi => "gpt-4.1",
            ProviderType::Anthropic => "claude-3-7-sonnet-20250219",
            ProviderType::Google => "gemini-2.5-pro-exp-03-25",
            ProviderType::Ollama => "llama3:70b",
            ProviderType::HuggingFace => "meta-llama/Llama-4-Scout-17B-16E-Instruct",
            ProviderType::Grok => "grok-3-fast-latest",
            ProviderType::Groq => "llama-3.3-70b-versatile",
        }
    }

    /// Environment variable holding the API key, if the backend needs one
    pub fn api_key_env(&self) -> Option<&'static str> {
        match self {
            ProviderType::OpenAi => Some("OPENAI_API_KEY"),
            ProviderType::Anthropic => Some("ANTHROPIC_API_KEY"),
            ProviderType::Google => Some("GEMINI_API_KEY"),
            ProviderType::Ollama => None,
            ProviderType::HuggingFace => Some("HUGGINGFACE_API_KEY"),
            ProviderType::Grok => Some("XAI_API_KEY"),
            ProviderType::Groq => Some("GROQ_API_KEY"),
        }
    }
}

/// Construction parameters for one provider adapter. Immutable once the
/// adapter is built.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderConfig {
    pub provider: ProviderType,
    pub model: String,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout: Duration,
}

impl ProviderConfig {
    pub fn new(provider: ProviderType) -> Self {
        Self {
            provider,
            model: provider.default_model().to_string(),
            api_key: None,
            base_url: None,
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_model<S: Into<String>>(mut self, model: S) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_api_key<S: Into<String>>(mut self, api_key: S) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_base_url<S: Into<String>>(mut self, base_url: S) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// The base URL override, or the provider's default, without a trailing slash
    pub fn host(&self) -> &str {
        self.base_url
            .as_deref()
            .unwrap_or_else(|| self.provider.default_host())
            .trim_end_matches('/')
    }

    /// The explicit key if set, otherwise the provider's environment variable.
    /// Backends that need a key fail when neither is present.
    pub fn resolve_api_key(&self) -> ProviderResult<Option<String>> {
        if let Some(key) = self.api_key.as_ref().filter(|k| !k.is_empty()) {
            return Ok(Some(key.clone()));
        }
        match self.provider.api_key_env() {
            None => Ok(None),
            Some(var) => std::env::var(var)
                .ok()
                .filter(|k| !k.is_empty())
                .map(Some)
                .ok_or_else(|| ProviderError::MissingApiKey(var.to_string())),
        }
    }
}
