use super::{
    anthropic::AnthropicProvider,
    base::Provider,
    configs::{ProviderConfig, ProviderType},
    errors::ProviderResult,
    openai::OpenAiProvider,
};

pub fn get_provider(config: ProviderConfig) -> ProviderResult<Box<dyn Provider>> {
    match config.provider {
        ProviderType::Anthropic => Ok(Box::new(AnthropicProvider::new(config)?)),
        ProviderType::OpenAi
        | ProviderType::Google
        | ProviderType::Ollama
        | ProviderType::HuggingFace
        | ProviderType::Grok
        | ProviderType::Groq => Ok(Box::new(OpenAiProvider::new(config)?)),
    }
}
