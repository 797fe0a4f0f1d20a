use crate::error::{to_env_var, ConfigError};
use config::{Config, Environment};
use parley::agent::AgentConfig;
use parley::providers::configs::{ProviderConfig, ProviderType};
use parley::tools::retrieval::RetrievalConfig;
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Default, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl ServerSettings {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e: std::net::AddrParseError| ConfigError::InvalidValue {
                field: "server.host".to_string(),
                reason: e.to_string(),
            })
    }
}

/// Which backend to talk to. Unset fields take the backend's defaults.
#[derive(Debug, Deserialize)]
pub struct ProviderSettings {
    #[serde(rename = "type")]
    pub provider_type: ProviderType,
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl ProviderSettings {
    pub fn into_config(self) -> ProviderConfig {
        let mut config = ProviderConfig::new(self.provider_type);
        if let Some(host) = self.host {
            config = config.with_base_url(host);
        }
        if let Some(api_key) = self.api_key {
            config = config.with_api_key(api_key);
        }
        if let Some(model) = self.model {
            config = config.with_model(model);
        }
        if let Some(temperature) = self.temperature {
            config = config.with_temperature(temperature);
        }
        if let Some(max_tokens) = self.max_tokens {
            config = config.with_max_tokens(max_tokens);
        }
        if let Some(secs) = self.timeout_secs {
            config = config.with_timeout(Duration::from_secs(secs));
        }
        config
    }
}

#[derive(Debug, Deserialize)]
pub struct AgentSettings {
    #[serde(default = "default_max_turns")]
    pub max_turns: usize,
    #[serde(default = "default_tool_timeout_secs")]
    pub tool_timeout_secs: u64,
    #[serde(default = "default_provider_timeout_secs")]
    pub provider_timeout_secs: u64,
    #[serde(default = "default_fragment_size")]
    pub fragment_size: usize,
    #[serde(default = "default_fragment_delay_ms")]
    pub fragment_delay_ms: u64,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            max_turns: default_max_turns(),
            tool_timeout_secs: default_tool_timeout_secs(),
            provider_timeout_secs: default_provider_timeout_secs(),
            fragment_size: default_fragment_size(),
            fragment_delay_ms: default_fragment_delay_ms(),
        }
    }
}

impl AgentSettings {
    pub fn into_config(self) -> AgentConfig {
        AgentConfig::default()
            .with_max_turns(self.max_turns)
            .with_tool_timeout(Duration::from_secs(self.tool_timeout_secs))
            .with_provider_timeout(Duration::from_secs(self.provider_timeout_secs))
            .with_fragments(
                self.fragment_size,
                Duration::from_millis(self.fragment_delay_ms),
            )
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct CatalogSettings {
    /// JSON catalog to serve instead of the bundled one
    #[serde(default)]
    pub products_file: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PromptSettings {
    /// Tera template rendered with the offered tools
    #[serde(default)]
    pub system_prompt_file: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerSettings,
    pub provider: ProviderSettings,
    #[serde(default)]
    pub agent: AgentSettings,
    #[serde(default)]
    pub catalog: CatalogSettings,
    /// The `get_answer` tool is only offered when this section is present
    #[serde(default)]
    pub retrieval: Option<RetrievalConfig>,
    #[serde(default)]
    pub prompt: PromptSettings,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        Self::load_and_validate()
    }

    fn load_and_validate() -> Result<Self, ConfigError> {
        let config = Config::builder()
            .set_default("server.host", default_host())?
            .set_default("server.port", default_port())?
            .set_default("provider.type", "openai")?
            .add_source(
                Environment::with_prefix("PARLEY")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let result: Result<Self, config::ConfigError> = config.try_deserialize();

        match result {
            Ok(settings) => settings.validate(),
            Err(err) => {
                tracing::debug!("Configuration error: {:?}", &err);

                // "missing field `collection`" and NotFound both name the key to set
                let error_str = err.to_string();
                if error_str.starts_with("missing field") {
                    let field = error_str
                        .trim_start_matches("missing field `")
                        .split('`')
                        .next()
                        .unwrap_or_default();
                    Err(ConfigError::MissingEnvVar {
                        env_var: to_env_var(field),
                    })
                } else if let config::ConfigError::NotFound(field) = &err {
                    Err(ConfigError::MissingEnvVar {
                        env_var: to_env_var(field),
                    })
                } else {
                    Err(ConfigError::Other(err))
                }
            }
        }
    }
}

impl Settings {
    fn validate(self) -> Result<Self, ConfigError> {
        if self.agent.max_turns == 0 {
            return Err(ConfigError::InvalidValue {
                field: "agent.max_turns".to_string(),
                reason: "at least one model turn is needed".to_string(),
            });
        }
        Ok(self)
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    5557
}

fn default_max_turns() -> usize {
    10
}

fn default_tool_timeout_secs() -> u64 {
    30
}

fn default_provider_timeout_secs() -> u64 {
    600
}

fn default_fragment_size() -> usize {
    2
}

fn default_fragment_delay_ms() -> u64 {
    30
}
