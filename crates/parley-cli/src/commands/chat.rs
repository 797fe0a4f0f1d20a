use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use tracing::info;

use super::RetrievalArgs;
use crate::prompt::cliclack::CliclackPrompt;
use crate::session::Session;
use parley::agent::{Agent, AgentConfig};
use parley::prompt_template::{default_system_prompt, system_prompt_file};
use parley::providers::configs::{ProviderConfig, ProviderType};
use parley::providers::factory::get_provider;
use parley::tools::catalog::CatalogTools;
use parley::tools::retrieval::RetrievalTools;
use parley::tools::weather::DemoTools;
use parley::tools::{ToolRegistry, ToolSource};

#[derive(Args, Debug)]
pub struct ChatArgs {
    /// Provider to talk to (openai, anthropic, google, ollama, huggingface, grok, groq)
    #[arg(short, long, default_value = "openai")]
    pub provider: ProviderType,

    /// Model to use instead of the provider's default
    #[arg(short, long)]
    pub model: Option<String>,

    /// API key (defaults to the provider's environment variable)
    #[arg(long)]
    pub api_key: Option<String>,

    /// Base URL of the provider API
    #[arg(long)]
    pub host: Option<String>,

    #[arg(long)]
    pub temperature: Option<f32>,

    #[arg(long)]
    pub max_tokens: Option<u32>,

    /// Print the reply in fragments as it is produced
    #[arg(short, long)]
    pub stream: bool,

    /// Upper bound on model calls for one question
    #[arg(
        long,
        default_value_t = 10,
        value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..)
    )]
    pub max_turns: usize,

    /// JSON product catalog to use instead of the bundled one
    #[arg(long)]
    pub catalog: Option<PathBuf>,

    /// Tera template to use as the system prompt
    #[arg(long)]
    pub system_prompt: Option<PathBuf>,

    /// Offer the get_answer tool backed by the question/answer index
    #[arg(long)]
    pub retrieval: bool,

    #[command(flatten)]
    pub retrieval_args: RetrievalArgs,
}

impl ChatArgs {
    fn provider_config(&self) -> ProviderConfig {
        let mut config = ProviderConfig::new(self.provider);
        if let Some(model) = &self.model {
            config = config.with_model(model);
        }
        if let Some(api_key) = &self.api_key {
            config = config.with_api_key(api_key);
        }
        if let Some(host) = &self.host {
            config = config.with_base_url(host);
        }
        if let Some(temperature) = self.temperature {
            config = config.with_temperature(temperature);
        }
        if let Some(max_tokens) = self.max_tokens {
            config = config.with_max_tokens(max_tokens);
        }
        config
    }

    fn agent_config(&self) -> AgentConfig {
        // the terminal shows fragments right away
        AgentConfig::default()
            .with_max_turns(self.max_turns)
            .with_fragments(2, Duration::from_millis(15))
    }

    fn registry(&self) -> Result<ToolRegistry> {
        let catalog = match &self.catalog {
            Some(path) => CatalogTools::from_file(path.clone()),
            None => CatalogTools::builtin(),
        };
        let retrieval = self
            .retrieval
            .then(|| RetrievalTools::new(self.retrieval_args.to_config()));

        let mut sources: Vec<&dyn ToolSource> = vec![&DemoTools, &catalog];
        if let Some(retrieval) = &retrieval {
            sources.push(retrieval);
        }
        ToolRegistry::load(&sources).context("failed to load tools")
    }
}

pub async fn execute(args: ChatArgs) -> Result<()> {
    let registry = args.registry()?;
    let provider_config = args.provider_config();
    info!(
        provider = %provider_config.provider,
        model = %provider_config.model,
        tools = registry.len(),
        "starting chat"
    );

    let provider = get_provider(provider_config).context("failed to create provider")?;
    let agent = Agent::new(provider, Arc::new(registry)).with_config(args.agent_config());

    let system_prompt = match &args.system_prompt {
        Some(path) => system_prompt_file(path.clone(), agent.tools()),
        None => default_system_prompt(agent.tools()),
    }
    .context("failed to render system prompt")?;

    let mut session = Session::new(
        agent,
        Box::new(CliclackPrompt::new()),
        system_prompt,
        args.stream,
    );
    session.start().await
}
