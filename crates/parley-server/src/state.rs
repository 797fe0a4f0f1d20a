use anyhow::{Context, Result};
use parley::agent::Agent;
use parley::prompt_template::{default_system_prompt, system_prompt_file};
use parley::providers::factory::get_provider;
use parley::tools::catalog::CatalogTools;
use parley::tools::retrieval::RetrievalTools;
use parley::tools::weather::DemoTools;
use parley::tools::{ToolRegistry, ToolSource};
use std::sync::Arc;
use tracing::info;

use crate::configuration::Settings;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub agent: Arc<Agent>,
    pub system_prompt: Arc<String>,
}

impl AppState {
    pub fn new(agent: Agent, system_prompt: impl Into<String>) -> Self {
        Self {
            agent: Arc::new(agent),
            system_prompt: Arc::new(system_prompt.into()),
        }
    }

    /// Load the tools, build the provider and render the system prompt.
    /// Any failure here stops the server from starting.
    pub fn from_settings(settings: Settings) -> Result<Self> {
        let catalog = match settings.catalog.products_file {
            Some(path) => CatalogTools::from_file(path),
            None => CatalogTools::builtin(),
        };
        let retrieval = settings.retrieval.map(RetrievalTools::new);

        let mut sources: Vec<&dyn ToolSource> = vec![&DemoTools, &catalog];
        if let Some(retrieval) = &retrieval {
            sources.push(retrieval);
        }
        let registry = ToolRegistry::load(&sources).context("failed to load tools")?;

        let provider_config = settings.provider.into_config();
        info!(
            provider = %provider_config.provider,
            model = %provider_config.model,
            tools = registry.len(),
            "building agent"
        );
        let provider = get_provider(provider_config).context("failed to create provider")?;
        let agent = Agent::new(provider, Arc::new(registry))
            .with_config(settings.agent.into_config());

        let system_prompt = match settings.prompt.system_prompt_file {
            Some(path) => system_prompt_file(path, agent.tools()),
            None => default_system_prompt(agent.tools()),
        }
        .context("failed to render system prompt")?;

        Ok(Self::new(agent, system_prompt))
    }
}
