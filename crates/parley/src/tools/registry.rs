use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

use super::error::{ToolError, ToolResult};
use super::{ToolFunction, ToolRegistration, ToolSource};

/// Mapping from tool name to implementation.
///
/// Built once at startup and then shared read-only behind an `Arc`.
/// Enumeration is ordered by name so schema generation is reproducible.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<dyn ToolFunction>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every source in order. The first source that fails to build its
    /// tools aborts the whole load.
    pub fn load(sources: &[&dyn ToolSource]) -> ToolResult<Self> {
        let mut registry = Self::new();
        for source in sources {
            let tools = source.tools().map_err(|e| {
                ToolError::Internal(format!("failed to load tool source '{}': {}", source.name(), e))
            })?;
            info!(source = source.name(), count = tools.len(), "loaded tool source");
            for registration in tools {
                registry.add(registration);
            }
        }
        Ok(registry)
    }

    /// Add a marked tool. A later registration under the same name replaces
    /// the earlier one.
    pub fn add(&mut self, registration: ToolRegistration) -> &mut Self {
        let name = registration.name().to_string();
        self.register(name, registration.tool)
    }

    pub fn register<S: Into<String>>(&mut self, name: S, tool: Arc<dyn ToolFunction>) -> &mut Self {
        let name = name.into();
        if self.tools.insert(name.clone(), tool).is_some() {
            debug!(tool = %name, "replaced existing tool registration");
        }
        self
    }

    pub fn resolve(&self, name: &str) -> Option<&Arc<dyn ToolFunction>> {
        self.tools.get(name)
    }

    pub fn all(&self) -> impl Iterator<Item = (&str, &Arc<dyn ToolFunction>)> {
        self.tools.iter().map(|(name, tool)| (name.as_str(), tool))
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.names())
            .finish()
    }
}
