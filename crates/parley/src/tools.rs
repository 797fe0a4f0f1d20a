//! Tools the model can call, and the registry that owns them.
//!
//! A tool declares its signature explicitly and is marked for registration by
//! wrapping it with [`register_tool`]. Tool sources group related tools and are
//! loaded once at startup by [`ToolRegistry::load`].
pub mod catalog;
pub mod error;
pub mod registry;
pub mod retrieval;
pub mod signature;
pub mod weather;

use async_trait::async_trait;
use std::sync::Arc;

pub use error::{ToolError, ToolResult};
pub use registry::ToolRegistry;
pub use signature::{Param, ParamType, ToolArgs, ToolSignature};

/// A named callable the model may request
#[async_trait]
pub trait ToolFunction: Send + Sync {
    /// The declared signature used for schema generation and argument binding
    fn signature(&self) -> &ToolSignature;

    /// Run the tool with arguments already bound to its signature
    async fn call(&self, args: ToolArgs) -> ToolResult<String>;
}

/// The registration marker: a tool plus an optional name override
#[derive(Clone)]
pub struct ToolRegistration {
    pub(crate) name: Option<String>,
    pub(crate) tool: Arc<dyn ToolFunction>,
}

impl ToolRegistration {
    /// Register the tool under a different name than its signature declares
    pub fn named<S: Into<String>>(mut self, name: S) -> Self {
        self.name = Some(name.into());
        self
    }

    /// The name the tool will be registered under
    pub fn name(&self) -> &str {
        self.name
            .as_deref()
            .unwrap_or_else(|| self.tool.signature().name.as_str())
    }
}

/// Mark a tool for registration under its declared name
pub fn register_tool<T: ToolFunction + 'static>(tool: T) -> ToolRegistration {
    ToolRegistration {
        name: None,
        tool: Arc::new(tool),
    }
}

/// A group of tool definitions loaded together at startup
pub trait ToolSource: Send + Sync {
    /// Name used in logs and load errors
    fn name(&self) -> &str;

    /// Build the tools this source provides. A failure here aborts startup.
    fn tools(&self) -> ToolResult<Vec<ToolRegistration>>;
}
