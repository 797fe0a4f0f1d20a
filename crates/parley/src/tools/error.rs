use std::time::Duration;
use thiserror::Error;

use crate::providers::errors::describe_timeout;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ToolError {
    #[error("No implementation for {0}")]
    ToolNotFound(String),

    #[error("Invalid arguments for {tool}: {reason}")]
    InvalidParameters { tool: String, reason: String },

    #[error("Tool {tool} failed: {reason}")]
    ExecutionError { tool: String, reason: String },

    #[error("Tool {tool} timed out after {}", describe_timeout(.timeout))]
    Timeout { tool: String, timeout: Duration },

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type ToolResult<T> = Result<T, ToolError>;

impl ToolError {
    pub fn invalid<T: Into<String>, R: Into<String>>(tool: T, reason: R) -> Self {
        ToolError::InvalidParameters {
            tool: tool.into(),
            reason: reason.into(),
        }
    }

    pub fn execution<T: Into<String>, R: Into<String>>(tool: T, reason: R) -> Self {
        ToolError::ExecutionError {
            tool: tool.into(),
            reason: reason.into(),
        }
    }

    /// Render the error as the text handed back to the model in place of a result
    pub fn as_tool_output(&self) -> String {
        format!("[{}]", self)
    }
}
