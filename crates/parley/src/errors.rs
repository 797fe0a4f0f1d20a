use thiserror::Error;

use crate::providers::errors::ProviderError;

/// Failures that end a conversation loop. Tool problems are not listed here:
/// they are reported back to the model as tool results instead.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AgentError {
    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("Tool loop exceeded {0} turns without a final answer")]
    ToolLoopExceeded(usize),

    #[error("Protocol error: {0}")]
    Protocol(String),
}

pub type AgentResult<T> = Result<T, AgentError>;
