use super::role::Role;
use super::tool::ToolCallRequest;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// A message to or from an LLM
pub struct Message {
    pub role: Role,
    /// Text content; absent on assistant messages that only carry tool calls
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCallRequest>,
    /// The request this message answers, set only on tool messages
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl Message {
    fn with_role(role: Role) -> Self {
        Message {
            role,
            content: None,
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    /// Create a new system message
    pub fn system() -> Self {
        Self::with_role(Role::System)
    }

    /// Create a new user message
    pub fn user() -> Self {
        Self::with_role(Role::User)
    }

    /// Create a new assistant message
    pub fn assistant() -> Self {
        Self::with_role(Role::Assistant)
    }

    /// Create a new tool message answering the request with the given id
    pub fn tool<S: Into<String>>(tool_call_id: S) -> Self {
        let mut message = Self::with_role(Role::Tool);
        message.tool_call_id = Some(tool_call_id.into());
        message
    }

    /// Set the text content of the message
    pub fn with_text<S: Into<String>>(mut self, text: S) -> Self {
        self.content = Some(text.into());
        self
    }

    /// Add a tool call request to the message
    pub fn with_tool_call(mut self, request: ToolCallRequest) -> Self {
        self.tool_calls.push(request);
        self
    }

    /// Get the text content, treating a missing body as empty
    pub fn text(&self) -> &str {
        self.content.as_deref().unwrap_or_default()
    }

    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}
