//! These models represent the objects passed around by the agent
//!
//! There are several different related formats we need to interact with:
//! - chat history posted by the web client as role/content pairs
//! - openai-compatible messages/tools, sent from the agent to most providers
//! - anthropic messages/tools, which split the system prompt and tool results out
//! - tool invocations, sent from the agent to the tool registry
//!
//! The internal models follow the openai shape closely since that is what most
//! backends speak; provider adapters convert to and from them at the edge.
pub mod message;
pub mod role;
pub mod tool;
