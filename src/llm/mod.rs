//! LLM integration: message model, gateway seam, tools, and the chat agent.

pub mod agent;
pub mod gateway;
pub mod gateways;
pub mod models;
pub mod tools;

pub use agent::{ChatAgent, Conversation};
pub use gateway::{CompletionConfig, LlmGateway};
pub use models::{LlmMessage, MessageRole, ModelResult, ToolCallRequest};
