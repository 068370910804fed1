use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Message role in LLM conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
    Tool,
}

/// Tool invocation requested by the model: a function name plus parsed arguments.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    pub arguments: HashMap<String, serde_json::Value>,
}

/// Message in LLM conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmMessage {
    #[serde(default = "default_role")]
    pub role: MessageRole,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCallRequest>>,
}

fn default_role() -> MessageRole {
    MessageRole::User
}

impl LlmMessage {
    /// Create a user message
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: Some(content.into()),
            tool_calls: None,
        }
    }

    /// Create a system message
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: Some(content.into()),
            tool_calls: None,
        }
    }

    /// Create an assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: Some(content.into()),
            tool_calls: None,
        }
    }

    /// Create an assistant message carrying a tool invocation request
    pub fn assistant_tool_call(call: ToolCallRequest) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: None,
            tool_calls: Some(vec![call]),
        }
    }

    /// Create a tool-result message answering a previous invocation
    pub fn tool_result(call: ToolCallRequest, content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Tool,
            content: Some(content.into()),
            tool_calls: Some(vec![call]),
        }
    }
}

/// Outcome of one model call: either free-text content or a request to invoke a tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ModelResult {
    TextReply { content: String },
    ToolInvocation { call: ToolCallRequest },
}

impl ModelResult {
    pub fn text(content: impl Into<String>) -> Self {
        ModelResult::TextReply {
            content: content.into(),
        }
    }

    pub fn tool(call: ToolCallRequest) -> Self {
        ModelResult::ToolInvocation { call }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_message_role_serialization() {
        assert_eq!(serde_json::to_string(&MessageRole::System).unwrap(), "\"system\"");
        assert_eq!(serde_json::to_string(&MessageRole::User).unwrap(), "\"user\"");
        assert_eq!(serde_json::to_string(&MessageRole::Assistant).unwrap(), "\"assistant\"");
        assert_eq!(serde_json::to_string(&MessageRole::Tool).unwrap(), "\"tool\"");
    }

    #[test]
    fn test_user_message() {
        let msg = LlmMessage::user("Hello");
        assert_eq!(msg.role, MessageRole::User);
        assert_eq!(msg.content, Some("Hello".to_string()));
        assert!(msg.tool_calls.is_none());
    }

    #[test]
    fn test_system_message() {
        let msg = LlmMessage::system("You are a helpful assistant");
        assert_eq!(msg.role, MessageRole::System);
        assert_eq!(msg.content, Some("You are a helpful assistant".to_string()));
    }

    #[test]
    fn test_assistant_tool_call_message() {
        let call = ToolCallRequest {
            id: Some("call_1".to_string()),
            name: "calculator".to_string(),
            arguments: HashMap::from([("num1".to_string(), json!(2))]),
        };

        let msg = LlmMessage::assistant_tool_call(call);
        assert_eq!(msg.role, MessageRole::Assistant);
        assert!(msg.content.is_none());
        assert_eq!(msg.tool_calls.as_ref().unwrap()[0].name, "calculator");
    }

    #[test]
    fn test_tool_result_message() {
        let call = ToolCallRequest {
            id: None,
            name: "calculator".to_string(),
            arguments: HashMap::new(),
        };

        let msg = LlmMessage::tool_result(call, "7");
        assert_eq!(msg.role, MessageRole::Tool);
        assert_eq!(msg.content, Some("7".to_string()));
    }

    #[test]
    fn test_model_result_variants() {
        let text = ModelResult::text("hello");
        match text {
            ModelResult::TextReply { content } => assert_eq!(content, "hello"),
            ModelResult::ToolInvocation { .. } => panic!("Expected TextReply"),
        }

        let call = ToolCallRequest {
            id: None,
            name: "calculator".to_string(),
            arguments: HashMap::new(),
        };
        let invocation = ModelResult::tool(call);
        match invocation {
            ModelResult::ToolInvocation { call } => assert_eq!(call.name, "calculator"),
            ModelResult::TextReply { .. } => panic!("Expected ToolInvocation"),
        }
    }

    #[test]
    fn test_model_result_serialization() {
        let json = serde_json::to_value(ModelResult::text("hi")).unwrap();
        assert_eq!(json["type"], "text_reply");
        assert_eq!(json["content"], "hi");
    }
}
