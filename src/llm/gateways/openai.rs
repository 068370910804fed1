//! OpenAI-compatible gateway for model calls.
//!
//! Speaks the chat-completions wire format over HTTP, including function-calling
//! declarations, and maps the response onto [`ModelResult`].

use crate::error::{FlowtraceError, Result};
use crate::llm::gateway::{CompletionConfig, LlmGateway};
use crate::llm::models::{LlmMessage, MessageRole, ModelResult, ToolCallRequest};
use crate::llm::tools::ToolDescriptor;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use std::collections::HashMap;
use tracing::debug;

/// Configuration for connecting to an OpenAI-compatible API.
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub api_key: String,
    pub base_url: String,
    pub timeout: Option<std::time::Duration>,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: "https://api.openai.com/v1".to_string(),
            timeout: None,
        }
    }
}

impl OpenAiConfig {
    /// Read `OPENAI_API_KEY` and optionally `OPENAI_API_ENDPOINT` from the environment.
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| FlowtraceError::Config("OPENAI_API_KEY is not set".to_string()))?;
        let base_url = std::env::var("OPENAI_API_ENDPOINT")
            .unwrap_or_else(|_| "https://api.openai.com/v1".to_string());

        Ok(Self {
            api_key,
            base_url,
            timeout: None,
        })
    }
}

/// Gateway for OpenAI-compatible LLM services.
pub struct OpenAiGateway {
    client: Client,
    config: OpenAiConfig,
}

impl OpenAiGateway {
    pub fn new(config: OpenAiConfig) -> Result<Self> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build()?;

        Ok(Self { client, config })
    }

    pub fn with_api_key(api_key: impl Into<String>) -> Result<Self> {
        Self::new(OpenAiConfig {
            api_key: api_key.into(),
            ..Default::default()
        })
    }

    pub fn with_api_key_and_base_url(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Result<Self> {
        Self::new(OpenAiConfig {
            api_key: api_key.into(),
            base_url: base_url.into(),
            ..Default::default()
        })
    }

    fn adapt_message(message: &LlmMessage) -> Value {
        let role = match message.role {
            MessageRole::System => "system",
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
            MessageRole::Tool => "tool",
        };

        let mut adapted = json!({ "role": role });
        if let Some(content) = &message.content {
            adapted["content"] = json!(content);
        }

        if let Some(calls) = &message.tool_calls {
            match message.role {
                MessageRole::Assistant => {
                    let wire_calls: Vec<Value> = calls
                        .iter()
                        .map(|call| {
                            json!({
                                "id": call.id.clone().unwrap_or_else(|| call.name.clone()),
                                "type": "function",
                                "function": {
                                    "name": call.name,
                                    "arguments": serde_json::to_string(&call.arguments)
                                        .unwrap_or_else(|_| "{}".to_string()),
                                }
                            })
                        })
                        .collect();
                    adapted["tool_calls"] = json!(wire_calls);
                }
                MessageRole::Tool => {
                    if let Some(call) = calls.first() {
                        adapted["tool_call_id"] =
                            json!(call.id.clone().unwrap_or_else(|| call.name.clone()));
                    }
                }
                _ => {}
            }
        }

        adapted
    }

    fn build_request_body(
        &self,
        model: &str,
        messages: &[LlmMessage],
        tools: &[ToolDescriptor],
        config: &CompletionConfig,
    ) -> Result<Value> {
        let mut body = json!({
            "model": model,
            "messages": messages.iter().map(Self::adapt_message).collect::<Vec<_>>(),
            "temperature": config.temperature,
            "max_tokens": config.max_tokens,
        });

        if !tools.is_empty() {
            body["tools"] = serde_json::to_value(tools)?;
        }
        if let Some(top_p) = config.top_p {
            body["top_p"] = json!(top_p);
        }
        if let Some(stop) = &config.stop {
            body["stop"] = json!(stop);
        }
        if let Some(presence_penalty) = config.presence_penalty {
            body["presence_penalty"] = json!(presence_penalty);
        }
        if let Some(frequency_penalty) = config.frequency_penalty {
            body["frequency_penalty"] = json!(frequency_penalty);
        }
        if let Some(seed) = config.seed {
            body["seed"] = json!(seed);
        }

        Ok(body)
    }

    fn parse_response(body: Value) -> Result<ModelResult> {
        let message = body
            .get("choices")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("message"))
            .ok_or_else(|| {
                FlowtraceError::Gateway("response contains no message choice".to_string())
            })?;

        if let Some(call) = message
            .get("tool_calls")
            .and_then(|calls| calls.get(0))
        {
            let function = call.get("function").ok_or_else(|| {
                FlowtraceError::Gateway("tool call without function body".to_string())
            })?;
            let name = function
                .get("name")
                .and_then(|n| n.as_str())
                .ok_or_else(|| FlowtraceError::Gateway("tool call without name".to_string()))?;
            let arguments: HashMap<String, Value> = match function.get("arguments") {
                Some(Value::String(raw)) => serde_json::from_str(raw)?,
                Some(Value::Object(map)) => map.clone().into_iter().collect(),
                _ => HashMap::new(),
            };

            return Ok(ModelResult::tool(ToolCallRequest {
                id: call.get("id").and_then(|v| v.as_str()).map(String::from),
                name: name.to_string(),
                arguments,
            }));
        }

        let content = message
            .get("content")
            .and_then(|c| c.as_str())
            .unwrap_or_default();
        Ok(ModelResult::text(content))
    }
}

#[async_trait]
impl LlmGateway for OpenAiGateway {
    async fn chat(
        &self,
        model: &str,
        messages: &[LlmMessage],
        tools: &[ToolDescriptor],
        config: &CompletionConfig,
    ) -> Result<ModelResult> {
        let body = self.build_request_body(model, messages, tools, config)?;
        let url = format!("{}/chat/completions", self.config.base_url);

        debug!(model = model, messages = messages.len(), tools = tools.len(), "Calling model");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(FlowtraceError::Gateway(format!("{}: {}", status, detail)));
        }

        let body: Value = response.json().await?;
        Self::parse_response(body)
    }
}
