use crate::error::Result;
use crate::llm::models::{LlmMessage, ModelResult};
use crate::llm::tools::ToolDescriptor;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Configuration for LLM completion
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionConfig {
    pub temperature: f32,
    pub max_tokens: usize,
    pub top_p: Option<f32>,
    pub stop: Option<String>,
    pub presence_penalty: Option<f32>,
    pub frequency_penalty: Option<f32>,
    pub seed: Option<i64>,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            max_tokens: 1024,
            top_p: None,
            stop: None,
            presence_penalty: None,
            frequency_penalty: None,
            seed: None,
        }
    }
}

/// Abstract interface for LLM providers
///
/// The provider accepts an ordered sequence of role-tagged messages plus optional
/// tool declarations and answers with a [`ModelResult`]: either free-text content or
/// a structured tool-invocation request.
#[async_trait]
pub trait LlmGateway: Send + Sync {
    async fn chat(
        &self,
        model: &str,
        messages: &[LlmMessage],
        tools: &[ToolDescriptor],
        config: &CompletionConfig,
    ) -> Result<ModelResult>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_completion_config_default() {
        let config = CompletionConfig::default();

        assert_eq!(config.temperature, 0.7);
        assert_eq!(config.max_tokens, 1024);
        assert_eq!(config.top_p, None);
        assert_eq!(config.seed, None);
    }

    #[test]
    fn test_completion_config_custom() {
        let config = CompletionConfig {
            temperature: 0.7,
            max_tokens: 200,
            top_p: Some(1.0),
            stop: Some("\n\n\n".to_string()),
            presence_penalty: Some(0.5),
            frequency_penalty: Some(0.5),
            seed: Some(42),
        };

        assert_eq!(config.max_tokens, 200);
        assert_eq!(config.stop.as_deref(), Some("\n\n\n"));
        assert_eq!(config.seed, Some(42));
    }
}
