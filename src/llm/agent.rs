//! Conversation-turn driver.
//!
//! A [`ChatAgent`] runs one assistant turn at a time against a model-call provider:
//! it opens a `model-call` span for every provider call, executes requested tools as
//! nested `tool-call` spans, feeds tool results back to the model within a bounded
//! call budget, and hands the finished conversation trace to the sink.
//!
//! Tool failures never crash the conversation: they are recorded on the span and
//! surfaced inline in the visible reply as `[TOOL ERROR: <name>] <description>`.

use crate::error::Result;
use crate::llm::gateway::{CompletionConfig, LlmGateway};
use crate::llm::models::{LlmMessage, ModelResult, ToolCallRequest};
use crate::llm::tools::ToolRegistry;
use crate::sink::{deliver_logged, DeliveryPolicy, Sink, SinkRecord};
use crate::trace::{
    AssembledTrace, Correlator, ObservationStatus, SpanHandle, SpanKind, TraceHandle,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{info, warn};

/// One traced conversation: the open trace plus the message history so far.
pub struct Conversation {
    trace: TraceHandle,
    messages: Vec<LlmMessage>,
}

impl Conversation {
    pub fn trace(&self) -> &TraceHandle {
        &self.trace
    }

    pub fn messages(&self) -> &[LlmMessage] {
        &self.messages
    }
}

enum ToolOutcome {
    /// Tool result appended to the history; the model should see it next.
    FedBack { name: String, rendered: String },
    /// Reply text to surface to the user directly.
    Inline(String),
}

/// Drives traced conversation turns against an LLM gateway with registered tools.
pub struct ChatAgent {
    model: String,
    gateway: Arc<dyn LlmGateway>,
    tools: ToolRegistry,
    correlator: Arc<Correlator>,
    sink: Arc<dyn Sink>,
    completion: CompletionConfig,
    delivery: DeliveryPolicy,
    max_model_calls: usize,
}

impl ChatAgent {
    pub fn new(
        model: impl Into<String>,
        gateway: Arc<dyn LlmGateway>,
        tools: ToolRegistry,
        correlator: Arc<Correlator>,
        sink: Arc<dyn Sink>,
    ) -> Self {
        Self {
            model: model.into(),
            gateway,
            tools,
            correlator,
            sink,
            completion: CompletionConfig::default(),
            delivery: DeliveryPolicy::default(),
            max_model_calls: 3,
        }
    }

    pub fn with_completion(mut self, completion: CompletionConfig) -> Self {
        self.completion = completion;
        self
    }

    pub fn with_delivery(mut self, delivery: DeliveryPolicy) -> Self {
        self.delivery = delivery;
        self
    }

    /// Bound on provider calls per turn. With a budget of 1, a successful tool call
    /// is surfaced directly as `[TOOL CALL: <name>] <result>` instead of being fed
    /// back for a follow-up completion.
    pub fn with_max_model_calls(mut self, max_model_calls: usize) -> Self {
        self.max_model_calls = max_model_calls;
        self
    }

    /// Open a new conversation trace seeded with a system prompt.
    pub fn start_conversation(&self, system_prompt: &str) -> Result<Conversation> {
        let trace = self.correlator.open_trace()?;
        Ok(Conversation {
            trace,
            messages: vec![LlmMessage::system(system_prompt)],
        })
    }

    /// Run one assistant turn: record the user input, call the model (executing any
    /// requested tools) within the call budget, and return the visible reply.
    pub async fn reply(&self, conversation: &mut Conversation, user_input: &str) -> Result<String> {
        conversation.messages.push(LlmMessage::user(user_input));

        for call_index in 0..self.max_model_calls {
            let span = self.correlator.open_span(
                &conversation.trace,
                SpanKind::ModelCall,
                json!({
                    "model": self.model,
                    "messages": serde_json::to_value(&conversation.messages)?,
                }),
            )?;

            let outcome = self
                .gateway
                .chat(
                    &self.model,
                    &conversation.messages,
                    &self.tools.descriptors(),
                    &self.completion,
                )
                .await;

            let outcome = match outcome {
                Ok(outcome) => outcome,
                Err(err) => {
                    self.correlator.close_span(
                        &span,
                        json!({ "error": err.to_string() }),
                        ObservationStatus::Errored,
                    )?;
                    return Err(err);
                }
            };

            match outcome {
                ModelResult::TextReply { content } => {
                    self.correlator.close_span(
                        &span,
                        json!(content),
                        ObservationStatus::Complete,
                    )?;
                    conversation.messages.push(LlmMessage::assistant(&content));
                    return Ok(content);
                }
                ModelResult::ToolInvocation { call } => {
                    info!(tool = %call.name, "Model requested tool");
                    match self.invoke_tool(conversation, &span, call)? {
                        ToolOutcome::Inline(reply) => {
                            conversation.messages.push(LlmMessage::assistant(&reply));
                            return Ok(reply);
                        }
                        ToolOutcome::FedBack { name, rendered } => {
                            if call_index + 1 == self.max_model_calls {
                                let reply = format!("[TOOL CALL: {}] {}", name, rendered);
                                conversation.messages.push(LlmMessage::assistant(&reply));
                                return Ok(reply);
                            }
                        }
                    }
                }
            }
        }

        // Call budget of zero: nothing was asked, answer with the latest assistant text.
        let fallback = conversation
            .messages
            .iter()
            .rev()
            .find(|m| matches!(m.role, crate::llm::models::MessageRole::Assistant))
            .and_then(|m| m.content.clone())
            .unwrap_or_default();
        Ok(fallback)
    }

    /// Close the conversation trace and hand it to the sink. Delivery failure is
    /// reported through the logging side channel only.
    pub async fn end_conversation(&self, conversation: Conversation) -> Result<AssembledTrace> {
        let output = serde_json::to_value(&conversation.messages)?;
        let assembled = self.correlator.close_trace(
            &conversation.trace,
            output,
            ObservationStatus::Complete,
        )?;

        deliver_logged(
            self.sink.as_ref(),
            &SinkRecord::from(assembled.clone()),
            &self.delivery,
        )
        .await;
        Ok(assembled)
    }

    /// Force-close an aborted conversation, marking everything still open as
    /// cancelled, and hand the partial trace to the sink.
    pub async fn abort_conversation(&self, conversation: Conversation) -> Result<AssembledTrace> {
        let assembled = self.correlator.cancel_trace(&conversation.trace)?;

        deliver_logged(
            self.sink.as_ref(),
            &SinkRecord::from(assembled.clone()),
            &self.delivery,
        )
        .await;
        Ok(assembled)
    }

    fn invoke_tool(
        &self,
        conversation: &mut Conversation,
        model_span: &SpanHandle,
        call: ToolCallRequest,
    ) -> Result<ToolOutcome> {
        let call_record = serde_json::to_value(&call)?;
        let tool_span = self.correlator.open_span(
            model_span,
            SpanKind::ToolCall,
            json!({ "name": call.name, "arguments": call.arguments }),
        )?;

        let outcome = match self.tools.get(&call.name) {
            None => {
                warn!(tool = %call.name, "Tool not found");
                self.correlator.close_span(
                    &tool_span,
                    json!({ "error": "unknown tool" }),
                    ObservationStatus::Errored,
                )?;
                ToolOutcome::Inline(format!("[TOOL ERROR: {}] unknown tool", call.name))
            }
            Some(tool) => match tool.run(&call.arguments) {
                Ok(value) => {
                    self.correlator.close_span(
                        &tool_span,
                        value.clone(),
                        ObservationStatus::Complete,
                    )?;

                    let rendered = match &value {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    };
                    let name = call.name.clone();
                    conversation.messages.push(LlmMessage::assistant_tool_call(call.clone()));
                    conversation
                        .messages
                        .push(LlmMessage::tool_result(call, serde_json::to_string(&value)?));

                    ToolOutcome::FedBack { name, rendered }
                }
                Err(err) => {
                    warn!(tool = %call.name, error = %err, "Tool execution failed");
                    self.correlator.close_span(
                        &tool_span,
                        json!({ "error": err.to_string() }),
                        ObservationStatus::Errored,
                    )?;
                    ToolOutcome::Inline(format!("[TOOL ERROR: {}] {}", call.name, err))
                }
            },
        };

        // The model span closes after its tool child, carrying the requested call.
        self.correlator.close_span(model_span, call_record, ObservationStatus::Complete)?;
        Ok(outcome)
    }
}
