//! Trace-structured interaction logging and evaluation for LLM applications.
//!
//! Flowtrace correlates a multi-turn conversation or RAG request and its nested
//! sub-calls (model calls, tool calls, retrieval steps) into a single hierarchical
//! record, and forwards completed records to a logging/evaluation service without
//! ever letting delivery failures disturb the instrumented application.

pub mod error;
pub mod evaluation;
pub mod evaluators;
pub mod llm;
pub mod rag;
pub mod retrieval;
pub mod sink;
pub mod template;
pub mod trace;

pub use error::{FlowtraceError, Result, SinkError};

/// Prelude module for common imports
pub mod prelude {
    pub use crate::error::{FlowtraceError, Result, SinkError};
    pub use crate::evaluation::{run_evaluation, Datapoint, Dataset, EvaluationReport};
    pub use crate::evaluators::{
        exact_match, levenshtein_distance, EvaluatorDescriptor, EvaluatorRegistry, Judgment,
    };
    pub use crate::llm::gateways::{OpenAiConfig, OpenAiGateway};
    pub use crate::llm::tools::{CalculatorTool, LlmTool, RandomNumberTool, ToolRegistry};
    pub use crate::llm::{
        ChatAgent, CompletionConfig, Conversation, LlmGateway, LlmMessage, MessageRole,
        ModelResult,
    };
    pub use crate::rag::RagPipeline;
    pub use crate::retrieval::{Document, InMemoryKnowledgeStore, KnowledgeStore};
    pub use crate::sink::{
        deliver, deliver_logged, Ack, DeliveryPolicy, HttpSink, MemorySink, NullSink, Sink,
        SinkConfig, SinkRecord,
    };
    pub use crate::template::{populate_messages, populate_template, MessageTemplate};
    pub use crate::trace::{
        AssembledTrace, Correlator, CorrelatorConfig, ObservationStatus, SpanHandle, SpanKind,
        TraceHandle,
    };
}
