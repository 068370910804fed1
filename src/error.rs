//! Error types and result aliases for the Flowtrace library.
//!
//! This module defines the core error type [`FlowtraceError`] and the [`Result`] type alias
//! used throughout the library. Sink delivery failures have their own type, [`SinkError`],
//! because they follow a different propagation policy: correlator and state errors are
//! surfaced to the instrumented caller immediately, while sink errors are reported through
//! a logging side channel and never abort the caller's primary computation.

use crate::trace::{SpanId, TraceId};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FlowtraceError {
    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Trace {trace_id} closed with {} open span(s)", open_spans.len())]
    IncompleteSpans {
        trace_id: TraceId,
        open_spans: Vec<SpanId>,
    },

    #[error("Resource exhausted: {0}")]
    ResourceExhausted(String),

    #[error("Missing template variable: {0}")]
    MissingVariable(String),

    #[error("Tool error: {0}")]
    ToolError(String),

    #[error("LLM gateway error: {0}")]
    Gateway(String),

    #[error("Sink error: {0}")]
    Sink(#[from] SinkError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Delivery failure reported by a [`Sink`](crate::sink::Sink).
///
/// `Rejected` means the service validated and refused the record; retrying the same
/// payload will not help. `Unreachable` and `Timeout` are transient and may be retried.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SinkError {
    #[error("Sink unreachable: {0}")]
    Unreachable(String),

    #[error("Sink rejected record: {0}")]
    Rejected(String),

    #[error("Sink delivery timed out: {0}")]
    Timeout(String),
}

impl SinkError {
    /// Whether a retry of the same record could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, SinkError::Rejected(_))
    }
}

pub type Result<T> = std::result::Result<T, FlowtraceError>;
