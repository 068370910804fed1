//! Data model for traces and spans.
//!
//! A [`Trace`] is one top-level unit of correlated work (a conversation or a pipeline run).
//! A [`Span`] is one nested, timed sub-operation within a trace (a model call, a tool call,
//! a retrieval step). Both are plain records; all lifecycle rules are enforced by the
//! [`Correlator`](crate::trace::Correlator).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use uuid::Uuid;

/// Unique identifier for a trace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TraceId(Uuid);

impl TraceId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TraceId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TraceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Unique identifier for a span.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SpanId(Uuid);

impl SpanId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SpanId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SpanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Lifecycle state shared by traces and spans.
///
/// `Open` is the only non-terminal state. A record transitions to a terminal state
/// exactly once and is immutable afterwards. `Cancelled` marks records force-closed
/// because the surrounding business operation was aborted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObservationStatus {
    Open,
    Complete,
    Errored,
    Cancelled,
}

impl ObservationStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, ObservationStatus::Open)
    }
}

impl fmt::Display for ObservationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ObservationStatus::Open => "open",
            ObservationStatus::Complete => "complete",
            ObservationStatus::Errored => "errored",
            ObservationStatus::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// Category tag for a span. Open set: the well-known kinds have dedicated variants,
/// anything else round-trips through `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SpanKind {
    ModelCall,
    ToolCall,
    RetrievalCall,
    Other(String),
}

impl SpanKind {
    pub fn as_str(&self) -> &str {
        match self {
            SpanKind::ModelCall => "model-call",
            SpanKind::ToolCall => "tool-call",
            SpanKind::RetrievalCall => "retrieval-call",
            SpanKind::Other(s) => s,
        }
    }
}

impl From<&str> for SpanKind {
    fn from(s: &str) -> Self {
        match s {
            "model-call" => SpanKind::ModelCall,
            "tool-call" => SpanKind::ToolCall,
            "retrieval-call" => SpanKind::RetrievalCall,
            other => SpanKind::Other(other.to_string()),
        }
    }
}

impl From<String> for SpanKind {
    fn from(s: String) -> Self {
        SpanKind::from(s.as_str())
    }
}

impl From<SpanKind> for String {
    fn from(kind: SpanKind) -> Self {
        kind.as_str().to_string()
    }
}

impl fmt::Display for SpanKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One nested, timed sub-operation within a trace.
///
/// `parent_span_id` is `None` for direct children of the trace. `sequence` is a
/// process-wide allocation number assigned at open time; it decides ordering among
/// siblings, never the wall-clock timestamps (two spans can open within one clock tick).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Span {
    pub id: SpanId,
    pub trace_id: TraceId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_span_id: Option<SpanId>,
    pub kind: SpanKind,
    pub sequence: u64,
    pub input: Value,
    #[serde(default)]
    pub output: Value,
    pub start_time: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    pub status: ObservationStatus,
}

/// One top-level unit of correlated work.
///
/// The trace's directly attached spans are kept by the correlator while the trace is
/// open and appear as `trace_children` on the assembled record once closed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trace {
    pub id: TraceId,
    pub start_time: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    pub status: ObservationStatus,
    #[serde(default)]
    pub output: Value,
}

/// Caller-held reference to an open trace. Carries only identity; all state lives
/// in the correlator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceHandle {
    pub(crate) id: TraceId,
}

impl TraceHandle {
    pub fn id(&self) -> TraceId {
        self.id
    }
}

/// Caller-held reference to an open span, carrying enough identity to later close
/// exactly this span.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpanHandle {
    pub(crate) trace_id: TraceId,
    pub(crate) id: SpanId,
}

impl SpanHandle {
    pub fn id(&self) -> SpanId {
        self.id
    }

    pub fn trace_id(&self) -> TraceId {
        self.trace_id
    }
}

/// Parent of a new span: either the trace itself or an enclosing open span.
#[derive(Debug, Clone, Copy)]
pub enum SpanParent<'a> {
    Trace(&'a TraceHandle),
    Span(&'a SpanHandle),
}

impl<'a> From<&'a TraceHandle> for SpanParent<'a> {
    fn from(handle: &'a TraceHandle) -> Self {
        SpanParent::Trace(handle)
    }
}

impl<'a> From<&'a SpanHandle> for SpanParent<'a> {
    fn from(handle: &'a SpanHandle) -> Self {
        SpanParent::Span(handle)
    }
}

impl SpanParent<'_> {
    pub fn trace_id(&self) -> TraceId {
        match self {
            SpanParent::Trace(h) => h.id,
            SpanParent::Span(h) => h.trace_id,
        }
    }

    pub fn parent_span_id(&self) -> Option<SpanId> {
        match self {
            SpanParent::Trace(_) => None,
            SpanParent::Span(h) => Some(h.id),
        }
    }
}
