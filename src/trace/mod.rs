//! Hierarchical trace correlation.
//!
//! This module correlates a multi-turn conversation (or RAG request) and its nested
//! sub-calls into a single hierarchical record suitable for later replay and evaluation.
//!
//! # Architecture
//!
//! - **Trace**: one top-level unit of work, owning an ordered list of child spans
//! - **Span**: one nested, timed sub-operation (model call, tool call, retrieval step)
//! - **Correlator**: assigns identifiers and enforces ordering/nesting invariants as
//!   spans are opened and closed against a trace
//! - **AssembledTrace**: the closed, immutable trace + span tree handed to a sink
//!
//! # Usage Example
//!
//! ```rust,ignore
//! use flowtrace::trace::{Correlator, ObservationStatus, SpanKind};
//! use serde_json::json;
//!
//! let correlator = Correlator::default();
//! let trace = correlator.open_trace()?;
//!
//! let span = correlator.open_span(&trace, SpanKind::ModelCall, json!({"prompt": "hi"}))?;
//! correlator.close_span(&span, json!("hello"), ObservationStatus::Complete)?;
//!
//! let assembled = correlator.close_trace(&trace, json!("hello"), ObservationStatus::Complete)?;
//! assert_eq!(assembled.span_count(), 1);
//! ```
//!
//! Closing a trace is strict: descendant spans must all be closed first, and closing
//! an ancestor while descendants remain open fails with `IncompleteSpans`. When the
//! surrounding business operation is aborted, `cancel_trace` force-closes the whole
//! tree with `cancelled` status instead.

pub mod assembled;
pub mod correlator;
pub mod model;

pub use assembled::{count_trace_children, AssembledTrace, SpanNode};
pub use correlator::{Correlator, CorrelatorConfig};
pub use model::{
    ObservationStatus, Span, SpanHandle, SpanId, SpanKind, SpanParent, Trace, TraceHandle, TraceId,
};
