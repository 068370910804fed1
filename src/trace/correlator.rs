//! Correlation of traces and spans.
//!
//! The [`Correlator`] mediates creation, nesting, and closing of traces and spans, and
//! guarantees a well-formed tree regardless of call-order mistakes in the instrumented
//! application code. Each trace's span tree is guarded by its own lock; different traces
//! share nothing except the briefly-locked id map, so they never contend with each other.

use crate::error::{FlowtraceError, Result};
use crate::trace::assembled::{AssembledTrace, SpanNode};
use crate::trace::model::{
    ObservationStatus, Span, SpanHandle, SpanId, SpanKind, SpanParent, Trace, TraceHandle, TraceId,
};
use chrono::Utc;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Construction-time settings for a [`Correlator`].
#[derive(Debug, Clone, Default)]
pub struct CorrelatorConfig {
    /// Upper bound on concurrently open traces. `None` means unbounded.
    pub max_open_traces: Option<usize>,
}

/// Mutable state of one open trace. Children vectors are kept in open order; the
/// per-span `sequence` numbers agree with that order because both are assigned under
/// the trace lock.
struct TraceState {
    trace: Trace,
    spans: HashMap<SpanId, Span>,
    trace_children: Vec<SpanId>,
    span_children: HashMap<SpanId, Vec<SpanId>>,
    open_span_count: usize,
}

impl TraceState {
    fn open_span_ids(&self) -> Vec<SpanId> {
        let mut ids: Vec<&Span> = self
            .spans
            .values()
            .filter(|s| !s.status.is_terminal())
            .collect();
        ids.sort_by_key(|s| s.sequence);
        ids.into_iter().map(|s| s.id).collect()
    }

    fn build_node(&self, id: SpanId) -> SpanNode {
        let children = self
            .span_children
            .get(&id)
            .map(|ids| ids.iter().map(|child| self.build_node(*child)).collect())
            .unwrap_or_default();

        SpanNode {
            span: self.spans[&id].clone(),
            trace_children: children,
        }
    }

    fn assemble(&self) -> AssembledTrace {
        AssembledTrace {
            trace: self.trace.clone(),
            trace_children: self
                .trace_children
                .iter()
                .map(|id| self.build_node(*id))
                .collect(),
        }
    }
}

/// Assigns identifiers, tracks open/closed state, and enforces ordering and nesting
/// invariants as spans are opened and closed against a trace.
///
/// Once a trace reaches a terminal state its assembled record is returned to the caller
/// and the correlator forgets it; any later operation against the same handle fails with
/// `InvalidState`. The assembled record is therefore handed out exactly once, in
/// terminal, immutable form.
pub struct Correlator {
    config: CorrelatorConfig,
    traces: Mutex<HashMap<TraceId, Arc<Mutex<TraceState>>>>,
    sequence: AtomicU64,
}

impl Correlator {
    pub fn new(config: CorrelatorConfig) -> Self {
        Self {
            config,
            traces: Mutex::new(HashMap::new()),
            sequence: AtomicU64::new(0),
        }
    }

    /// Number of traces currently open.
    pub fn open_trace_count(&self) -> usize {
        self.traces.lock().unwrap().len()
    }

    /// Allocate a fresh trace in `Open` state with a fresh unique id and a recorded
    /// start time.
    ///
    /// Fails with `ResourceExhausted` only when the configured cap on concurrently
    /// open traces is reached.
    pub fn open_trace(&self) -> Result<TraceHandle> {
        let mut traces = self.traces.lock().unwrap();

        if let Some(max) = self.config.max_open_traces {
            if traces.len() >= max {
                return Err(FlowtraceError::ResourceExhausted(format!(
                    "{} traces already open",
                    traces.len()
                )));
            }
        }

        let trace = Trace {
            id: TraceId::new(),
            start_time: Utc::now(),
            end_time: None,
            status: ObservationStatus::Open,
            output: Value::Null,
        };
        let id = trace.id;

        let state = TraceState {
            trace,
            spans: HashMap::new(),
            trace_children: Vec::new(),
            span_children: HashMap::new(),
            open_span_count: 0,
        };
        traces.insert(id, Arc::new(Mutex::new(state)));

        debug!(trace_id = %id, "Opened trace");
        Ok(TraceHandle { id })
    }

    /// Allocate a fresh span under `parent` (the trace itself or an enclosing open span).
    ///
    /// Fails with `InvalidState` if the owning trace is terminal or unknown, or if the
    /// parent span is unknown or already closed.
    pub fn open_span<'a>(
        &self,
        parent: impl Into<SpanParent<'a>>,
        kind: SpanKind,
        input: Value,
    ) -> Result<SpanHandle> {
        let parent = parent.into();
        let trace_id = parent.trace_id();
        let state = self.trace_state(trace_id)?;
        let mut state = state.lock().unwrap();

        if state.trace.status.is_terminal() {
            return Err(FlowtraceError::InvalidState(format!(
                "cannot attach a span to trace {} in terminal state {}",
                trace_id, state.trace.status
            )));
        }

        if let Some(parent_id) = parent.parent_span_id() {
            match state.spans.get(&parent_id) {
                None => {
                    return Err(FlowtraceError::InvalidState(format!(
                        "unknown parent span {} in trace {}",
                        parent_id, trace_id
                    )));
                }
                Some(parent_span) if parent_span.status.is_terminal() => {
                    return Err(FlowtraceError::InvalidState(format!(
                        "parent span {} is already closed",
                        parent_id
                    )));
                }
                Some(_) => {}
            }
        }

        let span = Span {
            id: SpanId::new(),
            trace_id,
            parent_span_id: parent.parent_span_id(),
            kind,
            sequence: self.sequence.fetch_add(1, Ordering::SeqCst),
            input,
            output: Value::Null,
            start_time: Utc::now(),
            end_time: None,
            status: ObservationStatus::Open,
        };
        let id = span.id;

        match parent.parent_span_id() {
            None => state.trace_children.push(id),
            Some(parent_id) => state.span_children.entry(parent_id).or_default().push(id),
        }
        state.spans.insert(id, span);
        state.open_span_count += 1;

        debug!(trace_id = %trace_id, span_id = %id, "Opened span");
        Ok(SpanHandle { trace_id, id })
    }

    /// Transition a span from `Open` to a terminal status, recording its output and
    /// end time. Returns the closed span in its final, immutable form so callers may
    /// forward it to a sink incrementally.
    ///
    /// Fails with `InvalidState` on double-close, or if the handle does not belong to
    /// a still-open trace; a failed close leaves all prior state unchanged.
    pub fn close_span(
        &self,
        handle: &SpanHandle,
        output: Value,
        status: ObservationStatus,
    ) -> Result<Span> {
        if !status.is_terminal() {
            return Err(FlowtraceError::InvalidState(format!(
                "span {} must be closed with a terminal status",
                handle.id
            )));
        }

        let state = self.trace_state(handle.trace_id)?;
        let mut state = state.lock().unwrap();

        if state.trace.status.is_terminal() {
            return Err(FlowtraceError::InvalidState(format!(
                "trace {} is already in terminal state {}",
                handle.trace_id, state.trace.status
            )));
        }

        let span = state.spans.get_mut(&handle.id).ok_or_else(|| {
            FlowtraceError::InvalidState(format!(
                "unknown span {} in trace {}",
                handle.id, handle.trace_id
            ))
        })?;

        if span.status.is_terminal() {
            return Err(FlowtraceError::InvalidState(format!(
                "span {} is already closed",
                handle.id
            )));
        }

        span.output = output;
        span.status = status;
        span.end_time = Some(Utc::now().max(span.start_time));
        let closed = span.clone();
        state.open_span_count -= 1;

        debug!(trace_id = %handle.trace_id, span_id = %handle.id, status = %status, "Closed span");
        Ok(closed)
    }

    /// Transition the trace to a terminal state and return the fully assembled tree
    /// for handoff to a sink.
    ///
    /// Closing is strict: if any descendant span is still open the call fails with
    /// `IncompleteSpans` and the trace is left open and unchanged. Use
    /// [`cancel_trace`](Self::cancel_trace) to force-close instead.
    pub fn close_trace(
        &self,
        handle: &TraceHandle,
        output: Value,
        status: ObservationStatus,
    ) -> Result<AssembledTrace> {
        if !status.is_terminal() {
            return Err(FlowtraceError::InvalidState(format!(
                "trace {} must be closed with a terminal status",
                handle.id
            )));
        }

        let state = self.trace_state(handle.id)?;
        let assembled = {
            let mut state = state.lock().unwrap();

            if state.trace.status.is_terminal() {
                return Err(FlowtraceError::InvalidState(format!(
                    "trace {} is already in terminal state {}",
                    handle.id, state.trace.status
                )));
            }

            if state.open_span_count > 0 {
                return Err(FlowtraceError::IncompleteSpans {
                    trace_id: handle.id,
                    open_spans: state.open_span_ids(),
                });
            }

            state.trace.output = output;
            state.trace.status = status;
            state.trace.end_time = Some(Utc::now().max(state.trace.start_time));
            state.assemble()
        };

        self.traces.lock().unwrap().remove(&handle.id);
        debug!(trace_id = %handle.id, status = %status, "Closed trace");
        Ok(assembled)
    }

    /// Force-close a trace whose business operation was aborted: every still-open
    /// descendant span and the trace itself are closed with status `Cancelled` and a
    /// synthesized end time, then the assembled tree is returned.
    ///
    /// Fails with `InvalidState` if the trace is already terminal.
    pub fn cancel_trace(&self, handle: &TraceHandle) -> Result<AssembledTrace> {
        let state = self.trace_state(handle.id)?;
        let assembled = {
            let mut state = state.lock().unwrap();

            if state.trace.status.is_terminal() {
                return Err(FlowtraceError::InvalidState(format!(
                    "trace {} is already in terminal state {}",
                    handle.id, state.trace.status
                )));
            }

            let now = Utc::now();
            for span in state.spans.values_mut() {
                if !span.status.is_terminal() {
                    span.status = ObservationStatus::Cancelled;
                    span.end_time = Some(now.max(span.start_time));
                }
            }
            state.open_span_count = 0;

            state.trace.status = ObservationStatus::Cancelled;
            state.trace.end_time = Some(now.max(state.trace.start_time));
            state.assemble()
        };

        self.traces.lock().unwrap().remove(&handle.id);
        debug!(trace_id = %handle.id, "Cancelled trace");
        Ok(assembled)
    }

    fn trace_state(&self, id: TraceId) -> Result<Arc<Mutex<TraceState>>> {
        self.traces
            .lock()
            .unwrap()
            .get(&id)
            .cloned()
            .ok_or_else(|| {
                FlowtraceError::InvalidState(format!("unknown or already closed trace {}", id))
            })
    }
}

impl Default for Correlator {
    fn default() -> Self {
        Self::new(CorrelatorConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_open_and_close_empty_trace() {
        let correlator = Correlator::default();
        let trace = correlator.open_trace().unwrap();

        let assembled = correlator
            .close_trace(&trace, json!("done"), ObservationStatus::Complete)
            .unwrap();

        assert_eq!(assembled.trace.id, trace.id());
        assert_eq!(assembled.trace.status, ObservationStatus::Complete);
        assert_eq!(assembled.trace.output, json!("done"));
        assert!(assembled.trace.end_time.is_some());
        assert!(assembled.trace_children.is_empty());
        assert_eq!(correlator.open_trace_count(), 0);
    }

    #[test]
    fn test_assembled_spans_reproduce_open_order() {
        let correlator = Correlator::default();
        let trace = correlator.open_trace().unwrap();

        let a = correlator
            .open_span(&trace, SpanKind::ModelCall, json!({"call": "a"}))
            .unwrap();
        let b = correlator
            .open_span(&trace, SpanKind::ToolCall, json!({"call": "b"}))
            .unwrap();
        let a1 = correlator
            .open_span(&a, SpanKind::RetrievalCall, json!({"call": "a1"}))
            .unwrap();

        correlator.close_span(&a1, json!(1), ObservationStatus::Complete).unwrap();
        correlator.close_span(&b, json!(2), ObservationStatus::Complete).unwrap();
        correlator.close_span(&a, json!(3), ObservationStatus::Complete).unwrap();

        let assembled = correlator
            .close_trace(&trace, Value::Null, ObservationStatus::Complete)
            .unwrap();

        let in_order: Vec<SpanId> =
            assembled.spans_in_open_order().iter().map(|s| s.id).collect();
        assert_eq!(in_order, vec![a.id(), b.id(), a1.id()]);

        // Tree shape: a and b under the trace, a1 under a.
        assert_eq!(assembled.trace_children.len(), 2);
        assert_eq!(assembled.trace_children[0].span.id, a.id());
        assert_eq!(assembled.trace_children[1].span.id, b.id());
        assert_eq!(assembled.trace_children[0].trace_children.len(), 1);
        assert_eq!(assembled.trace_children[0].trace_children[0].span.id, a1.id());
    }

    #[test]
    fn test_double_close_span_fails_without_mutation() {
        let correlator = Correlator::default();
        let trace = correlator.open_trace().unwrap();
        let span = correlator.open_span(&trace, SpanKind::ToolCall, json!({})).unwrap();

        let closed = correlator
            .close_span(&span, json!(7), ObservationStatus::Complete)
            .unwrap();

        let err = correlator
            .close_span(&span, json!("other"), ObservationStatus::Errored)
            .unwrap_err();
        assert!(matches!(err, FlowtraceError::InvalidState(_)));

        let assembled = correlator
            .close_trace(&trace, Value::Null, ObservationStatus::Complete)
            .unwrap();
        let span_record = &assembled.trace_children[0].span;
        assert_eq!(span_record.output, json!(7));
        assert_eq!(span_record.status, ObservationStatus::Complete);
        assert_eq!(span_record.end_time, closed.end_time);
    }

    #[test]
    fn test_double_close_trace_fails() {
        let correlator = Correlator::default();
        let trace = correlator.open_trace().unwrap();

        correlator
            .close_trace(&trace, Value::Null, ObservationStatus::Complete)
            .unwrap();
        let err = correlator
            .close_trace(&trace, Value::Null, ObservationStatus::Complete)
            .unwrap_err();
        assert!(matches!(err, FlowtraceError::InvalidState(_)));
    }

    #[test]
    fn test_open_span_on_terminal_trace_fails() {
        let correlator = Correlator::default();
        let trace = correlator.open_trace().unwrap();
        correlator
            .close_trace(&trace, Value::Null, ObservationStatus::Complete)
            .unwrap();

        let err = correlator
            .open_span(&trace, SpanKind::ModelCall, json!({}))
            .unwrap_err();
        assert!(matches!(err, FlowtraceError::InvalidState(_)));
    }

    #[test]
    fn test_open_span_under_closed_parent_fails() {
        let correlator = Correlator::default();
        let trace = correlator.open_trace().unwrap();
        let parent = correlator.open_span(&trace, SpanKind::ModelCall, json!({})).unwrap();
        correlator
            .close_span(&parent, Value::Null, ObservationStatus::Complete)
            .unwrap();

        let err = correlator
            .open_span(&parent, SpanKind::ToolCall, json!({}))
            .unwrap_err();
        assert!(matches!(err, FlowtraceError::InvalidState(_)));
    }

    #[test]
    fn test_close_trace_with_open_spans_is_rejected() {
        let correlator = Correlator::default();
        let trace = correlator.open_trace().unwrap();
        let span = correlator.open_span(&trace, SpanKind::ToolCall, json!({})).unwrap();

        let err = correlator
            .close_trace(&trace, Value::Null, ObservationStatus::Complete)
            .unwrap_err();
        match err {
            FlowtraceError::IncompleteSpans { trace_id, open_spans } => {
                assert_eq!(trace_id, trace.id());
                assert_eq!(open_spans, vec![span.id()]);
            }
            other => panic!("Expected IncompleteSpans, got {:?}", other),
        }

        // The trace is still open and usable after the rejected close.
        correlator.close_span(&span, json!(1), ObservationStatus::Complete).unwrap();
        let assembled = correlator
            .close_trace(&trace, Value::Null, ObservationStatus::Complete)
            .unwrap();
        assert_eq!(assembled.trace_children.len(), 1);
    }

    #[test]
    fn test_cancel_trace_force_closes_descendants() {
        let correlator = Correlator::default();
        let trace = correlator.open_trace().unwrap();
        let outer = correlator.open_span(&trace, SpanKind::ModelCall, json!({})).unwrap();
        let inner = correlator.open_span(&outer, SpanKind::ToolCall, json!({})).unwrap();
        correlator.close_span(&inner, json!(5), ObservationStatus::Complete).unwrap();
        let dangling = correlator.open_span(&outer, SpanKind::ToolCall, json!({})).unwrap();

        let assembled = correlator.cancel_trace(&trace).unwrap();

        assert_eq!(assembled.trace.status, ObservationStatus::Cancelled);
        let outer_node = &assembled.trace_children[0];
        assert_eq!(outer_node.span.status, ObservationStatus::Cancelled);
        assert!(outer_node.span.end_time.is_some());

        let inner_node = &outer_node.trace_children[0];
        assert_eq!(inner_node.span.status, ObservationStatus::Complete);
        assert_eq!(inner_node.span.output, json!(5));

        let dangling_node = &outer_node.trace_children[1];
        assert_eq!(dangling_node.span.id, dangling.id());
        assert_eq!(dangling_node.span.status, ObservationStatus::Cancelled);

        let err = correlator.cancel_trace(&trace).unwrap_err();
        assert!(matches!(err, FlowtraceError::InvalidState(_)));
    }

    #[test]
    fn test_close_requires_terminal_status() {
        let correlator = Correlator::default();
        let trace = correlator.open_trace().unwrap();
        let span = correlator.open_span(&trace, SpanKind::ToolCall, json!({})).unwrap();

        let err = correlator
            .close_span(&span, Value::Null, ObservationStatus::Open)
            .unwrap_err();
        assert!(matches!(err, FlowtraceError::InvalidState(_)));

        let err = correlator
            .close_trace(&trace, Value::Null, ObservationStatus::Open)
            .unwrap_err();
        assert!(matches!(err, FlowtraceError::InvalidState(_)));
    }

    #[test]
    fn test_close_span_after_trace_closed_fails() {
        let correlator = Correlator::default();
        let trace = correlator.open_trace().unwrap();
        let span = correlator.open_span(&trace, SpanKind::ToolCall, json!({})).unwrap();
        correlator.close_span(&span, json!(1), ObservationStatus::Complete).unwrap();
        correlator
            .close_trace(&trace, Value::Null, ObservationStatus::Complete)
            .unwrap();

        let err = correlator
            .close_span(&span, json!(2), ObservationStatus::Complete)
            .unwrap_err();
        assert!(matches!(err, FlowtraceError::InvalidState(_)));
    }

    #[test]
    fn test_span_end_time_not_before_start_time() {
        let correlator = Correlator::default();
        let trace = correlator.open_trace().unwrap();
        let span = correlator.open_span(&trace, SpanKind::ModelCall, json!({})).unwrap();

        let closed = correlator
            .close_span(&span, Value::Null, ObservationStatus::Complete)
            .unwrap();
        assert!(closed.end_time.unwrap() >= closed.start_time);
    }

    #[test]
    fn test_max_open_traces_cap() {
        let correlator = Correlator::new(CorrelatorConfig {
            max_open_traces: Some(2),
        });

        let first = correlator.open_trace().unwrap();
        let _second = correlator.open_trace().unwrap();

        let err = correlator.open_trace().unwrap_err();
        assert!(matches!(err, FlowtraceError::ResourceExhausted(_)));

        // Closing a trace frees capacity.
        correlator
            .close_trace(&first, Value::Null, ObservationStatus::Complete)
            .unwrap();
        assert!(correlator.open_trace().is_ok());
    }

    #[test]
    fn test_independent_traces_do_not_interfere() {
        let correlator = Correlator::default();
        let first = correlator.open_trace().unwrap();
        let second = correlator.open_trace().unwrap();

        let span = correlator.open_span(&first, SpanKind::ToolCall, json!({})).unwrap();

        let assembled_second = correlator
            .close_trace(&second, Value::Null, ObservationStatus::Complete)
            .unwrap();
        assert!(assembled_second.trace_children.is_empty());

        correlator.close_span(&span, json!(1), ObservationStatus::Complete).unwrap();
        let assembled_first = correlator
            .close_trace(&first, Value::Null, ObservationStatus::Complete)
            .unwrap();
        assert_eq!(assembled_first.trace_children.len(), 1);
    }

    #[test]
    fn test_concurrent_span_attachment() {
        use std::sync::Arc;

        let correlator = Arc::new(Correlator::default());
        let trace = correlator.open_trace().unwrap();

        let mut handles = Vec::new();
        for i in 0..8 {
            let correlator = Arc::clone(&correlator);
            let trace = trace.clone();
            handles.push(std::thread::spawn(move || {
                let span = correlator
                    .open_span(&trace, SpanKind::ToolCall, json!({ "worker": i }))
                    .unwrap();
                correlator
                    .close_span(&span, json!(i), ObservationStatus::Complete)
                    .unwrap();
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        let assembled = correlator
            .close_trace(&trace, Value::Null, ObservationStatus::Complete)
            .unwrap();
        assert_eq!(assembled.trace_children.len(), 8);

        // Sibling order matches allocation order.
        let sequences: Vec<u64> =
            assembled.trace_children.iter().map(|n| n.span.sequence).collect();
        let mut sorted = sequences.clone();
        sorted.sort_unstable();
        assert_eq!(sequences, sorted);
    }
}
