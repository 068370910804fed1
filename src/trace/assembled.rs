//! Assembled, terminal trace records.
//!
//! An [`AssembledTrace`] is the fully closed, immutable trace + span tree returned by
//! [`Correlator::close_trace`](crate::trace::Correlator::close_trace) and handed to a
//! sink. Nested spans appear under the `trace_children` key at every level.

use crate::trace::model::{Span, Trace};
use serde::{Deserialize, Serialize};

/// One span together with its nested child spans, in open order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpanNode {
    #[serde(flatten)]
    pub span: Span,
    #[serde(default)]
    pub trace_children: Vec<SpanNode>,
}

impl SpanNode {
    /// Total number of spans in this subtree, the node itself included.
    pub fn subtree_size(&self) -> usize {
        1 + self
            .trace_children
            .iter()
            .map(SpanNode::subtree_size)
            .sum::<usize>()
    }
}

/// The fully closed, immutable trace + span tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssembledTrace {
    #[serde(flatten)]
    pub trace: Trace,
    #[serde(default)]
    pub trace_children: Vec<SpanNode>,
}

impl AssembledTrace {
    /// Total number of spans in the trace, at any nesting depth.
    pub fn span_count(&self) -> usize {
        self.trace_children
            .iter()
            .map(SpanNode::subtree_size)
            .sum()
    }

    /// All spans flattened into open order, i.e. ascending allocation sequence.
    ///
    /// Note this is not a pre-order walk of the tree: a sibling opened before another
    /// span's late child comes first, exactly as the calls happened.
    pub fn spans_in_open_order(&self) -> Vec<&Span> {
        fn collect<'a>(nodes: &'a [SpanNode], out: &mut Vec<&'a Span>) {
            for node in nodes {
                out.push(&node.span);
                collect(&node.trace_children, out);
            }
        }

        let mut spans = Vec::new();
        collect(&self.trace_children, &mut spans);
        spans.sort_by_key(|s| s.sequence);
        spans
    }
}

/// Count every descendant record of an assembled trace, at any nesting depth.
///
/// Walks the `trace_children` key recursively, so the count covers spans nested
/// arbitrarily deep, not just the trace's direct children.
pub fn count_trace_children(trace: &AssembledTrace) -> usize {
    trace.span_count()
}
