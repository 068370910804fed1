//! Delivery of closed traces and spans to an external logging/evaluation service.
//!
//! A [`Sink`] accepts terminal records. Delivery failures are isolated from the
//! instrumented business logic: [`deliver`] bounds every attempt with a caller-supplied
//! deadline and retries transient failures with backoff, and [`deliver_logged`] reports
//! the final failure through `tracing` only, so producing a chat reply never fails
//! because logging did.
//!
//! Three sinks ship with the crate: [`HttpSink`] posts JSON records to a remote
//! endpoint, [`MemorySink`] stores them in process for tests and demos, and
//! [`NullSink`] discards everything.

pub mod http;
pub mod memory;
pub mod null;

pub use http::{HttpSink, SinkConfig};
pub use memory::MemorySink;
pub use null::NullSink;

use crate::error::SinkError;
use crate::trace::{AssembledTrace, Span};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// Acknowledgement returned by a sink for an accepted record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ack {
    /// Identifier of the accepted record, as known to the service.
    pub id: String,
}

/// A record a sink can accept: a fully assembled trace, or an individual closed span
/// for incremental delivery.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SinkRecord {
    Trace(AssembledTrace),
    Span(Span),
}

impl SinkRecord {
    pub fn record_id(&self) -> String {
        match self {
            SinkRecord::Trace(t) => t.trace.id.to_string(),
            SinkRecord::Span(s) => s.id.to_string(),
        }
    }
}

impl From<AssembledTrace> for SinkRecord {
    fn from(trace: AssembledTrace) -> Self {
        SinkRecord::Trace(trace)
    }
}

impl From<Span> for SinkRecord {
    fn from(span: Span) -> Self {
        SinkRecord::Span(span)
    }
}

/// External service that persists or evaluates completed traces and spans.
#[async_trait]
pub trait Sink: Send + Sync {
    /// Attempt delivery of one record. Implementations report transport failures as
    /// `Unreachable` or `Timeout` and validation refusals as `Rejected`; they never
    /// panic on a failed delivery.
    async fn send(&self, record: &SinkRecord) -> std::result::Result<Ack, SinkError>;
}

/// Bounds for one delivery: per-attempt deadline, attempt budget, and backoff base.
#[derive(Debug, Clone)]
pub struct DeliveryPolicy {
    /// Deadline applied to each individual send attempt.
    pub deadline: Duration,
    /// Total attempts, first try included.
    pub max_attempts: u32,
    /// Sleep before the second attempt; doubled after every further failure.
    pub initial_backoff: Duration,
}

impl Default for DeliveryPolicy {
    fn default() -> Self {
        Self {
            deadline: Duration::from_secs(5),
            max_attempts: 3,
            initial_backoff: Duration::from_millis(200),
        }
    }
}

/// Deliver one record, retrying transient failures within the policy's budget.
///
/// `Rejected` is returned immediately: the service refused the payload and a retry
/// cannot help. Each attempt is cancelled once `policy.deadline` elapses.
pub async fn deliver(
    sink: &dyn Sink,
    record: &SinkRecord,
    policy: &DeliveryPolicy,
) -> std::result::Result<Ack, SinkError> {
    let attempts = policy.max_attempts.max(1);
    let mut backoff = policy.initial_backoff;
    let mut last_error = SinkError::Unreachable("no delivery attempt made".to_string());

    for attempt in 1..=attempts {
        match tokio::time::timeout(policy.deadline, sink.send(record)).await {
            Ok(Ok(ack)) => {
                debug!(record_id = %record.record_id(), attempt, "Record delivered");
                return Ok(ack);
            }
            Ok(Err(err)) if !err.is_retryable() => return Err(err),
            Ok(Err(err)) => last_error = err,
            Err(_) => {
                last_error =
                    SinkError::Timeout(format!("attempt exceeded {:?}", policy.deadline));
            }
        }

        if attempt < attempts {
            debug!(
                record_id = %record.record_id(),
                attempt,
                error = %last_error,
                "Delivery attempt failed, backing off"
            );
            tokio::time::sleep(backoff).await;
            backoff *= 2;
        }
    }

    Err(last_error)
}

/// Deliver one record, reporting failure through the logging side channel only.
///
/// This is the handoff used on the instrumented application's primary path: the
/// caller's own computation proceeds unchanged whether or not delivery succeeded.
pub async fn deliver_logged(
    sink: &dyn Sink,
    record: &SinkRecord,
    policy: &DeliveryPolicy,
) -> Option<Ack> {
    match deliver(sink, record, policy).await {
        Ok(ack) => Some(ack),
        Err(err) => {
            warn!(record_id = %record.record_id(), error = %err, "Record delivery failed");
            None
        }
    }
}
