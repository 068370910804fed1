//! Null sink implementation following the Null Object Pattern.
//!
//! `NullSink` accepts every record and discards it, eliminating conditional checks in
//! client code when observability is switched off.

use crate::error::SinkError;
use crate::sink::{Ack, Sink, SinkRecord};
use async_trait::async_trait;

/// A sink that silently discards all records.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl NullSink {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Sink for NullSink {
    async fn send(&self, record: &SinkRecord) -> std::result::Result<Ack, SinkError> {
        Ok(Ack {
            id: record.record_id(),
        })
    }
}
