//! In-process sink with callback support, for tests and demos.

use crate::error::SinkError;
use crate::sink::{Ack, Sink, SinkRecord};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};

/// Type alias for record callback functions
pub type RecordCallback = Arc<dyn Fn(&SinkRecord) + Send + Sync>;

/// Sink that keeps accepted records in memory.
///
/// MemorySink provides thread-safe storage for delivered records with support for:
/// - Callbacks triggered on each accepted record
/// - Querying stored records by type
/// - Clearing between test cases
pub struct MemorySink {
    records: Mutex<Vec<SinkRecord>>,
    on_record_callback: Option<RecordCallback>,
}

impl MemorySink {
    pub fn new(on_record_callback: Option<RecordCallback>) -> Self {
        Self {
            records: Mutex::new(Vec::new()),
            on_record_callback,
        }
    }

    /// All records accepted so far, in delivery order.
    pub fn records(&self) -> Vec<SinkRecord> {
        self.records.lock().unwrap().clone()
    }

    /// Number of accepted trace records.
    pub fn trace_count(&self) -> usize {
        self.records
            .lock()
            .unwrap()
            .iter()
            .filter(|r| matches!(r, SinkRecord::Trace(_)))
            .count()
    }

    /// Number of accepted span records.
    pub fn span_count(&self) -> usize {
        self.records
            .lock()
            .unwrap()
            .iter()
            .filter(|r| matches!(r, SinkRecord::Span(_)))
            .count()
    }

    pub fn clear(&self) {
        self.records.lock().unwrap().clear();
    }

    pub fn len(&self) -> usize {
        self.records.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().unwrap().is_empty()
    }
}

impl Default for MemorySink {
    fn default() -> Self {
        Self::new(None)
    }
}

#[async_trait]
impl Sink for MemorySink {
    async fn send(&self, record: &SinkRecord) -> std::result::Result<Ack, SinkError> {
        if let Some(callback) = &self.on_record_callback {
            callback(record);
        }

        let mut records = self.records.lock().unwrap();
        records.push(record.clone());

        Ok(Ack {
            id: record.record_id(),
        })
    }
}
