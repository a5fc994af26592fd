//! Run summary emitted after a pipeline completes.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::hash::Hash256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub Uuid);

/// What one writer did for one output index.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputStats {
    pub index: String,
    /// Documents the producer handed to this output.
    pub documents_built: u64,
    pub batches_written: u64,
    /// Bulk calls that failed outright or had items refused by the store.
    pub batches_failed: u64,
    /// Documents the store reports as stored.
    pub documents_written: u64,
    /// Documents lost to failed bulk calls or refused individually.
    pub documents_dropped: u64,
    /// Digest over every successfully written payload, in write order.
    pub payload_digest: Option<Hash256>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub id: RunId,
    pub version: String,
    pub primary: String,
    pub lines_read: u64,
    pub lines_skipped: u64,
    pub bytes_read: u64,
    pub bytes_total: u64,
    pub outputs: Vec<OutputStats>,
    /// Milliseconds since Unix epoch (UTC).
    pub started_ms: u64,
    pub finished_ms: u64,
}

impl RunSummary {
    pub fn new(primary: impl Into<String>, started_ms: u64) -> Self {
        Self {
            id: RunId(Uuid::new_v4()),
            version: crate::VERSION.to_string(),
            primary: primary.into(),
            lines_read: 0,
            lines_skipped: 0,
            bytes_read: 0,
            bytes_total: 0,
            outputs: Vec::new(),
            started_ms,
            finished_ms: started_ms,
        }
    }

    pub fn finish(mut self, finished_ms: u64, outputs: Vec<OutputStats>) -> Self {
        self.finished_ms = finished_ms;
        self.outputs = outputs;
        self
    }

    pub fn output(&self, index: &str) -> Option<&OutputStats> {
        self.outputs.iter().find(|o| o.index == index)
    }

    pub fn duration_ms(&self) -> u64 {
        self.finished_ms.saturating_sub(self.started_ms)
    }
}
