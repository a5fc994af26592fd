//! Progress lines printed after successful bulk writes.

use std::fmt;

use lensdex_operators::Batch;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressReport {
    pub percent: u64,
    pub kib_read: u64,
    pub kib_total: u64,
    pub documents: u64,
}

impl ProgressReport {
    /// `None` when the batch carries no usable byte totals.
    pub fn from_batch(batch: &Batch, documents: u64) -> Option<Self> {
        let total = batch.bytes_total().filter(|t| *t > 0)?;
        let read = batch.bytes_read();
        Some(Self {
            percent: read.saturating_mul(100) / total,
            kib_read: read / 1024,
            kib_total: total / 1024,
            documents,
        })
    }
}

impl fmt::Display for ProgressReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}% done ({} of {} KiB, {} documents)",
            self.percent, self.kib_read, self.kib_total, self.documents
        )
    }
}
