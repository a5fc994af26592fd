//! Bounded batch queue and the bulk writer task that drains it.
//!
//! The producer blocks once `capacity` batches are waiting; that is the only
//! flow control between reading and writing. A failed bulk call drops its
//! batch (logged with the line range it covered) and the writer moves on.
//! When the store refuses only some items, only those count as dropped.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use lensdex_core::hash::PayloadDigest;
use lensdex_core::manifest::OutputStats;
use lensdex_io::IndexStore;
use lensdex_operators::Batch;

use crate::error::ExecError;
use crate::progress::ProgressReport;

/// Sending half of one output's queue. Dropping every clone closes the queue.
#[derive(Clone)]
pub struct BatchQueue {
    index: String,
    tx: mpsc::Sender<Batch>,
}

impl BatchQueue {
    /// Enqueue from a blocking (non-async) thread, waiting while the queue is full.
    pub fn enqueue(&self, batch: Batch) -> Result<(), ExecError> {
        self.tx
            .blocking_send(batch)
            .map_err(|_| ExecError::WriterGone(self.index.clone()))
    }

    pub async fn send(&self, batch: Batch) -> Result<(), ExecError> {
        self.tx
            .send(batch)
            .await
            .map_err(|_| ExecError::WriterGone(self.index.clone()))
    }

    pub fn index(&self) -> &str {
        &self.index
    }
}

/// Handle to a running writer task.
pub struct BulkWriter {
    index: String,
    handle: JoinHandle<OutputStats>,
}

impl BulkWriter {
    /// Spawn a writer for `index` on the current runtime.
    pub fn spawn(
        index: impl Into<String>,
        store: Arc<dyn IndexStore>,
        capacity: usize,
        report_progress: bool,
    ) -> (BatchQueue, BulkWriter) {
        let index = index.into();
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let handle = tokio::spawn(drain(index.clone(), store, rx, report_progress));
        (
            BatchQueue {
                index: index.clone(),
                tx,
            },
            BulkWriter { index, handle },
        )
    }

    pub fn index(&self) -> &str {
        &self.index
    }

    /// Wait for the writer to drain its queue. Only returns once every
    /// `BatchQueue` clone has been dropped.
    pub async fn finish(self) -> Result<OutputStats, ExecError> {
        self.handle
            .await
            .map_err(|e| ExecError::Join(format!("writer '{}': {e}", self.index)))
    }
}

async fn drain(
    index: String,
    store: Arc<dyn IndexStore>,
    mut rx: mpsc::Receiver<Batch>,
    report_progress: bool,
) -> OutputStats {
    let mut stats = OutputStats {
        index: index.clone(),
        ..OutputStats::default()
    };
    let mut digest = PayloadDigest::new();

    while let Some(batch) = rx.recv().await {
        let payload = batch.payload();
        let docs = batch.len() as u64;
        let (first, last) = batch.line_range();
        match store.bulk(&payload).await {
            Ok(()) => {
                stats.batches_written += 1;
                stats.documents_written += docs;
                digest.update(&payload);
                match ProgressReport::from_batch(&batch, stats.documents_written) {
                    Some(p) if report_progress => info!(index = %index, "{p}"),
                    _ => debug!(index = %index, docs, first, last, "bulk written"),
                }
            }
            Err(lensdex_io::Error::Rejected { rejected, .. }) => {
                let rejected = (rejected as u64).min(docs);
                stats.batches_failed += 1;
                stats.documents_written += docs - rejected;
                stats.documents_dropped += rejected;
                warn!(
                    index = %index,
                    rejected,
                    "indexing error: {rejected} of {docs} documents refused in lines {first}-{last}"
                );
            }
            Err(e) => {
                stats.batches_failed += 1;
                stats.documents_dropped += docs;
                warn!(index = %index, error = %e, "indexing error: skipping lines {first}-{last}");
            }
        }
    }

    if let Err(e) = store.flush().await {
        warn!(index = %index, error = %e, "flush after last batch failed");
    }
    if digest.payloads() > 0 {
        stats.payload_digest = Some(digest.finish());
    }
    debug!(
        index = %index,
        written = stats.batches_written,
        failed = stats.batches_failed,
        "writer stopped"
    );
    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use lensdex_io::store::MemoryIndexStore;
    use tokio::sync::Semaphore;

    fn batch(first: u64, docs: usize) -> Batch {
        let mut b = Batch::starting_at(first);
        for i in 0..docs {
            b.push(
                r#"{"index":{"_index":"t","_type":"t"}}"#.to_string(),
                format!(r#"{{"n":{i}}}"#),
            );
        }
        b.seal(first + docs as u64 - 1, 0, None);
        b
    }

    #[tokio::test]
    async fn failed_batch_is_dropped_and_writer_continues() {
        let store = MemoryIndexStore::new();
        store.fail_bulk_call(2);
        let (queue, writer) = BulkWriter::spawn("t", Arc::new(store.clone()), 4, false);
        queue.send(batch(1, 3)).await.unwrap();
        queue.send(batch(4, 2)).await.unwrap();
        queue.send(batch(6, 1)).await.unwrap();
        drop(queue);

        let stats = writer.finish().await.unwrap();
        assert_eq!(stats.batches_written, 2);
        assert_eq!(stats.batches_failed, 1);
        assert_eq!(stats.documents_written, 4);
        assert_eq!(stats.documents_dropped, 2);
        assert!(stats.payload_digest.is_some());
        assert_eq!(store.payloads().len(), 2);
        assert_eq!(store.flushes(), 1);
    }

    #[tokio::test]
    async fn closing_an_idle_queue_stops_the_writer() {
        let store = MemoryIndexStore::new();
        let (queue, writer) = BulkWriter::spawn("t", Arc::new(store.clone()), 1, true);
        drop(queue);
        let stats = writer.finish().await.unwrap();
        assert_eq!(stats.batches_written, 0);
        assert_eq!(stats.payload_digest, None);
        assert_eq!(store.bulk_calls(), 0);
    }

    struct GatedStore {
        gate: Arc<Semaphore>,
    }

    #[async_trait]
    impl IndexStore for GatedStore {
        async fn create(&self, _: &str) -> lensdex_io::Result<()> {
            Ok(())
        }
        async fn delete(&self, _: &str) -> lensdex_io::Result<()> {
            Ok(())
        }
        async fn put_mapping(&self, _: &str, _: &str, _: &serde_json::Value) -> lensdex_io::Result<()> {
            Ok(())
        }
        async fn bulk(&self, _: &str) -> lensdex_io::Result<()> {
            let permit = self
                .gate
                .acquire()
                .await
                .map_err(|e| lensdex_io::Error::Store(e.to_string()))?;
            permit.forget();
            Ok(())
        }
        fn describe(&self) -> String {
            "gated".into()
        }
    }

    /// Refuses the first document of every bulk call.
    struct PickyStore;

    #[async_trait]
    impl IndexStore for PickyStore {
        async fn create(&self, _: &str) -> lensdex_io::Result<()> {
            Ok(())
        }
        async fn delete(&self, _: &str) -> lensdex_io::Result<()> {
            Ok(())
        }
        async fn put_mapping(&self, _: &str, _: &str, _: &serde_json::Value) -> lensdex_io::Result<()> {
            Ok(())
        }
        async fn bulk(&self, payload: &str) -> lensdex_io::Result<()> {
            Err(lensdex_io::Error::Rejected {
                rejected: 1,
                total: lensdex_io::store::payload_pairs(payload).count(),
                reason: "mapper_parsing_exception".into(),
            })
        }
        fn describe(&self) -> String {
            "picky".into()
        }
    }

    #[tokio::test]
    async fn refused_items_count_per_document() {
        let (queue, writer) = BulkWriter::spawn("t", Arc::new(PickyStore), 4, false);
        queue.send(batch(1, 3)).await.unwrap();
        queue.send(batch(4, 2)).await.unwrap();
        drop(queue);

        let stats = writer.finish().await.unwrap();
        assert_eq!(stats.batches_written, 0);
        assert_eq!(stats.batches_failed, 2);
        assert_eq!(stats.documents_written, 3);
        assert_eq!(stats.documents_dropped, 2);
        assert_eq!(stats.payload_digest, None);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn producer_blocks_when_queue_is_full() {
        const CAPACITY: usize = 2;
        let gate = Arc::new(Semaphore::new(0));
        let store = Arc::new(GatedStore { gate: Arc::clone(&gate) });
        let (queue, writer) = BulkWriter::spawn("t", store, CAPACITY, false);

        let enqueued = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&enqueued);
        let producer = std::thread::spawn(move || {
            for i in 0..6u64 {
                queue.enqueue(batch(i * 10 + 1, 1)).unwrap();
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });

        // One batch in flight inside the stalled bulk call, CAPACITY waiting.
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(enqueued.load(Ordering::SeqCst), CAPACITY + 1);

        gate.add_permits(1);
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(enqueued.load(Ordering::SeqCst), CAPACITY + 2);

        gate.add_permits(16);
        tokio::task::spawn_blocking(move || producer.join().unwrap())
            .await
            .unwrap();
        let stats = writer.finish().await.unwrap();
        assert_eq!(stats.batches_written, 6);
    }
}
