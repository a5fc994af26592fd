//! `PipelineOrchestrator`: wires the primary reader, optional merge joins,
//! document building, optional grouping, and one bulk writer per output.
//!
//! The producer is strictly sequential (joins depend on the primary key
//! order), so it runs on one blocking thread. Writers run as tokio tasks and
//! are joined only after the producer has dropped its queues.

use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::{debug, info, warn};

use lensdex_core::prelude::{Delimiter, DocumentSchema, IndexerConfig, Record, RunSummary};
use lensdex_io::{IndexStore, JoinedRecords, Line, LineReader, MultiFileJoinReader};
use lensdex_operators::{Batch, BulkHeader, DocumentBuilder, GroupAggregator, GroupDocument, GroupLayout};

use crate::error::ExecError;
use crate::writer::{BatchQueue, BulkWriter};

/// Extra document members rendered from the primary record and its join
/// results. Returns a comma-separated run of `"name":value` pairs, or "".
pub type Augment = Box<dyn Fn(&Record, &JoinedRecords) -> String + Send>;

/// Where one stream of documents goes.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputTarget {
    pub index: String,
    pub doc_type: String,
    /// Column whose trimmed value becomes the document `_id`.
    pub id_column: Option<usize>,
    /// Mapping installed when the index is (re)created.
    pub mapping: Option<serde_json::Value>,
}

impl OutputTarget {
    pub fn new(index: impl Into<String>, doc_type: impl Into<String>) -> Self {
        Self {
            index: index.into(),
            doc_type: doc_type.into(),
            id_column: None,
            mapping: None,
        }
    }

    pub fn with_id_column(mut self, column: usize) -> Self {
        self.id_column = Some(column);
        self
    }

    pub fn with_mapping(mut self, mapping: serde_json::Value) -> Self {
        self.mapping = Some(mapping);
        self
    }

    fn header_for(&self, record: &Record) -> String {
        let header = BulkHeader::new(self.index.as_str(), self.doc_type.as_str());
        match self.id_column.and_then(|c| record.field(c)) {
            Some(id) => header.with_id(id.trim()).render(),
            None => header.render(),
        }
    }
}

struct GroupStage {
    target: OutputTarget,
    key_column: usize,
    aggregator: GroupAggregator,
}

pub struct PipelineOrchestrator {
    primary: PathBuf,
    key_column: usize,
    builder: DocumentBuilder,
    cfg: IndexerConfig,
    main: Option<OutputTarget>,
    joins: Option<MultiFileJoinReader>,
    augment: Option<Augment>,
    group: Option<GroupStage>,
}

impl PipelineOrchestrator {
    pub fn new(
        primary: impl Into<PathBuf>,
        schema: DocumentSchema,
        delimiter: Delimiter,
        cfg: IndexerConfig,
    ) -> Result<Self, ExecError> {
        cfg.validate()?;
        Ok(Self {
            primary: primary.into(),
            key_column: 0,
            builder: DocumentBuilder::new(schema, delimiter)?,
            cfg,
            main: None,
            joins: None,
            augment: None,
            group: None,
        })
    }

    pub fn key_column(mut self, column: usize) -> Self {
        self.key_column = column;
        self
    }

    /// Emit one document per primary record to `target`.
    pub fn main_output(mut self, target: OutputTarget) -> Self {
        self.main = Some(target);
        self
    }

    pub fn with_joins(mut self, joins: MultiFileJoinReader) -> Self {
        self.joins = Some(joins);
        self
    }

    pub fn with_augment<F>(mut self, augment: F) -> Self
    where
        F: Fn(&Record, &JoinedRecords) -> String + Send + 'static,
    {
        self.augment = Some(Box::new(augment));
        self
    }

    /// Also fold built documents into per-key aggregates written to `target`.
    pub fn group_output(
        mut self,
        target: OutputTarget,
        key_column: usize,
        layout: GroupLayout,
        flush_threshold: Option<usize>,
    ) -> Result<Self, ExecError> {
        let threshold = flush_threshold.or(self.cfg.group_flush_threshold);
        self.group = Some(GroupStage {
            target,
            key_column,
            aggregator: GroupAggregator::new(layout, threshold)?,
        });
        Ok(self)
    }

    pub fn primary(&self) -> &Path {
        &self.primary
    }

    pub fn config(&self) -> &IndexerConfig {
        &self.cfg
    }

    /// Every output this pipeline writes to, main first.
    pub fn outputs(&self) -> Vec<&OutputTarget> {
        self.main
            .iter()
            .chain(self.group.as_ref().map(|g| &g.target))
            .collect()
    }

    /// Run to completion. Writers always drain before this returns, even when
    /// the producer fails.
    pub async fn run(self, store: Arc<dyn IndexStore>) -> Result<RunSummary, ExecError> {
        let Self {
            primary,
            key_column,
            builder,
            cfg,
            main,
            joins,
            augment,
            group,
        } = self;

        if main.is_none() && group.is_none() {
            return Err(lensdex_core::Error::Config("pipeline has no output".into()).into());
        }
        let lines = LineReader::open(&primary)?;
        let summary = RunSummary::new(primary.display().to_string(), now_millis());
        info!(
            primary = %primary.display(),
            store = %store.describe(),
            lines_per_bulk = cfg.lines_per_bulk,
            queue_capacity = cfg.queue_capacity,
            "indexing started"
        );

        let mut writers = Vec::new();
        let main = main.map(|target| {
            let (queue, writer) = BulkWriter::spawn(
                target.index.clone(),
                Arc::clone(&store),
                cfg.queue_capacity,
                cfg.report_progress,
            );
            writers.push(writer);
            MainSink::new(target, queue)
        });
        let group = group.map(|stage| {
            let (queue, writer) = BulkWriter::spawn(
                stage.target.index.clone(),
                Arc::clone(&store),
                cfg.queue_capacity,
                cfg.report_progress,
            );
            writers.push(writer);
            GroupSink::new(stage, queue)
        });

        let producer = Producer {
            lines,
            key_column,
            builder,
            joins,
            augment,
            main,
            group,
            lines_per_bulk: cfg.lines_per_bulk,
            groups_per_bulk: cfg.groups_per_bulk,
            counts: ProducerCounts::default(),
        };
        let produced = tokio::task::spawn_blocking(move || producer.run()).await;

        let mut outputs = Vec::with_capacity(writers.len());
        for writer in writers {
            outputs.push(writer.finish().await?);
        }
        let counts = produced.map_err(|e| ExecError::Join(format!("producer: {e}")))??;

        for out in &mut outputs {
            out.documents_built = if counts.main_index.as_deref() == Some(out.index.as_str()) {
                counts.main_built
            } else {
                counts.group_built
            };
        }

        let mut summary = summary.finish(now_millis(), outputs);
        summary.lines_read = counts.lines_read;
        summary.lines_skipped = counts.lines_skipped;
        summary.bytes_read = counts.bytes_read;
        summary.bytes_total = counts.bytes_total;
        info!(
            lines = summary.lines_read,
            skipped = summary.lines_skipped,
            ms = summary.duration_ms(),
            "indexing finished"
        );
        Ok(summary)
    }
}

#[derive(Debug, Default)]
struct ProducerCounts {
    lines_read: u64,
    lines_skipped: u64,
    bytes_read: u64,
    bytes_total: u64,
    main_index: Option<String>,
    main_built: u64,
    group_built: u64,
}

struct MainSink {
    target: OutputTarget,
    queue: BatchQueue,
    batch: Batch,
    built: u64,
}

impl MainSink {
    fn new(target: OutputTarget, queue: BatchQueue) -> Self {
        Self {
            target,
            queue,
            batch: Batch::starting_at(1),
            built: 0,
        }
    }
}

struct GroupSink {
    target: OutputTarget,
    key_column: usize,
    aggregator: GroupAggregator,
    queue: BatchQueue,
    batch: Batch,
    built: u64,
}

impl GroupSink {
    fn new(stage: GroupStage, queue: BatchQueue) -> Self {
        Self {
            target: stage.target,
            key_column: stage.key_column,
            aggregator: stage.aggregator,
            queue,
            batch: Batch::starting_at(1),
            built: 0,
        }
    }

    fn push(&mut self, doc: GroupDocument) {
        self.batch.push(group_header(&self.target, &doc), doc.body);
        self.built += 1;
    }
}

fn group_header(target: &OutputTarget, doc: &GroupDocument) -> String {
    BulkHeader::new(target.index.as_str(), target.doc_type.as_str())
        .with_id(doc.id())
        .render()
}

/// Hand the current batch to `queue` (if it has documents) and start a new
/// one at `last_line + 1`.
fn ship(
    queue: &BatchQueue,
    batch: &mut Batch,
    last_line: u64,
    bytes_read: u64,
    bytes_total: Option<u64>,
) -> Result<(), ExecError> {
    let mut full = std::mem::replace(batch, Batch::starting_at(last_line + 1));
    if full.is_empty() {
        return Ok(());
    }
    full.seal(last_line, bytes_read, bytes_total);
    queue.enqueue(full)
}

struct Producer<R> {
    lines: LineReader<R>,
    key_column: usize,
    builder: DocumentBuilder,
    joins: Option<MultiFileJoinReader>,
    augment: Option<Augment>,
    main: Option<MainSink>,
    group: Option<GroupSink>,
    lines_per_bulk: usize,
    groups_per_bulk: usize,
    counts: ProducerCounts,
}

impl<R: BufRead> Producer<R> {
    fn run(mut self) -> Result<ProducerCounts, ExecError> {
        let mut lines_in_batch = 0usize;
        while let Some(line) = self.lines.next_line()? {
            self.counts.lines_read += 1;
            lines_in_batch += 1;
            self.process(&line)?;

            if lines_in_batch >= self.lines_per_bulk {
                lines_in_batch = 0;
                if let Some(m) = self.main.as_mut() {
                    ship(
                        &m.queue,
                        &mut m.batch,
                        line.number,
                        self.lines.bytes_read(),
                        self.lines.bytes_total(),
                    )?;
                }
            }
            if let Some(g) = self.group.as_mut() {
                if g.batch.len() >= self.groups_per_bulk {
                    ship(
                        &g.queue,
                        &mut g.batch,
                        line.number,
                        self.lines.bytes_read(),
                        self.lines.bytes_total(),
                    )?;
                }
            }
        }

        let last = self.lines.line_no();
        let bytes_read = self.lines.bytes_read();
        let bytes_total = self.lines.bytes_total();
        if let Some(mut m) = self.main.take() {
            ship(&m.queue, &mut m.batch, last, bytes_read, bytes_total)?;
            self.counts.main_index = Some(m.target.index);
            self.counts.main_built = m.built;
        }
        if let Some(g) = self.group.take() {
            let GroupSink {
                target,
                aggregator,
                queue,
                mut batch,
                mut built,
                ..
            } = g;
            if let Some(doc) = aggregator.flush_final() {
                batch.push(group_header(&target, &doc), doc.body);
                built += 1;
            }
            ship(&queue, &mut batch, last, bytes_read, bytes_total)?;
            self.counts.group_built = built;
        }

        self.counts.bytes_read = bytes_read;
        self.counts.bytes_total = bytes_total.unwrap_or(bytes_read);
        debug!(
            file = %self.lines.name(),
            records = self.builder.records_seen(),
            field_errors = self.builder.field_errors(),
            "producer finished"
        );
        Ok(self.counts)
    }

    fn process(&mut self, line: &Line) -> Result<(), ExecError> {
        let Some(record) = self.builder.tokenize(&line.text) else {
            self.skip(line, "blank line");
            return Ok(());
        };
        let record = record.with_bytes(line.bytes);
        let Some(key) = record.key_at(self.key_column) else {
            self.skip(line, "key column is not an integer");
            return Ok(());
        };

        let joined = match self.joins.as_mut() {
            Some(joins) => joins.lookup(key)?,
            None => JoinedRecords::default(),
        };
        let doc = match &self.augment {
            Some(f) => {
                let extra = |r: &Record| f(r, &joined);
                self.builder
                    .build_at(&record, line.number, Some(&extra as &dyn Fn(&Record) -> String))
            }
            None => self.builder.build_at(&record, line.number, None),
        };

        if let Some(g) = self.group.as_mut() {
            match record.key_at(g.key_column) {
                Some(group_key) => {
                    if let Some(done) = g.aggregator.accept(group_key, &doc.body) {
                        g.push(done);
                    }
                }
                None => warn!(
                    line = line.number,
                    column = g.key_column,
                    "group key is not an integer, record left out of aggregate"
                ),
            }
        }
        if let Some(m) = self.main.as_mut() {
            let header = m.target.header_for(&record);
            m.batch.push(header, doc.body);
            m.built += 1;
        }
        Ok(())
    }

    fn skip(&mut self, line: &Line, reason: &str) {
        self.counts.lines_skipped += 1;
        // Line 1 is often a header row.
        if line.number > 1 {
            warn!(file = %self.lines.name(), line = line.number, reason, "skipping line");
        }
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
