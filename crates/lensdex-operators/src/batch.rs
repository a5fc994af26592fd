//! Bulk batches: header/body pairs plus the progress accounting the writer reports.

use serde_json::Value;

/// Bulk action header naming the target index, document type and optional id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkHeader {
    pub index: String,
    pub doc_type: String,
    pub id: Option<String>,
}

impl BulkHeader {
    pub fn new(index: impl Into<String>, doc_type: impl Into<String>) -> Self {
        Self {
            index: index.into(),
            doc_type: doc_type.into(),
            id: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// `{"index":{"_index":..,"_type":..[,"_id":..]}}`
    pub fn render(&self) -> String {
        let mut out = format!(
            "{{\"index\":{{\"_index\":{},\"_type\":{}",
            Value::from(self.index.as_str()),
            Value::from(self.doc_type.as_str())
        );
        if let Some(id) = &self.id {
            out.push_str(",\"_id\":");
            out.push_str(&Value::from(id.as_str()).to_string());
        }
        out.push_str("}}");
        out
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub header: String,
    pub body: String,
}

/// Documents bound for one bulk call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Batch {
    docs: Vec<Document>,
    first_line: u64,
    last_line: u64,
    bytes_read: u64,
    bytes_total: Option<u64>,
}

impl Batch {
    /// Empty batch whose first covered primary line is `first_line`.
    pub fn starting_at(first_line: u64) -> Self {
        Self {
            first_line,
            last_line: first_line.saturating_sub(1),
            ..Default::default()
        }
    }

    pub fn push(&mut self, header: String, body: String) {
        self.docs.push(Document { header, body });
    }

    /// Record how far into the primary file this batch reaches.
    pub fn seal(&mut self, last_line: u64, bytes_read: u64, bytes_total: Option<u64>) {
        self.last_line = last_line;
        self.bytes_read = bytes_read;
        self.bytes_total = bytes_total;
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    pub fn documents(&self) -> &[Document] {
        &self.docs
    }

    /// Inclusive primary line range covered by this batch.
    pub fn line_range(&self) -> (u64, u64) {
        (self.first_line, self.last_line)
    }

    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }

    pub fn bytes_total(&self) -> Option<u64> {
        self.bytes_total
    }

    /// Newline-delimited bulk body: header line, body line, per document.
    pub fn payload(&self) -> String {
        let size: usize = self
            .docs
            .iter()
            .map(|d| d.header.len() + d.body.len() + 2)
            .sum();
        let mut out = String::with_capacity(size);
        for d in &self.docs {
            out.push_str(&d.header);
            out.push('\n');
            out.push_str(&d.body);
            out.push('\n');
        }
        out
    }
}
