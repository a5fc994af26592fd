//! Sequential cursor over one key-sorted delimited file.
//!
//! Precondition: the first column is an integer key, non-decreasing across
//! lines. Violations are not detected; they produce wrong joins.

use std::cmp::Ordering;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use lensdex_core::record::{Delimiter, Record};

use crate::error::Result;
use crate::lines::LineReader;

/// All records for one key, contiguous and in file order. May be empty.
pub type JoinResult = Vec<Record>;

pub struct SortedFileCursor<R = BufReader<File>> {
    lines: LineReader<R>,
    delimiter: Delimiter,
    /// Record read past the end of the previous query, with its key.
    pushback: Option<(i64, Record)>,
}

impl SortedFileCursor<BufReader<File>> {
    pub fn open<P: AsRef<Path>>(path: P, delimiter: Delimiter) -> Result<Self> {
        Ok(Self::new(LineReader::open(path)?, delimiter))
    }
}

impl<R: BufRead> SortedFileCursor<R> {
    pub fn new(lines: LineReader<R>, delimiter: Delimiter) -> Self {
        Self {
            lines,
            delimiter,
            pushback: None,
        }
    }

    pub fn from_reader(name: impl Into<String>, reader: R, delimiter: Delimiter) -> Self {
        Self::new(LineReader::from_reader(name, reader), delimiter)
    }

    /// Return the run of records whose key equals `key`.
    ///
    /// Keys must be queried in non-decreasing order; the cursor never rewinds.
    /// The first record with a larger key is held back for the next query.
    /// Records with a smaller key belong to no future query and are dropped.
    pub fn records_for_key(&mut self, key: i64) -> Result<JoinResult> {
        let mut out = Vec::new();

        if let Some((k, rec)) = self.pushback.take() {
            match k.cmp(&key) {
                Ordering::Equal => out.push(rec),
                Ordering::Greater => {
                    self.pushback = Some((k, rec));
                    return Ok(out);
                }
                Ordering::Less => {
                    tracing::debug!(file = %self.lines.name(), key = k, "dropping unmatched record");
                }
            }
        }

        while let Some(line) = self.lines.next_line()? {
            let rec = Record::parse(&line.text, &self.delimiter).with_bytes(line.bytes);
            let Some(k) = rec.key() else {
                // The first line may be a header; stay quiet about it.
                if line.number > 1 {
                    tracing::warn!(
                        file = %self.lines.name(),
                        line = line.number,
                        "error parsing line, skipping"
                    );
                }
                continue;
            };
            match k.cmp(&key) {
                Ordering::Equal => out.push(rec),
                Ordering::Less => {
                    tracing::debug!(file = %self.lines.name(), line = line.number, key = k, "dropping unmatched record");
                }
                Ordering::Greater => {
                    self.pushback = Some((k, rec));
                    break;
                }
            }
        }
        Ok(out)
    }

    pub fn name(&self) -> &str {
        self.lines.name()
    }

    /// Lines consumed from the file so far.
    pub fn line_no(&self) -> u64 {
        self.lines.line_no()
    }

    /// Key of the held-back record, if any.
    pub fn pushback_key(&self) -> Option<i64> {
        self.pushback.as_ref().map(|(k, _)| *k)
    }
}
