//! Forward-only line reading with byte accounting.
//!
//! The dataset files are read exactly once, front to back. `LineReader` keeps
//! the line counter used in diagnostics and the byte totals used in progress
//! reports. Lines that are not valid UTF-8 are decoded as Latin-1, which is
//! what the hetrec files ship in.

use std::borrow::Cow;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Read};
use std::path::Path;

use crate::error::{Error, Result};

/// Default read buffer for dataset files.
pub const DEFAULT_BUF_CAPACITY: usize = 64 * 1024;

/// One physical line of input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Line {
    /// 1-based line number.
    pub number: u64,
    /// Decoded text without the line terminator.
    pub text: String,
    /// Bytes the line occupied on disk, terminator included.
    pub bytes: usize,
}

pub struct LineReader<R> {
    inner: R,
    name: String,
    buf: Vec<u8>,
    line_no: u64,
    bytes_read: u64,
    bytes_total: Option<u64>,
}

impl LineReader<BufReader<File>> {
    /// Open `path` for reading. A missing or unreadable file is fatal for the caller.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let open_err = |source| Error::Open {
            path: path.display().to_string(),
            source,
        };
        let file = File::open(path).map_err(open_err)?;
        let total = file.metadata().map_err(open_err)?.len();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Ok(Self::from_reader(name, BufReader::with_capacity(DEFAULT_BUF_CAPACITY, file))
            .with_total(total))
    }
}

impl<R: Read> LineReader<BufReader<R>> {
    pub fn with_capacity(name: impl Into<String>, capacity: usize, reader: R) -> Self {
        Self::from_reader(name, BufReader::with_capacity(capacity, reader))
    }
}

impl<R: BufRead> LineReader<R> {
    pub fn from_reader(name: impl Into<String>, inner: R) -> Self {
        Self {
            inner,
            name: name.into(),
            buf: Vec::new(),
            line_no: 0,
            bytes_read: 0,
            bytes_total: None,
        }
    }

    pub fn with_total(mut self, total: u64) -> Self {
        self.bytes_total = Some(total);
        self
    }

    /// Next line, or `None` at end of input.
    pub fn next_line(&mut self) -> io::Result<Option<Line>> {
        self.buf.clear();
        let n = self.inner.read_until(b'\n', &mut self.buf)?;
        if n == 0 {
            return Ok(None);
        }
        self.line_no += 1;
        self.bytes_read += n as u64;

        let mut end = self.buf.len();
        while end > 0 && matches!(self.buf[end - 1], b'\n' | b'\r') {
            end -= 1;
        }
        Ok(Some(Line {
            number: self.line_no,
            text: decode_line(&self.buf[..end]).into_owned(),
            bytes: n,
        }))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of lines consumed so far.
    pub fn line_no(&self) -> u64 {
        self.line_no
    }

    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }

    /// Size of the underlying file, when known.
    pub fn bytes_total(&self) -> Option<u64> {
        self.bytes_total
    }
}

/// UTF-8 when valid, otherwise Latin-1 (every byte maps to the same code point).
pub fn decode_line(bytes: &[u8]) -> Cow<'_, str> {
    match std::str::from_utf8(bytes) {
        Ok(s) => Cow::Borrowed(s),
        Err(_) => Cow::Owned(bytes.iter().map(|&b| b as char).collect()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn counts_lines_and_bytes() {
        let mut r = LineReader::from_reader("mem", Cursor::new(b"a\tb\r\nc\n\nd".to_vec()));
        let first = r.next_line().unwrap().unwrap();
        assert_eq!(first.text, "a\tb");
        assert_eq!(first.bytes, 5);
        assert_eq!(r.next_line().unwrap().unwrap().text, "c");
        let blank = r.next_line().unwrap().unwrap();
        assert_eq!((blank.number, blank.text.as_str()), (3, ""));
        let last = r.next_line().unwrap().unwrap();
        assert_eq!((last.number, last.bytes), (4, 1));
        assert!(r.next_line().unwrap().is_none());
        assert_eq!(r.bytes_read(), 9);
    }

    #[test]
    fn latin1_fallback() {
        assert_eq!(decode_line(b"Am\xe9lie"), "Amélie");
        assert_eq!(decode_line("Amélie".as_bytes()), "Amélie");
    }

    #[test]
    fn open_missing_file_is_an_open_error() {
        let err = LineReader::open("/definitely/not/here.dat").err().unwrap();
        assert!(matches!(err, Error::Open { .. }));
    }

    #[test]
    fn open_reports_total_size() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("movies.dat");
        std::fs::write(&p, "1\tx\n2\ty\n").unwrap();
        let r = LineReader::open(&p).unwrap();
        assert_eq!(r.bytes_total(), Some(8));
        assert_eq!(r.name(), "movies.dat");
    }
}
