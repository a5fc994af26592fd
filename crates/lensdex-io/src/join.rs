//! Merge-join reader: one `SortedFileCursor` per auxiliary relation, all
//! driven by the key sequence of the primary file.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use lensdex_core::record::{Delimiter, Record};

use crate::cursor::{JoinResult, SortedFileCursor};
use crate::error::Result;

/// Per-relation join results for one primary key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JoinedRecords {
    by_relation: BTreeMap<String, JoinResult>,
}

impl JoinedRecords {
    pub fn insert(&mut self, relation: impl Into<String>, records: JoinResult) {
        self.by_relation.insert(relation.into(), records);
    }

    /// Records for `relation`; empty when it had no match or is unknown.
    pub fn get(&self, relation: &str) -> &[Record] {
        self.by_relation
            .get(relation)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn first(&self, relation: &str) -> Option<&Record> {
        self.get(relation).first()
    }

    /// Column `col` of every record in `relation`, skipping records too short to have it.
    pub fn column<'a>(&'a self, relation: &str, col: usize) -> impl Iterator<Item = &'a str> + 'a {
        self.get(relation).iter().filter_map(move |r| r.field(col))
    }

    pub fn relations(&self) -> impl Iterator<Item = &str> {
        self.by_relation.keys().map(String::as_str)
    }

    /// True when no relation matched anything.
    pub fn is_empty(&self) -> bool {
        self.by_relation.values().all(Vec::is_empty)
    }
}

pub struct MultiFileJoinReader<R = BufReader<File>> {
    cursors: Vec<(String, SortedFileCursor<R>)>,
}

impl MultiFileJoinReader<BufReader<File>> {
    /// Open one cursor per `(relation, path)`. Any missing file is fatal.
    pub fn open<I, S, P>(relations: I, delimiter: Delimiter) -> Result<Self>
    where
        I: IntoIterator<Item = (S, P)>,
        S: Into<String>,
        P: AsRef<Path>,
    {
        let mut reader = Self::new();
        for (name, path) in relations {
            reader.add(name, SortedFileCursor::open(path, delimiter.clone())?);
        }
        Ok(reader)
    }
}

impl<R: BufRead> MultiFileJoinReader<R> {
    pub fn new() -> Self {
        Self {
            cursors: Vec::new(),
        }
    }

    pub fn add(&mut self, relation: impl Into<String>, cursor: SortedFileCursor<R>) {
        self.cursors.push((relation.into(), cursor));
    }

    /// Advance every cursor to `key` and collect its run.
    pub fn lookup(&mut self, key: i64) -> Result<JoinedRecords> {
        let mut joined = JoinedRecords::default();
        for (name, cursor) in &mut self.cursors {
            joined.insert(name.clone(), cursor.records_for_key(key)?);
        }
        Ok(joined)
    }

    pub fn relations(&self) -> impl Iterator<Item = &str> {
        self.cursors.iter().map(|(n, _)| n.as_str())
    }

    pub fn len(&self) -> usize {
        self.cursors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cursors.is_empty()
    }
}

impl<R: BufRead> Default for MultiFileJoinReader<R> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn rel(src: &str) -> SortedFileCursor<Cursor<Vec<u8>>> {
        SortedFileCursor::from_reader("rel", Cursor::new(src.as_bytes().to_vec()), Delimiter::Tab)
    }

    #[test]
    fn cursors_advance_independently() {
        let mut j = MultiFileJoinReader::new();
        j.add("genres", rel("1\tComedy\n1\tDrama\n3\tHorror\n"));
        j.add("countries", rel("2\tUSA\n3\tFrance\n"));

        let one = j.lookup(1).unwrap();
        assert_eq!(one.column("genres", 1).collect::<Vec<_>>(), ["Comedy", "Drama"]);
        assert!(one.get("countries").is_empty());

        let two = j.lookup(2).unwrap();
        assert!(two.get("genres").is_empty());
        assert_eq!(two.first("countries").and_then(|r| r.field(1)), Some("USA"));

        let three = j.lookup(3).unwrap();
        assert_eq!(three.get("genres").len(), 1);
        assert_eq!(three.get("countries").len(), 1);
        assert!(j.lookup(4).unwrap().is_empty());
    }

    #[test]
    fn unknown_relation_is_empty() {
        let joined = JoinedRecords::default();
        assert!(joined.get("actors").is_empty());
        assert!(joined.first("actors").is_none());
    }

    #[test]
    fn open_fails_on_missing_relation() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.dat"), "1\tx\n").unwrap();
        let res = MultiFileJoinReader::open(
            [("a", dir.path().join("a.dat")), ("b", dir.path().join("b.dat"))],
            Delimiter::Tab,
        );
        assert!(res.is_err());
    }
}
