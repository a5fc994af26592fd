//! Side lookup tables (e.g. tag id → tag name) loaded before the main pass.

use std::collections::HashMap;
use std::path::Path;

use lensdex_core::record::{Delimiter, Record};

use crate::error::Result;
use crate::lines::LineReader;

#[derive(Debug, Clone, Default)]
pub struct SideMap {
    entries: HashMap<i64, String>,
    /// 1-based numbers of lines that could not be parsed.
    pub skipped: Vec<u64>,
}

impl SideMap {
    pub fn get(&self, key: i64) -> Option<&str> {
        self.entries.get(&key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(i64, String)> for SideMap {
    fn from_iter<T: IntoIterator<Item = (i64, String)>>(iter: T) -> Self {
        Self {
            entries: iter.into_iter().collect(),
            skipped: Vec::new(),
        }
    }
}

/// Load `key_col` → `value_col` from a whole file.
pub fn load_side_map<P: AsRef<Path>>(
    path: P,
    delimiter: &Delimiter,
    key_col: usize,
    value_col: usize,
) -> Result<SideMap> {
    let mut lines = LineReader::open(path)?;
    let mut map = SideMap::default();
    while let Some(line) = lines.next_line()? {
        let rec = Record::parse(&line.text, delimiter);
        match (rec.key_at(key_col), rec.field(value_col)) {
            (Some(k), Some(v)) => {
                map.entries.insert(k, v.to_string());
            }
            _ => map.skipped.push(line.number),
        }
    }
    tracing::debug!(
        file = %lines.name(),
        entries = map.len(),
        skipped = map.skipped.len(),
        "loaded side map"
    );
    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_pairs_and_reports_skips() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("tags.dat");
        std::fs::write(&p, "id\tvalue\n1\tearth\n2\tpolice\nbad\n").unwrap();
        let m = load_side_map(&p, &Delimiter::Tab, 0, 1).unwrap();
        assert_eq!(m.len(), 2);
        assert_eq!(m.get(2), Some("police"));
        assert_eq!(m.skipped, vec![1, 4]);
    }
}
