//! Field-type tables for the document builder. Pure data; no encoding here.

use serde::{Deserialize, Serialize};

fn default_scale() -> i64 {
    1
}

/// How a raw field value is encoded into the document body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FieldKind {
    /// JSON string.
    String,
    /// JSON array of strings, split on `delimiter`.
    List { delimiter: String },
    /// Unquoted number multiplied by `scale` (1000 turns seconds into millis).
    Timestamp {
        #[serde(default = "default_scale")]
        scale: i64,
    },
}

impl FieldKind {
    pub fn list(delimiter: impl Into<String>) -> Self {
        FieldKind::List {
            delimiter: delimiter.into(),
        }
    }

    pub fn timestamp(scale: i64) -> Self {
        FieldKind::Timestamp { scale }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    /// Source column in the parsed record.
    pub column: usize,
    #[serde(flatten)]
    pub kind: FieldKind,
}

impl FieldSpec {
    pub fn new(name: impl Into<String>, column: usize, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            column,
            kind,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DocumentSchema {
    pub fields: Vec<FieldSpec>,
}

impl DocumentSchema {
    pub fn new(fields: Vec<FieldSpec>) -> Self {
        Self { fields }
    }

    /// Schema whose fields map onto columns 0, 1, 2, ... in order.
    pub fn positional<S: Into<String>>(fields: impl IntoIterator<Item = (S, FieldKind)>) -> Self {
        Self::new(
            fields
                .into_iter()
                .enumerate()
                .map(|(column, (name, kind))| FieldSpec::new(name, column, kind))
                .collect(),
        )
    }

    pub fn field(&self, idx: usize) -> Option<&FieldSpec> {
        self.fields.get(idx)
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn positional_assigns_columns_in_order() {
        let s = DocumentSchema::positional([
            ("UserID", FieldKind::String),
            ("Timestamp", FieldKind::timestamp(1000)),
        ]);
        assert_eq!(s.fields[1].column, 1);
        assert_eq!(s.index_of("Timestamp"), Some(1));
    }

    #[test]
    fn field_spec_reads_flattened_kind() {
        let spec: FieldSpec =
            serde_yaml::from_str("{name: Genres, column: 2, type: list, delimiter: \"|\"}").unwrap();
        assert_eq!(spec.kind, FieldKind::list("|"));

        let spec: FieldSpec = serde_yaml::from_str("{name: ts, column: 3, type: timestamp}").unwrap();
        assert_eq!(spec.kind, FieldKind::Timestamp { scale: 1 });
    }
}
