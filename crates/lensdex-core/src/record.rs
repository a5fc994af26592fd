//! Delimited records: one line of a dataset file split into string fields.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Field separator of a dataset family.
///
/// MovieLens files use `::`, the hetrec files use tabs. In job files it is
/// written as `tab`, `double_colon`, a literal separator, or `{ custom: "," }`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "DelimiterRepr", into = "DelimiterRepr")]
pub enum Delimiter {
    #[default]
    Tab,
    DoubleColon,
    Custom(String),
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum DelimiterRepr {
    Name(String),
    Custom { custom: String },
}

impl From<DelimiterRepr> for Delimiter {
    fn from(repr: DelimiterRepr) -> Self {
        match repr {
            DelimiterRepr::Name(name) => match name.as_str() {
                "tab" | "\t" => Delimiter::Tab,
                "double_colon" | "::" => Delimiter::DoubleColon,
                _ => Delimiter::Custom(name),
            },
            DelimiterRepr::Custom { custom } => Delimiter::Custom(custom),
        }
    }
}

impl From<Delimiter> for DelimiterRepr {
    fn from(delim: Delimiter) -> Self {
        match delim {
            Delimiter::Tab => DelimiterRepr::Name("tab".into()),
            Delimiter::DoubleColon => DelimiterRepr::Name("double_colon".into()),
            Delimiter::Custom(custom) => DelimiterRepr::Custom { custom },
        }
    }
}

impl Delimiter {
    pub fn as_str(&self) -> &str {
        match self {
            Delimiter::Tab => "\t",
            Delimiter::DoubleColon => "::",
            Delimiter::Custom(s) => s.as_str(),
        }
    }
}

impl fmt::Display for Delimiter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Delimiter::Tab => f.write_str("\\t"),
            other => f.write_str(other.as_str()),
        }
    }
}

/// Ordered string fields parsed from one line.
///
/// `bytes` is the size the line occupied in its source file (terminator
/// included) and only feeds progress accounting.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Record {
    fields: Vec<String>,
    #[serde(default)]
    bytes: usize,
}

impl Record {
    /// Split `line` on `delim`. Trailing `\r`/`\n` are not part of any field.
    pub fn parse(line: &str, delim: &Delimiter) -> Self {
        let bytes = line.len();
        let body = line.trim_end_matches(['\r', '\n']);
        let sep = delim.as_str();
        let fields = if sep.is_empty() {
            vec![body.to_string()]
        } else {
            body.split(sep).map(str::to_string).collect()
        };
        Self { fields, bytes }
    }

    pub fn from_fields<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fields: fields.into_iter().map(Into::into).collect(),
            bytes: 0,
        }
    }

    pub fn with_bytes(mut self, bytes: usize) -> Self {
        self.bytes = bytes;
        self
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    pub fn field(&self, idx: usize) -> Option<&str> {
        self.fields.get(idx).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn bytes(&self) -> usize {
        self.bytes
    }

    /// Integer key stored in column `col`, if present and parsable.
    pub fn key_at(&self, col: usize) -> Option<i64> {
        self.field(col).and_then(|s| s.trim().parse::<i64>().ok())
    }

    /// Join key: the first field as an integer.
    pub fn key(&self) -> Option<i64> {
        self.key_at(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_tab_line_strips_terminator() {
        let r = Record::parse("7\tA\tfoo\r\n", &Delimiter::Tab);
        assert_eq!(r.fields(), ["7", "A", "foo"]);
        assert_eq!(r.bytes(), 9);
        assert_eq!(r.key(), Some(7));
    }

    #[test]
    fn parse_double_colon_line() {
        let r = Record::parse("1::Toy Story (1995)::Animation|Comedy\n", &Delimiter::DoubleColon);
        assert_eq!(r.len(), 3);
        assert_eq!(r.field(1), Some("Toy Story (1995)"));
    }

    #[test]
    fn key_rejects_non_numeric() {
        let r = Record::parse("id\tname", &Delimiter::Tab);
        assert_eq!(r.key(), None);
        assert_eq!(r.key_at(5), None);
    }

    #[test]
    fn delimiter_deserializes_from_yaml_names() {
        let d: Delimiter = serde_yaml::from_str("double_colon").unwrap();
        assert_eq!(d, Delimiter::DoubleColon);
        let d: Delimiter = serde_yaml::from_str("custom: \";\"").unwrap();
        assert_eq!(d.as_str(), ";");
        let d: Delimiter = serde_yaml::from_str("\"|\"").unwrap();
        assert_eq!(d, Delimiter::Custom("|".into()));
        let d: Delimiter = serde_yaml::from_str("\"\\t\"").unwrap();
        assert_eq!(d, Delimiter::Tab);
    }

    #[test]
    fn delimiter_yaml_form_survives_a_rewrite() {
        for d in [Delimiter::Tab, Delimiter::DoubleColon, Delimiter::Custom(",".into())] {
            let text = serde_yaml::to_string(&d).unwrap();
            assert_eq!(serde_yaml::from_str::<Delimiter>(&text).unwrap(), d);
        }
    }
}
