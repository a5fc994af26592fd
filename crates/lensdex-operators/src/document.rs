//! Records → JSON document bodies.
//!
//! Each configured field is encoded by its `FieldKind`. A field that cannot be
//! encoded falls back to an empty value (`""` or `[]`) and the rest of the
//! document still assembles. An optional augmentation closure contributes
//! extra members (already valid JSON member text) before the closing brace.

use std::collections::HashSet;

use serde_json::Value;

use lensdex_core::record::{Delimiter, Record};
use lensdex_core::schema::{DocumentSchema, FieldKind};

use crate::error::{FieldError, OpError};

/// A serialized document body plus the source bytes it consumed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuiltDocument {
    pub body: String,
    pub bytes: usize,
}

pub struct DocumentBuilder {
    schema: DocumentSchema,
    delimiter: Delimiter,
    /// Pre-escaped `"name":` prefixes, one per schema field.
    keys: Vec<String>,
    records_seen: u64,
    field_errors: u64,
}

impl DocumentBuilder {
    pub fn new(schema: DocumentSchema, delimiter: Delimiter) -> Result<Self, OpError> {
        let mut seen = HashSet::new();
        for f in &schema.fields {
            if !seen.insert(f.name.as_str()) {
                return Err(OpError::Build(format!("field '{}' declared twice", f.name)));
            }
            if let FieldKind::List { delimiter } = &f.kind {
                if delimiter.is_empty() {
                    return Err(OpError::Build(format!(
                        "list field '{}' has an empty delimiter",
                        f.name
                    )));
                }
            }
        }
        let keys = schema
            .fields
            .iter()
            .map(|f| format!("{}:", Value::from(f.name.as_str())))
            .collect();
        Ok(Self {
            schema,
            delimiter,
            keys,
            records_seen: 0,
            field_errors: 0,
        })
    }

    pub fn schema(&self) -> &DocumentSchema {
        &self.schema
    }

    pub fn delimiter(&self) -> &Delimiter {
        &self.delimiter
    }

    pub fn records_seen(&self) -> u64 {
        self.records_seen
    }

    /// Fields that fell back to an empty value so far.
    pub fn field_errors(&self) -> u64 {
        self.field_errors
    }

    /// Split a raw line into a record. Blank lines cannot be tokenized.
    pub fn tokenize(&self, line: &str) -> Option<Record> {
        if line.trim().is_empty() {
            return None;
        }
        Some(Record::parse(line, &self.delimiter))
    }

    /// Encode `record`; `augment` sees the full raw record after the schema fields.
    pub fn build(
        &mut self,
        record: &Record,
        augment: Option<&dyn Fn(&Record) -> String>,
    ) -> BuiltDocument {
        let line = self.records_seen + 1;
        self.build_at(record, line, augment)
    }

    /// Like `build`, for a record read from source line `line`. Field errors on
    /// line 1 are counted but not logged, since that is usually a header.
    pub fn build_at(
        &mut self,
        record: &Record,
        line: u64,
        augment: Option<&dyn Fn(&Record) -> String>,
    ) -> BuiltDocument {
        self.records_seen += 1;

        let mut body = String::with_capacity(64 + record.bytes() * 2);
        body.push('{');
        for (i, (spec, key)) in self.schema.fields.iter().zip(&self.keys).enumerate() {
            if i > 0 {
                body.push(',');
            }
            body.push_str(key);
            match encode_field(&spec.kind, record.field(spec.column), spec.column) {
                Ok(v) => body.push_str(&v),
                Err(e) => {
                    self.field_errors += 1;
                    if line > 1 {
                        tracing::warn!(
                            field = %spec.name,
                            line,
                            error = %e,
                            "field encoding failed, substituting empty value"
                        );
                    }
                    body.push_str(empty_value(&spec.kind));
                }
            }
        }
        if let Some(f) = augment {
            let extra = f(record);
            if !extra.is_empty() {
                if !self.schema.is_empty() {
                    body.push(',');
                }
                body.push_str(&extra);
            }
        }
        body.push('}');

        BuiltDocument {
            body,
            bytes: record.bytes(),
        }
    }

    /// Tokenize and build in one step; `None` when the line cannot be tokenized.
    pub fn build_line(
        &mut self,
        line: &str,
        augment: Option<&dyn Fn(&Record) -> String>,
    ) -> Option<BuiltDocument> {
        let record = self.tokenize(line)?;
        Some(self.build(&record, augment))
    }
}

/// Encode one raw value by kind.
pub fn encode_field(kind: &FieldKind, raw: Option<&str>, column: usize) -> Result<String, FieldError> {
    let raw = raw.ok_or(FieldError::Missing(column))?;
    match kind {
        FieldKind::String => Ok(Value::from(raw).to_string()),
        FieldKind::List { .. } if raw.is_empty() => Ok("[]".to_string()),
        FieldKind::List { delimiter } => Ok(encode_list(raw.split(delimiter.as_str()))),
        FieldKind::Timestamp { scale } => encode_scaled(raw, *scale),
    }
}

/// JSON array of strings. Empty items are kept in place.
pub fn encode_list<'a>(items: impl IntoIterator<Item = &'a str>) -> String {
    let arr: Vec<Value> = items.into_iter().map(Value::from).collect();
    Value::Array(arr).to_string()
}

fn encode_scaled(raw: &str, scale: i64) -> Result<String, FieldError> {
    let raw = raw.trim();
    if let Ok(v) = raw.parse::<i64>() {
        return v
            .checked_mul(scale)
            .map(|n| n.to_string())
            .ok_or_else(|| FieldError::Overflow(raw.to_string()));
    }
    let v: f64 = raw.parse().map_err(|_| FieldError::NotNumeric {
        value: raw.to_string(),
    })?;
    serde_json::Number::from_f64(v * scale as f64)
        .map(|n| n.to_string())
        .ok_or_else(|| FieldError::Overflow(raw.to_string()))
}

fn empty_value(kind: &FieldKind) -> &'static str {
    match kind {
        FieldKind::List { .. } => "[]",
        FieldKind::String | FieldKind::Timestamp { .. } => "\"\"",
    }
}
