//! YAML → `JobSpec` for flat and grouped indexing jobs.
//!
//! Example:
//! ```yaml
//! config:
//!   lines_per_bulk: 500
//! primary: data/ratings.dat
//! delimiter: double_colon
//! index: ratings
//! doc_type: rating
//! fields:
//!   - { name: UserID,    column: 0, type: string }
//!   - { name: MovieID,   column: 1, type: string }
//!   - { name: Rating,    column: 2, type: string }
//!   - { name: Timestamp, column: 3, type: timestamp, scale: 1000 }
//! group:
//!   index: user_ratings
//!   doc_type: user_ratings
//!   key_field: UserID
//!   members_field: ratings
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::config::IndexerConfig;
use crate::error::{Error, Result};
use crate::record::Delimiter;
use crate::schema::{DocumentSchema, FieldSpec};

fn yes() -> bool {
    true
}

/// Job-level overrides of `IndexerConfig`. Unset keys keep the env/default value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct JobConfig {
    pub lines_per_bulk: Option<usize>,
    pub groups_per_bulk: Option<usize>,
    pub queue_capacity: Option<usize>,
    pub group_flush_threshold: Option<usize>,
    pub store_url: Option<String>,
    pub report_progress: Option<bool>,
}

impl JobConfig {
    pub fn apply(&self, cfg: &mut IndexerConfig) {
        if let Some(v) = self.lines_per_bulk {
            cfg.lines_per_bulk = v;
        }
        if let Some(v) = self.groups_per_bulk {
            cfg.groups_per_bulk = v;
        }
        if let Some(v) = self.queue_capacity {
            cfg.queue_capacity = v;
        }
        if let Some(v) = self.group_flush_threshold {
            cfg.group_flush_threshold = Some(v);
        }
        if let Some(url) = &self.store_url {
            cfg.store_url = url.clone();
        }
        if let Some(v) = self.report_progress {
            cfg.report_progress = v;
        }
    }
}

/// Aggregate output: every run of records sharing `key_column` becomes one
/// nested document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupDef {
    pub index: String,
    pub doc_type: String,
    #[serde(default)]
    pub key_column: usize,
    pub key_field: String,
    pub members_field: String,
    #[serde(default)]
    pub flush_threshold: Option<usize>,
    #[serde(default)]
    pub mapping: Option<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSpec {
    #[serde(default)]
    pub config: JobConfig,
    pub primary: PathBuf,
    #[serde(default)]
    pub delimiter: Delimiter,
    pub index: String,
    pub doc_type: String,
    /// Column holding the record key; lines where it is not an integer are skipped.
    #[serde(default)]
    pub key_column: usize,
    /// Column used as the document `_id`; absent means store-assigned ids.
    #[serde(default)]
    pub id_column: Option<usize>,
    pub fields: Vec<FieldSpec>,
    #[serde(default)]
    pub mapping: Option<serde_json::Value>,
    /// Write per-record documents to `index`. Off for aggregate-only jobs.
    #[serde(default = "yes")]
    pub emit_main: bool,
    #[serde(default)]
    pub group: Option<GroupDef>,
}

impl JobSpec {
    pub fn schema(&self) -> DocumentSchema {
        DocumentSchema::new(self.fields.clone())
    }

    /// Resolve a relative `primary` against the directory of the job file.
    pub fn resolve_paths(&mut self, base: &Path) {
        if self.primary.is_relative() {
            self.primary = base.join(&self.primary);
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.primary.as_os_str().is_empty() {
            return Err(Error::Job("primary file is empty".into()));
        }
        if self.index.trim().is_empty() {
            return Err(Error::Job("index name is empty".into()));
        }
        if self.fields.is_empty() {
            return Err(Error::Job("at least one field is required".into()));
        }
        if let Some(dup) = first_duplicate(self.fields.iter().map(|f| f.name.as_str())) {
            return Err(Error::Job(format!("field '{dup}' is declared twice")));
        }
        if self.delimiter.as_str().is_empty() {
            return Err(Error::Job("delimiter is empty".into()));
        }
        match &self.group {
            Some(g) => {
                if g.index == self.index && self.emit_main {
                    return Err(Error::Job(format!(
                        "group index '{}' collides with the main index",
                        g.index
                    )));
                }
                if g.flush_threshold == Some(0) {
                    return Err(Error::Job("group flush_threshold must be at least 1".into()));
                }
            }
            None if !self.emit_main => {
                return Err(Error::Job("emit_main is off and no group output is defined".into()));
            }
            None => {}
        }
        Ok(())
    }
}

fn first_duplicate<'a>(names: impl Iterator<Item = &'a str>) -> Option<&'a str> {
    let mut seen = std::collections::HashSet::new();
    names.into_iter().find(|n| !seen.insert(*n))
}

/// Parse and validate a YAML job definition.
pub fn parse_yaml_job(yaml_src: &str) -> Result<JobSpec> {
    let job: JobSpec = serde_yaml::from_str(yaml_src)?;
    job.validate()?;
    Ok(job)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::FieldKind;

    const RATINGS: &str = r#"
config:
  lines_per_bulk: 500
primary: ratings.dat
delimiter: double_colon
index: ratings
doc_type: rating
fields:
  - { name: UserID, column: 0, type: string }
  - { name: Timestamp, column: 3, type: timestamp, scale: 1000 }
group:
  index: user_ratings
  doc_type: user_ratings
  key_field: UserID
  members_field: ratings
  flush_threshold: 200
"#;

    #[test]
    fn parses_grouped_job() {
        let job = parse_yaml_job(RATINGS).unwrap();
        assert_eq!(job.delimiter, Delimiter::DoubleColon);
        assert!(job.emit_main);
        assert_eq!(job.fields[1].kind, FieldKind::timestamp(1000));
        let g = job.group.as_ref().unwrap();
        assert_eq!(g.flush_threshold, Some(200));
        assert_eq!(g.key_column, 0);
    }

    #[test]
    fn job_config_overrides_defaults() {
        let job = parse_yaml_job(RATINGS).unwrap();
        let mut cfg = IndexerConfig::default();
        job.config.apply(&mut cfg);
        assert_eq!(cfg.lines_per_bulk, 500);
        assert_eq!(cfg.queue_capacity, 50);
    }

    #[test]
    fn rejects_group_on_main_index() {
        let yaml = RATINGS.replace("index: user_ratings", "index: ratings");
        assert!(matches!(parse_yaml_job(&yaml), Err(Error::Job(_))));
    }

    #[test]
    fn rejects_empty_fields() {
        let yaml = "primary: a.dat\nindex: a\ndoc_type: a\nfields: []\n";
        assert!(parse_yaml_job(yaml).is_err());
    }

    #[test]
    fn resolves_relative_primary() {
        let mut job = parse_yaml_job(RATINGS).unwrap();
        job.resolve_paths(Path::new("/data/ml"));
        assert_eq!(job.primary, PathBuf::from("/data/ml/ratings.dat"));
    }
}
