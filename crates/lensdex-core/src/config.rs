//! Indexer configuration that downstream crates can serialize/deserialize.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexerConfig {
    /// Primary-file lines per bulk write (skipped lines count too).
    pub lines_per_bulk: usize,

    /// Aggregate documents per bulk write on a grouped output.
    pub groups_per_bulk: usize,

    /// Max number of batches waiting for a writer. The producer blocks beyond this.
    pub queue_capacity: usize,

    /// Members per group after which a partial aggregate document is emitted.
    pub group_flush_threshold: Option<usize>,

    /// Index store endpoint (`http://`, `file://` or `memory://`).
    pub store_url: String,

    /// Log a progress line after every successful bulk write.
    pub report_progress: bool,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            lines_per_bulk: 1000,
            groups_per_bulk: 100,
            queue_capacity: 50,
            group_flush_threshold: None,
            store_url: "http://127.0.0.1:9200".to_string(),
            report_progress: true,
        }
    }
}

impl IndexerConfig {
    /// Create a config from environment variables, falling back to defaults.
    ///
    /// Environment variables:
    /// - `LENSDEX_LINES_PER_BULK`: primary lines per bulk write
    /// - `LENSDEX_GROUPS_PER_BULK`: aggregate documents per bulk write
    /// - `LENSDEX_QUEUE_CAPACITY`: bounded queue capacity (batches)
    /// - `LENSDEX_GROUP_FLUSH_THRESHOLD`: members per sub-batch flush
    /// - `LENSDEX_STORE_URL`: index store endpoint
    /// - `LENSDEX_PROGRESS`: `false`/`0` disables progress lines
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Ok(s) = std::env::var("LENSDEX_LINES_PER_BULK") {
            if let Ok(v) = s.parse::<usize>() {
                cfg.lines_per_bulk = v;
            }
        }

        if let Ok(s) = std::env::var("LENSDEX_GROUPS_PER_BULK") {
            if let Ok(v) = s.parse::<usize>() {
                cfg.groups_per_bulk = v;
            }
        }

        if let Ok(s) = std::env::var("LENSDEX_QUEUE_CAPACITY") {
            if let Ok(v) = s.parse::<usize>() {
                cfg.queue_capacity = v;
            }
        }

        if let Ok(s) = std::env::var("LENSDEX_GROUP_FLUSH_THRESHOLD") {
            if let Ok(v) = s.parse::<usize>() {
                cfg.group_flush_threshold = Some(v);
            }
        }

        if let Ok(s) = std::env::var("LENSDEX_STORE_URL") {
            cfg.store_url = s;
        }

        if let Ok(s) = std::env::var("LENSDEX_PROGRESS") {
            cfg.report_progress = !matches!(s.trim(), "0" | "false" | "no" | "off");
        }

        cfg
    }

    /// Reject settings the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.lines_per_bulk == 0 {
            return Err(Error::Config("lines_per_bulk must be at least 1".into()));
        }
        if self.groups_per_bulk == 0 {
            return Err(Error::Config("groups_per_bulk must be at least 1".into()));
        }
        if self.queue_capacity == 0 {
            return Err(Error::Config("queue_capacity must be at least 1".into()));
        }
        if self.group_flush_threshold == Some(0) {
            return Err(Error::Config("group_flush_threshold must be at least 1".into()));
        }
        Ok(())
    }

    /// Scheme of `store_url`, e.g. `http` or `file`.
    pub fn store_scheme(&self) -> Option<&str> {
        self.store_url
            .split_once("://")
            .map(|(scheme, _)| scheme.trim())
            .filter(|s| !s.is_empty())
    }
}
