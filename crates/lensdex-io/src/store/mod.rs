//! Index store adapters.
//!
//! - `http`: Elasticsearch-style REST endpoint (default).
//! - `fs`: writes every bulk payload to an NDJSON file (dry runs, debugging).
//! - `memory`: in-process store used by tests, with failure injection.
//!
//! `build_store` picks the backend from the URL scheme
//! (e.g. `http://127.0.0.1:9200`, `file:///tmp/out`, `memory://`).

mod fs;
mod http;
mod memory;

pub use fs::FsIndexStore;
pub use http::HttpIndexStore;
pub use memory::MemoryIndexStore;

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use url::Url;

use crate::error::{Error, Result};

/// The slice of a document index store the pipeline consumes.
#[async_trait]
pub trait IndexStore: Send + Sync {
    async fn create(&self, index: &str) -> Result<()>;

    /// Delete `index`. Deleting an index that does not exist is not an error.
    async fn delete(&self, index: &str) -> Result<()>;

    async fn put_mapping(
        &self,
        index: &str,
        doc_type: &str,
        mapping: &serde_json::Value,
    ) -> Result<()>;

    /// Send one newline-delimited bulk payload (header line + body line per document).
    ///
    /// `Error::Rejected` means the remaining documents of the payload were stored.
    async fn bulk(&self, payload: &str) -> Result<()>;

    /// Force pending writes to be durable/visible. Stores without the notion do nothing.
    async fn flush(&self) -> Result<()> {
        Ok(())
    }

    /// Short human-readable description for logs.
    fn describe(&self) -> String;
}

/// Build the correct store backend for `url`.
pub fn build_store(url: &str) -> Result<Arc<dyn IndexStore>> {
    let parsed = Url::parse(url).map_err(|e| Error::Url(format!("{url}: {e}")))?;
    match parsed.scheme() {
        "http" | "https" => Ok(Arc::new(HttpIndexStore::new(url)?)),
        "file" => {
            let root = parsed
                .to_file_path()
                .ok()
                .or_else(|| url.strip_prefix("file://").map(PathBuf::from))
                .filter(|p| !p.as_os_str().is_empty())
                .ok_or_else(|| Error::Url(format!("{url}: no directory given")))?;
            Ok(Arc::new(FsIndexStore::new(root)))
        }
        "memory" => Ok(Arc::new(MemoryIndexStore::new())),
        other => Err(Error::Url(format!("unsupported store scheme '{other}'"))),
    }
}

/// Split a bulk payload into `(header, body)` line pairs.
pub fn payload_pairs(payload: &str) -> impl Iterator<Item = (&str, &str)> {
    let mut lines = payload.lines().filter(|l| !l.trim().is_empty());
    std::iter::from_fn(move || {
        let header = lines.next()?;
        let body = lines.next()?;
        Some((header, body))
    })
}
