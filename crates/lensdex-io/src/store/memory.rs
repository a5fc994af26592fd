//! In-memory index store for tests.
//!
//! Records every call so tests can assert on exactly what reached the store.
//! `fail_bulk_call(n)` makes the n-th bulk call (1-based) fail.

use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use super::{payload_pairs, IndexStore};
use crate::error::{Error, Result};

#[derive(Default)]
struct Inner {
    indices: BTreeMap<String, Option<(String, serde_json::Value)>>,
    payloads: Vec<String>,
    bulk_calls: usize,
    fail_calls: HashSet<usize>,
    flushes: usize,
}

/// Thread-safe in-memory store.
#[derive(Clone, Default)]
pub struct MemoryIndexStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryIndexStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make the `n`-th bulk call (1-based) fail.
    pub fn fail_bulk_call(&self, n: usize) {
        self.lock().fail_calls.insert(n);
    }

    /// Successfully stored payloads, in arrival order.
    pub fn payloads(&self) -> Vec<String> {
        self.lock().payloads.clone()
    }

    pub fn bulk_calls(&self) -> usize {
        self.lock().bulk_calls
    }

    pub fn flushes(&self) -> usize {
        self.lock().flushes
    }

    pub fn indices(&self) -> Vec<String> {
        self.lock().indices.keys().cloned().collect()
    }

    pub fn mapping(&self, index: &str) -> Option<(String, serde_json::Value)> {
        self.lock().indices.get(index).cloned().flatten()
    }

    /// Parsed `(header, body)` pairs of every stored document aimed at `index`.
    pub fn documents(&self, index: &str) -> Vec<(serde_json::Value, serde_json::Value)> {
        let inner = self.lock();
        let mut docs = Vec::new();
        for payload in &inner.payloads {
            for (header, body) in payload_pairs(payload) {
                let (Ok(h), Ok(b)) = (
                    serde_json::from_str::<serde_json::Value>(header),
                    serde_json::from_str::<serde_json::Value>(body),
                ) else {
                    continue;
                };
                if h["index"]["_index"] == index {
                    docs.push((h, b));
                }
            }
        }
        docs
    }
}

#[async_trait]
impl IndexStore for MemoryIndexStore {
    async fn create(&self, index: &str) -> Result<()> {
        let mut inner = self.lock();
        if inner.indices.contains_key(index) {
            return Err(Error::Store(format!("index '{index}' already exists")));
        }
        inner.indices.insert(index.to_string(), None);
        Ok(())
    }

    async fn delete(&self, index: &str) -> Result<()> {
        self.lock().indices.remove(index);
        Ok(())
    }

    async fn put_mapping(
        &self,
        index: &str,
        doc_type: &str,
        mapping: &serde_json::Value,
    ) -> Result<()> {
        let mut inner = self.lock();
        let slot = inner
            .indices
            .get_mut(index)
            .ok_or_else(|| Error::Store(format!("index '{index}' not found")))?;
        *slot = Some((doc_type.to_string(), mapping.clone()));
        Ok(())
    }

    async fn bulk(&self, payload: &str) -> Result<()> {
        let mut inner = self.lock();
        inner.bulk_calls += 1;
        let call = inner.bulk_calls;
        if inner.fail_calls.contains(&call) {
            return Err(Error::Store(format!("injected failure on bulk call {call}")));
        }
        inner.payloads.push(payload.to_string());
        Ok(())
    }

    async fn flush(&self) -> Result<()> {
        self.lock().flushes += 1;
        Ok(())
    }

    fn describe(&self) -> String {
        "memory://".to_string()
    }
}
