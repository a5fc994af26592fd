//! Elasticsearch-compatible REST store.
//!
//! Uses the typed-mapping endpoints (`PUT /{index}/_mapping/{type}`) to match
//! the `_type` carried in bulk headers.

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};

use super::IndexStore;
use crate::error::{Error, Result};

pub struct HttpIndexStore {
    client: Client,
    base: String,
}

impl HttpIndexStore {
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder().build()?;
        Ok(Self {
            client,
            base: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base, path.trim_start_matches('/'))
    }
}

async fn check(resp: Response, what: &str) -> Result<Response> {
    if resp.status().is_success() {
        return Ok(resp);
    }
    let status = resp.status();
    let body = resp.text().await.unwrap_or_default();
    Err(Error::Http(format!("{what}: {status}: {body}")))
}

/// Turn a bulk response with item-level failures into an error.
fn bulk_outcome(body: &serde_json::Value) -> Result<()> {
    if !body["errors"].as_bool().unwrap_or(false) {
        return Ok(());
    }
    let items = body["items"].as_array().map(Vec::as_slice).unwrap_or(&[]);
    let failed: Vec<&serde_json::Value> = items
        .iter()
        .filter_map(|item| item.as_object().and_then(|o| o.values().next()))
        .filter(|action| !action["error"].is_null())
        .collect();
    let reason = failed
        .first()
        .map(|a| a["error"].to_string())
        .unwrap_or_else(|| "unknown".to_string());
    Err(Error::Rejected {
        rejected: failed.len(),
        total: items.len(),
        reason,
    })
}

#[async_trait]
impl IndexStore for HttpIndexStore {
    async fn create(&self, index: &str) -> Result<()> {
        let resp = self.client.put(self.url(index)).send().await?;
        check(resp, "create index").await?;
        Ok(())
    }

    async fn delete(&self, index: &str) -> Result<()> {
        let resp = self.client.delete(self.url(index)).send().await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(());
        }
        check(resp, "delete index").await?;
        Ok(())
    }

    async fn put_mapping(
        &self,
        index: &str,
        doc_type: &str,
        mapping: &serde_json::Value,
    ) -> Result<()> {
        let mut body = serde_json::Map::new();
        body.insert(doc_type.to_string(), mapping.clone());
        let resp = self
            .client
            .put(self.url(&format!("{index}/_mapping/{doc_type}")))
            .json(&body)
            .send()
            .await?;
        check(resp, "put mapping").await?;
        Ok(())
    }

    async fn bulk(&self, payload: &str) -> Result<()> {
        let resp = self
            .client
            .post(self.url("_bulk"))
            .header(reqwest::header::CONTENT_TYPE, "application/x-ndjson")
            .body(payload.to_string())
            .send()
            .await?;
        let resp = check(resp, "bulk").await?;
        let body: serde_json::Value = resp.json().await?;
        bulk_outcome(&body)
    }

    async fn flush(&self) -> Result<()> {
        let resp = self.client.post(self.url("_flush")).send().await?;
        check(resp, "flush").await?;
        Ok(())
    }

    fn describe(&self) -> String {
        self.base.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn clean_bulk_response_is_ok() {
        assert!(bulk_outcome(&json!({"took": 3, "errors": false, "items": []})).is_ok());
    }

    #[test]
    fn item_errors_fail_the_batch() {
        let body = json!({
            "errors": true,
            "items": [
                {"index": {"status": 201}},
                {"index": {"status": 400, "error": {"type": "mapper_parsing_exception"}}}
            ]
        });
        let err = bulk_outcome(&body).unwrap_err();
        assert!(matches!(err, Error::Rejected { rejected: 1, total: 2, .. }));
        assert!(err.to_string().contains("mapper_parsing_exception"));
    }

    #[test]
    fn url_joins_without_double_slash() {
        let s = HttpIndexStore::new("http://localhost:9200/").unwrap();
        assert_eq!(s.url("movies"), "http://localhost:9200/movies");
        assert_eq!(s.url("/_bulk"), "http://localhost:9200/_bulk");
    }
}
