use super::{DurableStore, SaveReceipt, SaveRequest};
use crate::core::{CollectionKind, Result, StoreError};
use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use std::time::Duration;

/// Durable store reached over HTTP: `GET {data_url}/<key>.json` and
/// `POST {save_url}` with a [`SaveRequest`] body.
#[derive(Debug, Clone)]
pub struct HttpDurableStore {
    client: reqwest::Client,
    data_url: String,
    save_url: String,
}

impl HttpDurableStore {
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

    /// `base_url` is the server root, e.g. `http://localhost:3000`.
    pub fn new(base_url: &str) -> Result<Self> {
        Self::with_timeout(base_url, Self::DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| StoreError::Durable(format!("Failed to build HTTP client: {}", e)))?;
        let base = base_url.trim_end_matches('/');
        Ok(Self {
            client,
            data_url: format!("{}/data", base),
            save_url: format!("{}/api/save-data", base),
        })
    }

    pub fn data_url(&self) -> &str {
        &self.data_url
    }

    pub fn save_url(&self) -> &str {
        &self.save_url
    }
}

#[async_trait]
impl DurableStore for HttpDurableStore {
    async fn fetch(&self, kind: CollectionKind) -> Result<Option<String>> {
        let url = format!("{}/{}", self.data_url, kind.file_name());
        let response = self
            .client
            .get(&url)
            // Defeat intermediary caches; the cache layer decides freshness.
            .query(&[("t", Utc::now().timestamp_millis())])
            .send()
            .await
            .map_err(|e| StoreError::Durable(format!("GET {} failed: {}", url, e)))?;

        if !response.status().is_success() {
            return Ok(None);
        }

        let body = response
            .text()
            .await
            .map_err(|e| StoreError::Durable(format!("Failed to read {}: {}", url, e)))?;
        Ok(Some(body))
    }

    async fn save(&self, kind: CollectionKind, data: &Value) -> Result<SaveReceipt> {
        let body = SaveRequest {
            key: kind.key().to_string(),
            data: data.clone(),
        };
        let response = self
            .client
            .post(&self.save_url)
            .json(&body)
            .send()
            .await
            .map_err(|e| StoreError::Durable(format!("POST {} failed: {}", self.save_url, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(StoreError::Durable(format!(
                "Saving '{}' returned {}",
                kind, status
            )));
        }

        response
            .json::<SaveReceipt>()
            .await
            .map_err(|e| StoreError::Durable(format!("Malformed save response: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_urls_are_derived_from_base() {
        let store = HttpDurableStore::new("http://localhost:3000/").unwrap();
        assert_eq!(store.data_url(), "http://localhost:3000/data");
        assert_eq!(store.save_url(), "http://localhost:3000/api/save-data");
    }

    #[tokio::test]
    async fn test_unreachable_server_is_a_durable_error() {
        let store =
            HttpDurableStore::with_timeout("http://127.0.0.1:9", Duration::from_millis(200))
                .unwrap();
        let err = store.fetch(CollectionKind::Users).await.unwrap_err();
        assert!(err.is_transient());
    }
}
