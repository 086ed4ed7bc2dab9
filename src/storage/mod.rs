//! Persistence targets behind the record store.
//!
//! The store talks to two passive backends: a [`LocalCache`] that is always
//! available and written synchronously on every mutation, and a
//! [`DurableStore`] that may be unreachable and is written best-effort.

pub mod http;
pub mod memory;
pub mod persistence;

use crate::core::{CollectionKind, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use http::HttpDurableStore;
pub use memory::MemoryCache;
pub use persistence::{FileCache, FileDurableStore};

/// Keyed string storage holding the last-known-good JSON of each collection.
pub trait LocalCache: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;
}

/// File-backed persistence endpoint; `fetch` returns `None` when the endpoint
/// has nothing for the collection.
#[async_trait]
pub trait DurableStore: Send + Sync {
    async fn fetch(&self, kind: CollectionKind) -> Result<Option<String>>;
    async fn save(&self, kind: CollectionKind, data: &Value) -> Result<SaveReceipt>;
}

/// Body of `POST /api/save-data`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaveRequest {
    pub key: String,
    pub data: Value,
}

/// Response of `POST /api/save-data`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaveReceipt {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SaveReceipt {
    pub fn saved(kind: CollectionKind) -> Self {
        Self {
            success: true,
            message: Some(format!("Data '{}' saved", kind)),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            message: None,
            error: Some(error.into()),
        }
    }
}
