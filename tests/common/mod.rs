#![allow(dead_code)]

use async_trait::async_trait;
use procure_store::{
    CollectionKind, DurableStore, LocalCache, MemoryCache, RecordStore, Result, SaveReceipt,
    StoreConfig, StoreError,
};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Semaphore;

/// Durable store that can never be reached.
pub struct UnreachableDurable;

#[async_trait]
impl DurableStore for UnreachableDurable {
    async fn fetch(&self, _kind: CollectionKind) -> Result<Option<String>> {
        Err(StoreError::Durable("connection refused".to_string()))
    }

    async fn save(&self, _kind: CollectionKind, _data: &Value) -> Result<SaveReceipt> {
        Err(StoreError::Durable("connection refused".to_string()))
    }
}

/// In-memory durable store that records every call. Fetches block until the
/// gate is opened when built with [`RecordingDurable::gated`].
pub struct RecordingDurable {
    snapshots: Mutex<HashMap<CollectionKind, String>>,
    saves: Mutex<Vec<(CollectionKind, Value)>>,
    fetches: AtomicUsize,
    gate: Option<Semaphore>,
    reject_saves: bool,
}

impl RecordingDurable {
    pub fn new() -> Self {
        Self {
            snapshots: Mutex::new(HashMap::new()),
            saves: Mutex::new(Vec::new()),
            fetches: AtomicUsize::new(0),
            gate: None,
            reject_saves: false,
        }
    }

    pub fn gated() -> Self {
        Self {
            gate: Some(Semaphore::new(0)),
            ..Self::new()
        }
    }

    pub fn rejecting() -> Self {
        Self {
            reject_saves: true,
            ..Self::new()
        }
    }

    pub fn with(self, kind: CollectionKind, json: &str) -> Self {
        self.snapshots.lock().unwrap().insert(kind, json.to_string());
        self
    }

    pub fn open_gate(&self) {
        if let Some(gate) = &self.gate {
            gate.add_permits(1);
        }
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub fn saves(&self) -> Vec<(CollectionKind, Value)> {
        self.saves.lock().unwrap().clone()
    }

    pub fn last_saved(&self, kind: CollectionKind) -> Option<Value> {
        self.saves()
            .into_iter()
            .rev()
            .find(|(k, _)| *k == kind)
            .map(|(_, v)| v)
    }
}

#[async_trait]
impl DurableStore for RecordingDurable {
    async fn fetch(&self, kind: CollectionKind) -> Result<Option<String>> {
        if let Some(gate) = &self.gate {
            let _permit = gate
                .acquire()
                .await
                .map_err(|e| StoreError::Durable(e.to_string()))?;
        }
        self.fetches.fetch_add(1, Ordering::SeqCst);
        Ok(self.snapshots.lock().unwrap().get(&kind).cloned())
    }

    async fn save(&self, kind: CollectionKind, data: &Value) -> Result<SaveReceipt> {
        if self.reject_saves {
            return Ok(SaveReceipt::failed("disk quota exceeded"));
        }
        self.saves.lock().unwrap().push((kind, data.clone()));
        self.snapshots
            .lock()
            .unwrap()
            .insert(kind, data.to_string());
        Ok(SaveReceipt::saved(kind))
    }
}

/// Ready store over an unreachable durable store and an empty memory cache.
pub async fn offline_store() -> (RecordStore, Arc<MemoryCache>) {
    let cache = Arc::new(MemoryCache::new());
    let store = RecordStore::open(
        StoreConfig::default(),
        Arc::new(UnreachableDurable),
        cache.clone() as Arc<dyn LocalCache>,
    )
    .await;
    (store, cache)
}
