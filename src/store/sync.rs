use super::RecordStore;
use crate::core::{CollectionKind, Result, StoreError};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use tracing::{debug, warn};

/// Outcome of the most recent durable write of a collection.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SyncState {
    /// Nothing written since bootstrap, or the last write was accepted.
    #[default]
    Synced,
    /// A write is in flight.
    Pending,
    /// The last write failed; the cache holds the newer data.
    Unsynced(String),
}

/// Per-collection write sequence and last outcome.
pub(crate) struct SyncTracker {
    sequences: [AtomicU64; 3],
    states: Mutex<HashMap<CollectionKind, SyncState>>,
    durable_locks: [tokio::sync::Mutex<()>; 3],
}

fn slot(kind: CollectionKind) -> usize {
    match kind {
        CollectionKind::Users => 0,
        CollectionKind::Materials => 1,
        CollectionKind::Requests => 2,
    }
}

impl SyncTracker {
    pub(crate) fn new() -> Self {
        Self {
            sequences: Default::default(),
            states: Mutex::new(HashMap::new()),
            durable_locks: Default::default(),
        }
    }

    fn next_sequence(&self, kind: CollectionKind) -> u64 {
        self.sequences[slot(kind)].fetch_add(1, Ordering::SeqCst) + 1
    }

    fn latest_sequence(&self, kind: CollectionKind) -> u64 {
        self.sequences[slot(kind)].load(Ordering::SeqCst)
    }

    fn set(&self, kind: CollectionKind, state: SyncState) {
        self.states
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(kind, state);
    }

    pub(crate) fn get(&self, kind: CollectionKind) -> SyncState {
        self.states
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&kind)
            .cloned()
            .unwrap_or_default()
    }
}

impl RecordStore {
    /// Fire-and-forget write of `payload`. Writes of one collection are
    /// serialized, and a write that has been superseded by a newer snapshot
    /// before it started is skipped.
    pub(crate) fn schedule_durable_write(&self, kind: CollectionKind, payload: Value) {
        let sequence = self.inner.sync.next_sequence(kind);
        self.inner.sync.set(kind, SyncState::Pending);

        let store = self.clone();
        let handle = tokio::spawn(async move {
            let sync = &store.inner.sync;
            let _turn = sync.durable_locks[slot(kind)].lock().await;
            if sync.latest_sequence(kind) != sequence {
                debug!(collection = %kind, sequence, "durable write superseded");
                return;
            }
            let outcome = store.write_durable(kind, &payload).await;
            if sync.latest_sequence(kind) == sequence {
                sync.set(kind, outcome);
            }
        });

        let mut writes = self
            .inner
            .durable_writes
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        writes.retain(|h| !h.is_finished());
        writes.push(handle);
    }

    async fn write_durable(&self, kind: CollectionKind, payload: &Value) -> SyncState {
        match self.inner.durable.save(kind, payload).await {
            Ok(receipt) if receipt.success => {
                debug!(collection = %kind, "durable write accepted");
                SyncState::Synced
            }
            Ok(receipt) => {
                let reason = receipt
                    .error
                    .unwrap_or_else(|| "rejected without reason".to_string());
                warn!(collection = %kind, %reason, "durable store rejected write");
                SyncState::Unsynced(reason)
            }
            Err(err) => {
                warn!(collection = %kind, error = %err, "durable store unavailable, cache keeps the data");
                SyncState::Unsynced(err.to_string())
            }
        }
    }

    /// Status of the last durable write of `kind`.
    pub fn sync_state(&self, kind: CollectionKind) -> SyncState {
        self.inner.sync.get(kind)
    }

    /// Waits for every background durable write scheduled so far.
    pub async fn flush(&self) {
        let pending: Vec<_> = {
            let mut writes = self
                .inner
                .durable_writes
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            writes.drain(..).collect()
        };
        for handle in pending {
            if let Err(err) = handle.await {
                warn!(error = %err, "durable write task failed");
            }
        }
    }

    /// Pushes every collection to the durable store and waits for the outcome.
    pub async fn save_all_to_durable(&self) -> Result<()> {
        self.ready().await;
        let mut failures = Vec::new();

        for kind in CollectionKind::ALL {
            let payload = self.collection_json(kind)?;
            let sequence = self.inner.sync.next_sequence(kind);
            let outcome = {
                let _turn = self.inner.sync.durable_locks[slot(kind)].lock().await;
                self.write_durable(kind, &payload).await
            };
            if let SyncState::Unsynced(reason) = &outcome {
                failures.push(format!("{}: {}", kind, reason));
            }
            if self.inner.sync.latest_sequence(kind) == sequence {
                self.inner.sync.set(kind, outcome);
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(StoreError::Durable(failures.join("; ")))
        }
    }

    pub(crate) fn collection_json(&self, kind: CollectionKind) -> Result<Value> {
        let state = self.read_state();
        match kind {
            CollectionKind::Users => state.users.to_json(),
            CollectionKind::Materials => state.materials.to_json(),
            CollectionKind::Requests => state.requests.to_json(),
        }
    }
}
