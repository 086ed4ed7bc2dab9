//! Startup reconciliation between the durable store and the local cache.
//!
//! Per collection the cache always wins when it holds a value: every local
//! write lands in the cache synchronously, so it is never older than the
//! durable snapshot. Without a cached value the durable snapshot is used, and
//! without either the collection starts empty. The resolved snapshot is then
//! written back to the cache.
//!
//! A cache payload that cannot be read or parsed aborts resolution of all
//! three collections, and the store starts empty rather than refusing to
//! come up. Nothing is written back in that case; only the malformed entry
//! is dropped from the cache.

use super::RecordStore;
use crate::core::{CollectionKind, Material, Record, Request, Result, StoreError, User};
use crate::events::StoreEvent;
use std::sync::atomic::Ordering;
use tracing::{info, info_span, warn, Instrument};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Source {
    Cache,
    Durable,
    Empty,
}

struct Resolved {
    users: Vec<User>,
    materials: Vec<Material>,
    requests: Vec<Request>,
}

impl Resolved {
    fn empty() -> Self {
        Self {
            users: Vec::new(),
            materials: Vec::new(),
            requests: Vec::new(),
        }
    }
}

/// What the durable store returned for each collection, indexed like
/// [`CollectionKind::ALL`].
type DurableSnapshots = [Option<String>; 3];

fn parse<T: Record>(text: &str) -> Result<Vec<T>> {
    serde_json::from_str(text).map_err(|e| StoreError::Serialization(T::KIND, e.to_string()))
}

impl RecordStore {
    /// Runs the initial reconciliation and opens the readiness gate.
    /// Calling it again after the store is ready does nothing.
    pub async fn bootstrap(&self) {
        if self.is_ready() {
            return;
        }
        self.reconcile_serialized()
            .instrument(info_span!("bootstrap"))
            .await;
        self.mark_ready();
    }

    /// Re-runs reconciliation and announces [`StoreEvent::DataReloaded`] so
    /// consumers re-render everything.
    pub async fn reload(&self) {
        self.reconcile_serialized()
            .instrument(info_span!("reload"))
            .await;
        self.mark_ready();
        self.inner.events.publish(&StoreEvent::DataReloaded);
    }

    fn mark_ready(&self) {
        let opened = self.inner.ready.send_if_modified(|ready| {
            if *ready {
                false
            } else {
                *ready = true;
                true
            }
        });
        if opened {
            info!("record store ready");
        }
    }

    /// Only one pass runs at a time. A caller that finds a pass already
    /// running waits for it and reuses its result instead of running
    /// another one, so it does not re-read the cache itself.
    async fn reconcile_serialized(&self) {
        let observed = self.inner.reconcile_passes.load(Ordering::SeqCst);
        let _pass = self.inner.reconcile_lock.lock().await;
        if self.inner.reconcile_passes.load(Ordering::SeqCst) != observed {
            return;
        }
        self.reconcile().await;
        self.inner.reconcile_passes.fetch_add(1, Ordering::SeqCst);
    }

    async fn reconcile(&self) {
        let mut durable: DurableSnapshots = Default::default();
        for (slot, kind) in CollectionKind::ALL.into_iter().enumerate() {
            durable[slot] = match self.inner.durable.fetch(kind).await {
                Ok(snapshot) => snapshot,
                Err(err) => {
                    warn!(collection = %kind, error = %err, "durable store unavailable, falling back to cache");
                    None
                }
            };
        }

        // The cache is read only after every durable response is in, and
        // under all write locks, so no local write can slip in between the
        // cache read and the swap.
        let _users = self.inner.write_locks.users.lock().await;
        let _materials = self.inner.write_locks.materials.lock().await;
        let _requests = self.inner.write_locks.requests.lock().await;

        let resolved = match self.resolve(durable) {
            Ok(resolved) => Some(resolved),
            Err(err) => {
                warn!(error = %err, "reconciliation failed, starting with empty collections");
                // Drop only the unreadable entry so the next pass can fall
                // back to the durable snapshot; the rest of the cache stays.
                if let StoreError::Serialization(kind, _) = &err {
                    if let Err(err) = self.inner.cache.remove(kind.key()) {
                        warn!(collection = %kind, error = %err, "cannot drop malformed cache entry");
                    }
                }
                None
            }
        };
        let write_back = resolved.is_some();
        let resolved = resolved.unwrap_or_else(Resolved::empty);

        {
            let mut state = self.write_state();
            state.users.replace(resolved.users);
            state.materials.replace(resolved.materials);
            state.requests.replace(resolved.requests);
        }

        if !write_back {
            return;
        }
        for kind in CollectionKind::ALL {
            match self.collection_json(kind) {
                Ok(payload) => {
                    if let Err(err) = self.inner.cache.set(kind.key(), &payload.to_string()) {
                        warn!(collection = %kind, error = %err, "cache write-back failed");
                    }
                }
                Err(err) => warn!(collection = %kind, error = %err, "cannot encode collection"),
            }
        }
    }

    fn resolve(&self, durable: DurableSnapshots) -> Result<Resolved> {
        let [users, materials, requests] = durable;
        Ok(Resolved {
            users: self.resolve_one(users)?,
            materials: self.resolve_one(materials)?,
            requests: self.resolve_one(requests)?,
        })
    }

    fn resolve_one<T: Record>(&self, durable: Option<String>) -> Result<Vec<T>> {
        let kind = T::KIND;
        let (records, source) = match self.inner.cache.get(kind.key())? {
            Some(cached) => (parse::<T>(&cached)?, Source::Cache),
            None => match durable {
                Some(text) => match parse::<T>(&text) {
                    Ok(records) => (records, Source::Durable),
                    Err(err) => {
                        warn!(collection = %kind, error = %err, "ignoring malformed durable snapshot");
                        (Vec::new(), Source::Empty)
                    }
                },
                None => (Vec::new(), Source::Empty),
            },
        };
        info!(collection = %kind, source = ?source, records = records.len(), "collection resolved");
        Ok(records)
    }
}
