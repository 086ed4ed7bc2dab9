//! The record store: in-memory collections reconciled from a durable store
//! and a local cache, with CRUD, queries and change events.
//!
//! A [`RecordStore`] is a cheap handle; clone it into every consumer that
//! needs to read, write or subscribe. All clones share the same collections.
//!
//! ```ignore
//! let store = RecordStore::open(StoreConfig::default(), durable, cache).await;
//! store.subscribe(EventKind::MaterialsChanged, |_| println!("re-render catalog"));
//! let bolt = store.add_material(NewMaterial::named("Bolt").unit("pcs")).await?;
//! ```

mod bootstrap;
mod collection;
mod materials;
mod requests;
mod snapshot;
mod sync;
mod users;

use crate::config::StoreConfig;
use crate::core::{CollectionKind, Material, Request, User};
use crate::events::{EventBus, EventKind, StoreEvent, SubscriptionId};
use crate::storage::{DurableStore, LocalCache};
use collection::Collection;
use std::fmt;
use std::sync::atomic::AtomicU64;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;

pub use requests::{JUSTIFICATION_MAX_CHARS, JUSTIFICATION_MIN_CHARS};
pub use snapshot::{ExportDocument, ImportDocument};
pub use sync::SyncState;

use sync::SyncTracker;

pub(crate) struct StoreState {
    users: Collection<User>,
    materials: Collection<Material>,
    requests: Collection<Request>,
}

impl StoreState {
    fn empty() -> Self {
        Self {
            users: Collection::default(),
            materials: Collection::default(),
            requests: Collection::default(),
        }
    }
}

/// One lock per collection; mutations of a collection run one at a time so
/// identifier assignment and the cache write see a consistent sequence.
struct WriteLocks {
    users: Mutex<()>,
    materials: Mutex<()>,
    requests: Mutex<()>,
}

impl WriteLocks {
    fn new() -> Self {
        Self {
            users: Mutex::new(()),
            materials: Mutex::new(()),
            requests: Mutex::new(()),
        }
    }

    fn of(&self, kind: CollectionKind) -> &Mutex<()> {
        match kind {
            CollectionKind::Users => &self.users,
            CollectionKind::Materials => &self.materials,
            CollectionKind::Requests => &self.requests,
        }
    }
}

struct StoreInner {
    config: StoreConfig,
    durable: Arc<dyn DurableStore>,
    cache: Arc<dyn LocalCache>,
    state: RwLock<StoreState>,
    events: EventBus,
    ready: watch::Sender<bool>,
    reconcile_lock: Mutex<()>,
    reconcile_passes: AtomicU64,
    write_locks: WriteLocks,
    sync: SyncTracker,
    durable_writes: std::sync::Mutex<Vec<JoinHandle<()>>>,
}

/// Handle to the shared record store.
#[derive(Clone)]
pub struct RecordStore {
    inner: Arc<StoreInner>,
}

impl RecordStore {
    /// Creates a store that is not ready yet; reads and writes wait until
    /// [`bootstrap`](Self::bootstrap) or [`reload`](Self::reload) completes.
    pub fn new(
        config: StoreConfig,
        durable: Arc<dyn DurableStore>,
        cache: Arc<dyn LocalCache>,
    ) -> Self {
        let (ready, _) = watch::channel(false);
        Self {
            inner: Arc::new(StoreInner {
                config,
                durable,
                cache,
                state: RwLock::new(StoreState::empty()),
                events: EventBus::new(),
                ready,
                reconcile_lock: Mutex::new(()),
                reconcile_passes: AtomicU64::new(0),
                write_locks: WriteLocks::new(),
                sync: SyncTracker::new(),
                durable_writes: std::sync::Mutex::new(Vec::new()),
            }),
        }
    }

    /// Creates the store and waits for the initial reconciliation.
    pub async fn open(
        config: StoreConfig,
        durable: Arc<dyn DurableStore>,
        cache: Arc<dyn LocalCache>,
    ) -> Self {
        let store = Self::new(config, durable, cache);
        store.bootstrap().await;
        store
    }

    /// Runs the initial reconciliation in the background.
    pub fn spawn_bootstrap(&self) -> JoinHandle<()> {
        let store = self.clone();
        tokio::spawn(async move { store.bootstrap().await })
    }

    pub fn config(&self) -> &StoreConfig {
        &self.inner.config
    }

    pub fn is_ready(&self) -> bool {
        *self.inner.ready.borrow()
    }

    /// Resolves once the first reconciliation has finished. Never resets.
    pub async fn ready(&self) {
        let mut rx = self.inner.ready.subscribe();
        // The sender is owned by `inner`, which `self` keeps alive.
        let _ = rx.wait_for(|ready| *ready).await;
    }

    // --- Events ---

    pub fn subscribe<F>(&self, kind: EventKind, handler: F) -> SubscriptionId
    where
        F: Fn(&StoreEvent) + Send + Sync + 'static,
    {
        self.inner.events.subscribe(kind, handler)
    }

    pub fn unsubscribe(&self, kind: EventKind, id: SubscriptionId) -> bool {
        self.inner.events.unsubscribe(kind, id)
    }

    pub fn events(&self) -> &EventBus {
        &self.inner.events
    }

    // --- Internal state access ---

    fn read_state(&self) -> RwLockReadGuard<'_, StoreState> {
        self.inner
            .state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, StoreState> {
        self.inner
            .state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for RecordStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.read_state();
        f.debug_struct("RecordStore")
            .field("ready", &self.is_ready())
            .field("users", &state.users.len())
            .field("materials", &state.materials.len())
            .field("requests", &state.requests.len())
            .finish()
    }
}
