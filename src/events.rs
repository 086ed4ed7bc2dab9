//! Typed publish/subscribe bus used by the record store to notify views.

use crate::core::{CollectionKind, Material, Request, User};
use log::error;
use std::collections::HashMap;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

/// Everything the store announces.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreEvent {
    UserAdded(User),
    UserUpdated(User),
    UserDeleted(User),
    MaterialAdded(Material),
    MaterialUpdated(Material),
    MaterialDeleted(Material),
    RequestAdded(Request),
    RequestUpdated(Request),
    RequestDeleted(Request),
    /// Coarse re-query signal for one collection.
    CollectionChanged(CollectionKind),
    /// Fired alongside `CollectionChanged` for listeners watching every collection.
    DataChanged(CollectionKind),
    /// A reconciliation pass replaced the collections; re-render unconditionally.
    DataReloaded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    UserAdded,
    UserUpdated,
    UserDeleted,
    MaterialAdded,
    MaterialUpdated,
    MaterialDeleted,
    RequestAdded,
    RequestUpdated,
    RequestDeleted,
    UsersChanged,
    MaterialsChanged,
    RequestsChanged,
    DataChanged,
    DataReloaded,
}

impl EventKind {
    /// Name used by the browser front-end for the same notification.
    pub fn name(&self) -> &'static str {
        match self {
            Self::UserAdded => "userAdded",
            Self::UserUpdated => "userUpdated",
            Self::UserDeleted => "userDeleted",
            Self::MaterialAdded => "materialAdded",
            Self::MaterialUpdated => "materialUpdated",
            Self::MaterialDeleted => "materialDeleted",
            Self::RequestAdded => "requestAdded",
            Self::RequestUpdated => "requestUpdated",
            Self::RequestDeleted => "requestDeleted",
            Self::UsersChanged => "usersChanged",
            Self::MaterialsChanged => "materialsChanged",
            Self::RequestsChanged => "requestsChanged",
            Self::DataChanged => "dataChanged",
            Self::DataReloaded => "dataReloaded",
        }
    }

    pub fn changed(kind: CollectionKind) -> Self {
        match kind {
            CollectionKind::Users => Self::UsersChanged,
            CollectionKind::Materials => Self::MaterialsChanged,
            CollectionKind::Requests => Self::RequestsChanged,
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl StoreEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::UserAdded(_) => EventKind::UserAdded,
            Self::UserUpdated(_) => EventKind::UserUpdated,
            Self::UserDeleted(_) => EventKind::UserDeleted,
            Self::MaterialAdded(_) => EventKind::MaterialAdded,
            Self::MaterialUpdated(_) => EventKind::MaterialUpdated,
            Self::MaterialDeleted(_) => EventKind::MaterialDeleted,
            Self::RequestAdded(_) => EventKind::RequestAdded,
            Self::RequestUpdated(_) => EventKind::RequestUpdated,
            Self::RequestDeleted(_) => EventKind::RequestDeleted,
            Self::CollectionChanged(kind) => EventKind::changed(*kind),
            Self::DataChanged(_) => EventKind::DataChanged,
            Self::DataReloaded => EventKind::DataReloaded,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Handler = Arc<dyn Fn(&StoreEvent) + Send + Sync>;

/// Synchronous fan-out of [`StoreEvent`]s.
///
/// Handlers for one kind run in subscription order on the publisher's
/// task. A panicking handler is logged and skipped; the remaining handlers
/// still run and the publisher never sees the panic. Nothing is buffered:
/// a handler only receives events published after it subscribed.
#[derive(Default)]
pub struct EventBus {
    handlers: RwLock<HashMap<EventKind, Vec<(SubscriptionId, Handler)>>>,
    next_id: AtomicU64,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&self, kind: EventKind, handler: F) -> SubscriptionId
    where
        F: Fn(&StoreEvent) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(kind)
            .or_default()
            .push((id, Arc::new(handler)));
        id
    }

    /// Returns false when `id` was not subscribed to `kind`.
    pub fn unsubscribe(&self, kind: EventKind, id: SubscriptionId) -> bool {
        let mut handlers = self.handlers.write().unwrap_or_else(PoisonError::into_inner);
        let Some(list) = handlers.get_mut(&kind) else {
            return false;
        };
        let before = list.len();
        list.retain(|(existing, _)| *existing != id);
        before != list.len()
    }

    /// Invokes every handler subscribed to the event's kind and returns how many ran
    /// to completion.
    pub fn publish(&self, event: &StoreEvent) -> usize {
        let kind = event.kind();
        // Snapshot the list so handlers may subscribe or publish re-entrantly.
        let handlers: Vec<Handler> = self
            .handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&kind)
            .map(|list| list.iter().map(|(_, handler)| handler.clone()).collect())
            .unwrap_or_default();

        let mut completed = 0;
        for handler in handlers {
            match catch_unwind(AssertUnwindSafe(|| handler(event))) {
                Ok(()) => completed += 1,
                Err(panic) => {
                    let message = panic
                        .downcast_ref::<&str>()
                        .map(|s| s.to_string())
                        .or_else(|| panic.downcast_ref::<String>().cloned())
                        .unwrap_or_else(|| "non-string panic payload".to_string());
                    error!("handler for '{}' failed: {}", kind, message);
                }
            }
        }
        completed
    }

    pub fn subscriber_count(&self, kind: EventKind) -> usize {
        self.handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&kind)
            .map(Vec::len)
            .unwrap_or(0)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let handlers = self.handlers.read().unwrap_or_else(PoisonError::into_inner);
        f.debug_struct("EventBus")
            .field("kinds", &handlers.keys().collect::<Vec<_>>())
            .finish()
    }
}
