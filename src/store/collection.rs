use super::{RecordStore, StoreState};
use crate::config::IdStrategy;
use crate::core::{CollectionKind, Material, Record, RecordId, Request, Result, StoreError, User};
use crate::events::StoreEvent;
use serde_json::Value;
use tracing::{debug, error};

/// Ordered records of one kind plus the identifier high-water mark.
#[derive(Debug, Clone)]
pub(crate) struct Collection<T> {
    records: Vec<T>,
    high_water: RecordId,
}

impl<T> Default for Collection<T> {
    fn default() -> Self {
        Self {
            records: Vec::new(),
            high_water: 0,
        }
    }
}

impl<T: Record> Collection<T> {
    pub(crate) fn records(&self) -> &[T] {
        &self.records
    }

    pub(crate) fn len(&self) -> usize {
        self.records.len()
    }

    pub(crate) fn max_id(&self) -> RecordId {
        self.records.iter().map(Record::id).max().unwrap_or(0)
    }

    /// Fails once the identifier space is used up instead of wrapping to 0.
    pub(crate) fn next_id(&self, strategy: IdStrategy) -> Result<RecordId> {
        let last = match strategy {
            IdStrategy::MaxPlusOne => self.max_id(),
            IdStrategy::Monotonic => self.high_water.max(self.max_id()),
        };
        last.checked_add(1).ok_or_else(|| {
            StoreError::validation(format!("{} has no identifier left after {}", T::KIND, last))
        })
    }

    pub(crate) fn get(&self, id: RecordId) -> Option<&T> {
        self.records.iter().find(|r| r.id() == id)
    }

    fn position(&self, id: RecordId) -> Option<usize> {
        self.records.iter().position(|r| r.id() == id)
    }

    fn push(&mut self, record: T) {
        self.high_water = self.high_water.max(record.id());
        self.records.push(record);
    }

    /// Swaps in a reconciled or imported snapshot. The high-water mark only
    /// ever grows, so identifiers seen earlier in the process stay retired.
    pub(crate) fn replace(&mut self, records: Vec<T>) {
        let incoming_max = records.iter().map(Record::id).max().unwrap_or(0);
        self.high_water = self.high_water.max(incoming_max);
        self.records = records;
    }

    pub(crate) fn to_json(&self) -> Result<Value> {
        serde_json::to_value(&self.records)
            .map_err(|e| StoreError::Serialization(T::KIND, e.to_string()))
    }
}

/// Wiring between a record type, its slot in [`StoreState`] and its events.
pub(crate) trait Stored: Record {
    fn slot(state: &StoreState) -> &Collection<Self>;
    fn slot_mut(state: &mut StoreState) -> &mut Collection<Self>;
    fn added(self) -> StoreEvent;
    fn updated(self) -> StoreEvent;
    fn deleted(self) -> StoreEvent;
}

impl Stored for User {
    fn slot(state: &StoreState) -> &Collection<Self> {
        &state.users
    }

    fn slot_mut(state: &mut StoreState) -> &mut Collection<Self> {
        &mut state.users
    }

    fn added(self) -> StoreEvent {
        StoreEvent::UserAdded(self)
    }

    fn updated(self) -> StoreEvent {
        StoreEvent::UserUpdated(self)
    }

    fn deleted(self) -> StoreEvent {
        StoreEvent::UserDeleted(self)
    }
}

impl Stored for Material {
    fn slot(state: &StoreState) -> &Collection<Self> {
        &state.materials
    }

    fn slot_mut(state: &mut StoreState) -> &mut Collection<Self> {
        &mut state.materials
    }

    fn added(self) -> StoreEvent {
        StoreEvent::MaterialAdded(self)
    }

    fn updated(self) -> StoreEvent {
        StoreEvent::MaterialUpdated(self)
    }

    fn deleted(self) -> StoreEvent {
        StoreEvent::MaterialDeleted(self)
    }
}

impl Stored for Request {
    fn slot(state: &StoreState) -> &Collection<Self> {
        &state.requests
    }

    fn slot_mut(state: &mut StoreState) -> &mut Collection<Self> {
        &mut state.requests
    }

    fn added(self) -> StoreEvent {
        StoreEvent::RequestAdded(self)
    }

    fn updated(self) -> StoreEvent {
        StoreEvent::RequestUpdated(self)
    }

    fn deleted(self) -> StoreEvent {
        StoreEvent::RequestDeleted(self)
    }
}

// ============================================================================
// Generic CRUD
// ============================================================================

impl RecordStore {
    pub(crate) async fn fetch_all<T: Stored>(&self) -> Vec<T> {
        self.ready().await;
        T::slot(&self.read_state()).records().to_vec()
    }

    pub(crate) async fn fetch_one<T: Stored>(&self, id: RecordId) -> Option<T> {
        self.ready().await;
        T::slot(&self.read_state()).get(id).cloned()
    }

    /// Assigns the next identifier, lets `build` produce the record (it may
    /// consult the other collections) and commits it.
    pub(crate) async fn insert_with<T, F>(&self, build: F) -> Result<T>
    where
        T: Stored,
        F: FnOnce(RecordId, &StoreState) -> Result<T>,
    {
        self.ready().await;
        let _write = self.inner.write_locks.of(T::KIND).lock().await;

        let (record, payload) = {
            let mut state = self.write_state();
            let id = T::slot(&state).next_id(self.inner.config.id_strategy)?;
            let record = build(id, &*state)?;
            let slot = T::slot_mut(&mut state);
            slot.push(record.clone());
            (record, slot.to_json()?)
        };

        debug!(collection = %T::KIND, id = record.id(), "record added");
        self.persist(T::KIND, payload);
        self.announce(T::KIND, record.clone().added());
        Ok(record)
    }

    /// Shallow merge through `apply`; `Ok(None)` when `id` is unknown.
    pub(crate) async fn update_with<T, F>(&self, id: RecordId, apply: F) -> Result<Option<T>>
    where
        T: Stored,
        F: FnOnce(&mut T, &StoreState) -> Result<()>,
    {
        self.ready().await;
        let _write = self.inner.write_locks.of(T::KIND).lock().await;

        let (record, payload) = {
            let mut state = self.write_state();
            let Some(index) = T::slot(&state).position(id) else {
                return Ok(None);
            };
            let mut updated = T::slot(&state).records[index].clone();
            apply(&mut updated, &*state)?;
            let slot = T::slot_mut(&mut state);
            slot.records[index] = updated.clone();
            (updated, slot.to_json()?)
        };

        debug!(collection = %T::KIND, id, "record updated");
        self.persist(T::KIND, payload);
        self.announce(T::KIND, record.clone().updated());
        Ok(Some(record))
    }

    /// Hard delete; `Ok(false)` when `id` is unknown.
    pub(crate) async fn remove<T: Stored>(&self, id: RecordId) -> Result<bool> {
        self.ready().await;
        let _write = self.inner.write_locks.of(T::KIND).lock().await;

        let (record, payload) = {
            let mut state = self.write_state();
            let slot = T::slot_mut(&mut state);
            let Some(index) = slot.position(id) else {
                return Ok(false);
            };
            let record = slot.records.remove(index);
            (record, slot.to_json()?)
        };

        debug!(collection = %T::KIND, id, "record deleted");
        self.persist(T::KIND, payload);
        self.announce(T::KIND, record.deleted());
        Ok(true)
    }

    /// Writes the collection to the cache now and to the durable store in the
    /// background.
    pub(crate) fn persist(&self, kind: CollectionKind, payload: Value) {
        if let Err(err) = self.inner.cache.set(kind.key(), &payload.to_string()) {
            error!(collection = %kind, error = %err, "cache write failed");
        }
        self.schedule_durable_write(kind, payload);
    }

    /// Granular event first, then the coarse re-query signals.
    pub(crate) fn announce(&self, kind: CollectionKind, event: StoreEvent) {
        self.inner.events.publish(&event);
        self.announce_changed(kind);
    }

    pub(crate) fn announce_changed(&self, kind: CollectionKind) {
        self.inner.events.publish(&StoreEvent::CollectionChanged(kind));
        self.inner.events.publish(&StoreEvent::DataChanged(kind));
    }
}
