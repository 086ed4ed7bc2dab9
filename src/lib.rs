// ============================================================================
// procure_store Library
// ============================================================================

pub mod config;
pub mod core;
pub mod events;
pub mod query;
pub mod storage;
pub mod store;
pub mod web;

// Re-export main types for convenience
pub use crate::config::{IdStrategy, StoreConfig};
pub use crate::core::{
    CollectionKind, Material, MaterialPatch, NewMaterial, NewRequest, NewUser, Record, RecordId,
    Request, RequestPatch, RequestStatus, Result, Role, StoreError, User, UserPatch,
};
pub use events::{EventBus, EventKind, StoreEvent, SubscriptionId};
pub use query::{MaterialFilter, Page, RequestFilter, UserFilter, clamp_page, paginate};
pub use storage::{
    DurableStore, FileCache, FileDurableStore, HttpDurableStore, LocalCache, MemoryCache,
    SaveReceipt, SaveRequest,
};
pub use store::{ExportDocument, ImportDocument, RecordStore, SyncState};
