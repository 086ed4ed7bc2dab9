pub mod error;
pub mod types;

pub use error::{Result, StoreError};
pub use types::{
    CollectionKind, Material, MaterialPatch, NewMaterial, NewRequest, NewUser, Record, RecordId,
    Request, RequestPatch, RequestStatus, Role, User, UserPatch,
};
