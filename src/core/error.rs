use thiserror::Error;

use super::types::{CollectionKind, RequestStatus};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Login '{0}' is already taken")]
    DuplicateLogin(String),

    #[error("Request {id} cannot move from '{from}' to '{to}'")]
    InvalidTransition {
        id: u64,
        from: RequestStatus,
        to: RequestStatus,
    },

    #[error("Malformed '{0}' payload: {1}")]
    Serialization(CollectionKind, String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("Durable store error: {0}")]
    Durable(String),

    #[error("Cache error: {0}")]
    Cache(String),
}

impl StoreError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// True for failures that the store recovers from locally.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Io(_) | Self::Durable(_))
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}
