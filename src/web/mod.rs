//! HTTP side of the durable store.
//!
//! Serves the collection files written through [`FileDurableStore`] under
//! `/data/<key>.json`, accepts `POST /api/save-data`, and hands every other
//! path to a static directory that falls back to the entry document so the
//! client can route on its own.
//!
//! [`FileDurableStore`]: crate::storage::FileDurableStore

mod routes;

use crate::core::StoreError;
use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use std::path::PathBuf;

pub use routes::{AppState, build_router, serve};

/// Largest accepted `save-data` body.
pub const MAX_BODY_BYTES: usize = 16 * 1024 * 1024;

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Directory the collection files live in
    pub data_dir: PathBuf,
    /// Directory static assets are served from
    pub static_root: PathBuf,
    /// Served for any path that matches no file
    pub entry_document: String,
}

impl ServerConfig {
    pub fn new() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
            data_dir: PathBuf::from("data"),
            static_root: PathBuf::from("."),
            entry_document: "index.html".to_string(),
        }
    }

    pub fn host(mut self, host: &str) -> Self {
        self.host = host.to_string();
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn data_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.data_dir = dir.into();
        self
    }

    pub fn static_root<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.static_root = dir.into();
        self
    }

    pub fn entry_document(mut self, name: &str) -> Self {
        self.entry_document = name.to_string();
        self
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn entry_path(&self) -> PathBuf {
        self.static_root.join(&self.entry_document)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Error body. `success` is always `false` so clients that only understand
/// the save receipt shape still read it as a failure.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
    pub code: String,
}

#[derive(Debug)]
pub enum WebError {
    Store(StoreError),
    BadRequest(String),
}

impl From<StoreError> for WebError {
    fn from(err: StoreError) -> Self {
        WebError::Store(err)
    }
}

impl IntoResponse for WebError {
    fn into_response(self) -> Response {
        let (status, message, code) = match self {
            WebError::Store(err @ StoreError::Validation(_))
            | WebError::Store(err @ StoreError::Serialization(..)) => (
                StatusCode::BAD_REQUEST,
                err.to_string(),
                "invalid_payload".to_string(),
            ),
            WebError::Store(err @ StoreError::DuplicateLogin(_))
            | WebError::Store(err @ StoreError::InvalidTransition { .. }) => {
                (StatusCode::CONFLICT, err.to_string(), "conflict".to_string())
            }
            WebError::Store(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                err.to_string(),
                "storage_error".to_string(),
            ),

            WebError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, msg, "bad_request".to_string())
            }
        };

        let body = Json(ErrorResponse {
            success: false,
            error: message,
            code,
        });

        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, WebError>;
