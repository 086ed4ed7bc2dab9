use super::{MAX_BODY_BYTES, Result, ServerConfig, WebError};
use crate::core::CollectionKind;
use crate::storage::{FileDurableStore, SaveReceipt, SaveRequest};
use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, State};
use axum::http::{Method, header};
use axum::routing::post;
use axum::{Json, Router};
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

#[derive(Clone)]
pub struct AppState {
    store: Arc<FileDurableStore>,
    // Saves share temp file names per key, so they run one at a time.
    write_lock: Arc<Mutex<()>>,
}

impl AppState {
    pub fn new(store: FileDurableStore) -> Self {
        Self {
            store: Arc::new(store),
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn store(&self) -> &FileDurableStore {
        &self.store
    }
}

pub fn build_router(state: AppState, config: &ServerConfig) -> Router {
    let data = ServeDir::new(state.store.data_dir());
    let assets =
        ServeDir::new(&config.static_root).fallback(ServeFile::new(config.entry_path()));

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/api/save-data", post(save_data))
        .nest_service("/data", data)
        .fallback_service(assets)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn save_data(State(state): State<AppState>, body: Bytes) -> Result<Json<SaveReceipt>> {
    let request: SaveRequest = serde_json::from_slice(&body)
        .map_err(|e| WebError::BadRequest(format!("Invalid JSON: {}", e)))?;
    let kind: CollectionKind = request.key.parse()?;
    if !request.data.is_array() {
        return Err(WebError::BadRequest(format!(
            "data for '{}' must be an array",
            kind
        )));
    }

    let _guard = state.write_lock.lock().await;
    if let Err(err) = state.store.write(kind, &request.data).await {
        warn!(collection = %kind, error = %err, "failed to save collection");
        return Err(err.into());
    }

    info!(collection = %kind, "collection saved");
    Ok(Json(SaveReceipt::saved(kind)))
}

/// Binds the configured address and serves until `shutdown` resolves.
pub async fn serve<F>(config: ServerConfig, shutdown: F) -> crate::core::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    tokio::fs::create_dir_all(&config.data_dir).await?;
    let app = build_router(AppState::new(FileDurableStore::new(&config.data_dir)), &config);

    let addr = config.address();
    let listener = TcpListener::bind(&addr).await?;
    info!(
        address = %addr,
        data_dir = %config.data_dir.display(),
        static_root = %config.static_root.display(),
        "durable store listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode};
    use serde_json::{Value, json};
    use tempfile::TempDir;
    use tower::ServiceExt;

    fn app(dir: &TempDir) -> Router {
        let config = ServerConfig::new()
            .data_dir(dir.path().join("data"))
            .static_root(dir.path());
        std::fs::write(dir.path().join("index.html"), "<html>entry</html>").unwrap();
        build_router(
            AppState::new(FileDurableStore::new(&config.data_dir)),
            &config,
        )
    }

    async fn post_raw(app: &Router, body: &str) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(Method::POST)
            .uri("/api/save-data")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn save_then_fetch_collection() {
        let dir = TempDir::new().unwrap();
        let app = app(&dir);

        let payload = json!({ "key": "materials", "data": [{ "id": 1, "name": "Bolt" }] });
        let (status, body) = post_raw(&app, &payload.to_string()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], json!(true));

        let request = Request::builder()
            .uri("/data/materials.json")
            .body(Body::empty())
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let saved: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(saved[0]["name"], json!("Bolt"));
    }

    #[tokio::test]
    async fn invalid_json_is_bad_request() {
        let dir = TempDir::new().unwrap();
        let (status, body) = post_raw(&app(&dir), "{not json").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], json!(false));
        assert!(body["error"].as_str().unwrap().starts_with("Invalid JSON"));
    }

    #[tokio::test]
    async fn unknown_key_is_rejected() {
        let dir = TempDir::new().unwrap();
        let payload = json!({ "key": "../secrets", "data": [] });
        let (status, _) = post_raw(&app(&dir), &payload.to_string()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(!dir.path().join("secrets.json").exists());
    }

    #[tokio::test]
    async fn unknown_path_serves_entry_document() {
        let dir = TempDir::new().unwrap();
        let request = Request::builder()
            .uri("/requests/42")
            .body(Body::empty())
            .unwrap();
        let response = app(&dir).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"<html>entry</html>");
    }
}
