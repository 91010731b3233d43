use axum::{routing::get, Router};
use pipesock_core::PipesockConfig;
use pipesock_hub::Hub;
use std::path::PathBuf;
use std::sync::Arc;

/// Central shared state — passed as Arc<AppState> to all Axum handlers.
pub struct AppState {
    pub config: PipesockConfig,
    pub hub: Hub,
    /// Resolved viewer directory served at `/`.
    pub view_dir: PathBuf,
}

impl AppState {
    pub fn new(config: PipesockConfig, hub: Hub, view_dir: PathBuf) -> Self {
        Self {
            config,
            hub,
            view_dir,
        }
    }
}

/// Assemble the full Axum router.
pub fn build_router(state: Arc<AppState>) -> Router {
    let view = crate::http::view::service(&state.view_dir);
    Router::new()
        .route("/health", get(crate::http::health::health_handler))
        .route("/ws", get(crate::ws::session::ws_handler))
        .fallback_service(view)
        .with_state(state)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use pipesock_hub::HubConfig;
    use tower::ServiceExt;

    fn app(view_dir: PathBuf) -> Router {
        let config = PipesockConfig::default();
        let hub = Hub::spawn(HubConfig::from(&config.hub));
        build_router(Arc::new(AppState::new(config, hub, view_dir)))
    }

    async fn fetch(router: Router, uri: &str) -> (StatusCode, String) {
        let response = router
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn health_reports_hub_counters() {
        let dir = tempfile::tempdir().unwrap();
        let (status, body) = fetch(app(dir.path().to_path_buf()), "/health").await;
        assert_eq!(status, StatusCode::OK);

        let value: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(value["status"], "ok");
        assert_eq!(value["subscribers"], 0);
        assert_eq!(value["history"], 0);
        assert_eq!(value["version"], env!("CARGO_PKG_VERSION"));
    }

    #[tokio::test]
    async fn root_serves_view_index() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("index.html"), "<h1>pipesock</h1>").unwrap();
        std::fs::write(dir.path().join("app.js"), "connect();").unwrap();

        let (status, body) = fetch(app(dir.path().to_path_buf()), "/").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "<h1>pipesock</h1>");

        let (status, body) = fetch(app(dir.path().to_path_buf()), "/app.js").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "connect();");
    }

    #[tokio::test]
    async fn missing_view_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let (status, _) = fetch(app(dir.path().to_path_buf()), "/nope.css").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
