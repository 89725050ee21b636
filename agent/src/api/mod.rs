pub mod auth;
pub mod info;

use axum::{http::StatusCode, middleware, routing::get, Json, Router};
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::config::AgentConfig;
use crate::types::HealthResponse;

pub struct AppState {
    pub username: String,
    pub password: String,
    pub persistent_disk_path: PathBuf,
    pub ephemeral_disk_path: PathBuf,
}

impl AppState {
    pub fn from_config(config: &AgentConfig) -> Self {
        Self {
            username: config.username.clone(),
            password: config.password.clone(),
            persistent_disk_path: config.persistent_disk_path(),
            ephemeral_disk_path: config.ephemeral_disk_path(),
        }
    }
}

pub fn create_router(state: Arc<AppState>) -> Router {
    let protected = Router::new()
        .route("/api/v1/info", get(info::disk_info))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_basic_auth,
        ));

    Router::new()
        // Health check
        .route("/health", get(health))
        .merge(protected)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// GET /health - Health check endpoint
async fn health() -> (StatusCode, Json<HealthResponse>) {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "ok".to_string(),
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request};
    use base64::Engine;
    use tower::ServiceExt;

    use crate::types::{ErrorResponse, InfoResponse};

    fn state(persistent: PathBuf, ephemeral: PathBuf) -> Arc<AppState> {
        Arc::new(AppState {
            username: "diag".to_string(),
            password: "secret".to_string(),
            persistent_disk_path: persistent,
            ephemeral_disk_path: ephemeral,
        })
    }

    fn basic(user: &str, pass: &str) -> String {
        let encoded = base64::engine::general_purpose::STANDARD.encode(format!("{}:{}", user, pass));
        format!("Basic {}", encoded)
    }

    fn get_info(authorization: Option<String>) -> Request<Body> {
        let mut req = Request::builder().uri("/api/v1/info");
        if let Some(value) = authorization {
            req = req.header(header::AUTHORIZATION, value);
        }
        req.body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_health_needs_no_auth() {
        let dir = tempfile::tempdir().unwrap();
        let app = create_router(state(dir.path().into(), dir.path().into()));

        let resp = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_info_requires_credentials() {
        let dir = tempfile::tempdir().unwrap();
        let app = create_router(state(dir.path().into(), dir.path().into()));

        let resp = app.clone().oneshot(get_info(None)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        assert!(resp.headers().contains_key(header::WWW_AUTHENTICATE));

        let resp = app
            .oneshot(get_info(Some(basic("diag", "wrong"))))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_info_reports_both_disks() {
        let persistent = tempfile::tempdir().unwrap();
        let ephemeral = tempfile::tempdir().unwrap();
        let app = create_router(state(persistent.path().into(), ephemeral.path().into()));

        let resp = app
            .oneshot(get_info(Some(basic("diag", "secret"))))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let body = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let info: InfoResponse = serde_json::from_slice(&body).unwrap();
        assert!(info.persistent.bytes_total > 0);
        assert!(info.ephemeral.bytes_total > 0);
    }

    #[tokio::test]
    async fn test_failed_stat_is_a_server_error() {
        let dir = tempfile::tempdir().unwrap();
        let app = create_router(state(dir.path().join("gone"), dir.path().into()));

        let resp = app
            .oneshot(get_info(Some(basic("diag", "secret"))))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let err: ErrorResponse = serde_json::from_slice(&body).unwrap();
        assert!(err.error.contains("gone"), "{}", err.error);
    }
}
