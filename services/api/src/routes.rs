use crate::infra::AppState;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::{Extension, Json, Router};
use serde_json::json;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use listing_portal::http::portal_router;
use listing_portal::portal::Portal;
use listing_portal::store::PortalStore;

pub(crate) fn with_service_routes<S>(portal: Arc<Portal<S>>) -> Router
where
    S: PortalStore + 'static,
{
    let readiness = Router::new()
        .route("/ready", axum::routing::get(readiness_endpoint::<S>))
        .with_state(portal.clone());

    portal_router(portal)
        .route("/health", axum::routing::get(healthcheck))
        .route("/metrics", axum::routing::get(metrics_endpoint))
        .merge(readiness)
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

/// Ready once startup finished and the store answers its health check.
pub(crate) async fn readiness_endpoint<S>(
    State(portal): State<Arc<Portal<S>>>,
    Extension(state): Extension<AppState>,
) -> impl IntoResponse
where
    S: PortalStore + 'static,
{
    if !state.readiness.load(Ordering::Relaxed) {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "status": "initializing", "store": state.backend })),
        );
    }

    match portal.health_check().await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({ "status": "ready", "store": state.backend })),
        ),
        Err(err) => {
            tracing::warn!(error = %err, store = state.backend, "store health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "status": "degraded", "store": state.backend })),
            )
        }
    }
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use chrono::Duration;
    use listing_portal::auth::{CredentialVerifier, PasswordHasher};
    use listing_portal::store::InMemoryStore;
    use metrics_exporter_prometheus::PrometheusBuilder;
    use std::sync::atomic::AtomicBool;
    use tower::ServiceExt;

    fn app(ready: bool) -> Router {
        app_with_store(Arc::new(InMemoryStore::new()), ready)
    }

    fn app_with_store(store: Arc<InMemoryStore>, ready: bool) -> Router {
        let portal = Arc::new(Portal::new(
            store,
            CredentialVerifier::new("routes-tests", Duration::hours(1)),
            PasswordHasher::new(4),
        ));
        let state = AppState {
            readiness: Arc::new(AtomicBool::new(ready)),
            metrics: Arc::new(PrometheusBuilder::new().build_recorder().handle()),
            backend: "memory",
        };
        with_service_routes(portal).layer(Extension(state))
    }

    async fn get(router: Router, uri: &str) -> (StatusCode, Vec<u8>) {
        let response = router
            .oneshot(Request::get(uri).body(Body::empty()).expect("request builds"))
            .await
            .expect("route executes");
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
            .await
            .expect("read body");
        (status, body.to_vec())
    }

    #[tokio::test]
    async fn health_is_always_ok() {
        let (status, body) = get(app(false), "/health").await;
        assert_eq!(status, StatusCode::OK);
        let payload: serde_json::Value = serde_json::from_slice(&body).expect("json body");
        assert_eq!(payload["status"], "ok");
    }

    #[tokio::test]
    async fn readiness_follows_the_flag() {
        let (status, _) = get(app(false), "/ready").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

        let (status, body) = get(app(true), "/ready").await;
        assert_eq!(status, StatusCode::OK);
        let payload: serde_json::Value = serde_json::from_slice(&body).expect("json body");
        assert_eq!(payload["store"], "memory");
    }

    #[tokio::test]
    async fn readiness_reports_store_outage() {
        let store = Arc::new(InMemoryStore::new());
        store.set_requests_available(false);

        let (status, body) = get(app_with_store(store.clone(), true), "/ready").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        let payload: serde_json::Value = serde_json::from_slice(&body).expect("json body");
        assert_eq!(payload["status"], "degraded");

        store.set_requests_available(true);
        let (status, _) = get(app_with_store(store, true), "/ready").await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn metrics_render_as_text() {
        let (status, _) = get(app(true), "/metrics").await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn portal_routes_are_mounted() {
        let (status, body) = get(app(true), "/api/properties").await;
        assert_eq!(status, StatusCode::OK);
        let payload: serde_json::Value = serde_json::from_slice(&body).expect("json body");
        assert_eq!(payload, serde_json::json!([]));
    }
}
