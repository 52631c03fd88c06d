// SPDX-FileCopyrightText: 2026 Pactbridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Gateway HTTP server built on axum.
//!
//! Sets up routes, middleware, and shared state for the gateway.

use std::sync::Arc;
use std::time::Instant;

use axum::extract::DefaultBodyLimit;
use axum::routing::get;
use axum::Router;
use pactbridge_config::model::GatewayConfig;
use pactbridge_core::RelayError;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::ingest::WebhookIngestor;

/// Shared state for axum request handlers.
#[derive(Clone)]
pub struct GatewayState {
    pub ingestor: Arc<WebhookIngestor>,
    /// Process start time for uptime calculation.
    pub start_time: Instant,
}

impl GatewayState {
    pub fn new(ingestor: WebhookIngestor) -> Self {
        Self {
            ingestor: Arc::new(ingestor),
            start_time: Instant::now(),
        }
    }
}

/// Builds the router:
/// - GET /health
/// - anything else: the webhook endpoint, bodies capped at `max_body_bytes`
pub fn build_router(state: GatewayState, max_body_bytes: usize) -> Router {
    Router::new()
        .route(
            "/health",
            get(handlers::get_health).fallback(handlers::post_webhook),
        )
        .fallback(handlers::post_webhook)
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Binds the configured host:port.
pub async fn bind(config: &GatewayConfig) -> Result<TcpListener, RelayError> {
    let addr = format!("{}:{}", config.host, config.port);
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| RelayError::Internal(format!("failed to bind gateway to {addr}: {e}")))?;

    tracing::info!(%addr, "gateway listening");
    Ok(listener)
}

/// Serves `app` on an already bound listener.
///
/// In-flight requests complete after cancellation; new connections are refused.
pub async fn serve(
    listener: TcpListener,
    app: Router,
    cancel: CancellationToken,
) -> Result<(), RelayError> {
    axum::serve(listener, app)
        .with_graceful_shutdown(cancel.cancelled_owned())
        .await
        .map_err(|e| RelayError::Internal(format!("gateway server error: {e}")))?;

    tracing::info!("gateway stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use axum::body::{Body, to_bytes};
    use axum::http::{Method, Request, StatusCode, header};
    use pactbridge_test_utils::MemoryBroker;
    use serde_json::Value;
    use tower::ServiceExt;

    use super::*;

    const RECEIVE: &str = "pact_receive_callback";

    fn app(broker: &MemoryBroker, max_body_bytes: usize) -> Router {
        let ingestor = WebhookIngestor::new(Arc::new(broker.clone()), RECEIVE);
        build_router(GatewayState::new(ingestor), max_body_bytes)
    }

    fn request(method: Method, uri: &str, body: impl Into<Body>) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .body(body.into())
            .unwrap()
    }

    #[tokio::test]
    async fn webhook_is_published_and_echoed() {
        let broker = MemoryBroker::new();
        let response = app(&broker, 1024)
            .oneshot(request(
                Method::POST,
                "/",
                r#"{"type":"message","event":"created","data":{"id":5}}"#,
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "application/json"
        );
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], br#"{"type":"message","event":"created","data":{"id":5}}"#);
        assert_eq!(broker.published(RECEIVE), vec![body.to_vec()]);
    }

    #[tokio::test]
    async fn any_path_and_method_reaches_the_webhook() {
        let broker = MemoryBroker::new();
        for (method, uri) in [
            (Method::PUT, "/callbacks/pact"),
            (Method::POST, "/health"),
            (Method::PATCH, "/x?y=z"),
        ] {
            let response = app(&broker, 1024)
                .oneshot(request(method, uri, r#"{"type":"t","event":"e"}"#))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK, "{uri}");
        }
        assert_eq!(broker.published(RECEIVE).len(), 3);
    }

    #[tokio::test]
    async fn malformed_body_is_400_and_not_published() {
        let broker = MemoryBroker::new();
        let response = app(&broker, 1024)
            .oneshot(request(Method::POST, "/", "not json"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let error: Value = serde_json::from_slice(&body).unwrap();
        assert!(error["error"].is_string());
        assert!(broker.published(RECEIVE).is_empty());
    }

    #[tokio::test]
    async fn oversize_body_is_413() {
        let broker = MemoryBroker::new();
        let big = format!(
            r#"{{"type":"t","event":"e","data":{{"blob":"{}"}}}}"#,
            "x".repeat(256)
        );
        let response = app(&broker, 64)
            .oneshot(request(Method::POST, "/", big))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert!(broker.published(RECEIVE).is_empty());
    }

    #[tokio::test]
    async fn publish_failure_is_server_error() {
        let broker = MemoryBroker::new();
        broker.set_fail_publish(true);
        let response = app(&broker, 1024)
            .oneshot(request(Method::POST, "/", r#"{"type":"t","event":"e"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn health_reports_version() {
        let broker = MemoryBroker::new();
        let response = app(&broker, 1024)
            .oneshot(request(Method::GET, "/health", Body::empty()))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let health: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(health["status"], "ok");
        assert_eq!(health["version"], env!("CARGO_PKG_VERSION"));
        assert!(health["uptime_secs"].is_u64());
        assert!(broker.published(RECEIVE).is_empty());
    }

    #[tokio::test]
    async fn serve_stops_on_cancel() {
        let broker = MemoryBroker::new();
        let config = GatewayConfig {
            host: "127.0.0.1".into(),
            port: 0,
            ..GatewayConfig::default()
        };
        let listener = bind(&config).await.unwrap();
        let cancel = CancellationToken::new();
        let server = tokio::spawn(serve(listener, app(&broker, 1024), cancel.clone()));

        cancel.cancel();
        server.await.unwrap().unwrap();
    }
}
