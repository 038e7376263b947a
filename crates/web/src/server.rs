//! Web server implementation

use axum::{
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use netkeeper_common::{ConnectRequest, Error, StatusSnapshot, SubmitResult, WifiNetwork};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

/// Seam to the supervisor. The web layer only reads the snapshot and
/// enqueues manual requests; it never touches the network controller.
pub trait Control: Send + Sync + 'static {
    fn status(&self) -> StatusSnapshot;
    fn submit(&self, request: ConnectRequest) -> netkeeper_common::Result<()>;
}

#[derive(Serialize)]
struct SubmitResponse {
    result: SubmitResult,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

/// Build the router.
pub fn router(control: Arc<dyn Control>) -> Router {
    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any);

    Router::new()
        .route("/", get(index))
        .route("/api/status", get(status))
        .route("/api/networks", get(networks))
        .route("/api/connect", post(connect))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(control)
}

/// Serve until the shutdown token fires.
pub async fn serve(
    listen: String,
    control: Arc<dyn Control>,
    shutdown: CancellationToken,
) -> anyhow::Result<()> {
    let addr: SocketAddr = listen.parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Web UI listening on http://{addr}");

    axum::serve(listener, router(control))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;

    info!("Web server stopped");
    Ok(())
}

async fn index() -> Html<&'static str> {
    Html(include_str!("../assets/index.html"))
}

async fn status(State(control): State<Arc<dyn Control>>) -> Json<StatusSnapshot> {
    Json(control.status())
}

async fn networks(State(control): State<Arc<dyn Control>>) -> Json<Vec<WifiNetwork>> {
    Json(control.status().networks)
}

async fn connect(
    State(control): State<Arc<dyn Control>>,
    Json(request): Json<ConnectRequest>,
) -> Response {
    match control.submit(request) {
        Ok(()) => (
            StatusCode::ACCEPTED,
            Json(SubmitResponse {
                result: SubmitResult::Accepted,
            }),
        )
            .into_response(),
        Err(Error::Busy) => (
            StatusCode::CONFLICT,
            Json(SubmitResponse {
                result: SubmitResult::Busy,
            }),
        )
            .into_response(),
        Err(e @ Error::Validation(_)) => (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: e.to_string(),
            }),
        )
            .into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse {
                error: e.to_string(),
            }),
        )
            .into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use netkeeper_common::ConnectionPhase;
    use tower::ServiceExt;

    struct StubControl {
        busy: bool,
    }

    impl Control for StubControl {
        fn status(&self) -> StatusSnapshot {
            StatusSnapshot {
                connected: false,
                phase: ConnectionPhase::ApActive,
                ap_mode: true,
                networks: vec![WifiNetwork {
                    ssid: "home".into(),
                    signal: 72,
                    security: "WPA2".into(),
                }],
                ..Default::default()
            }
        }

        fn submit(&self, request: ConnectRequest) -> netkeeper_common::Result<()> {
            request.validate()?;
            if self.busy {
                Err(Error::Busy)
            } else {
                Ok(())
            }
        }
    }

    fn app(busy: bool) -> Router {
        router(Arc::new(StubControl { busy }))
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_status_returns_whole_snapshot() {
        let response = app(false)
            .oneshot(
                Request::builder()
                    .uri("/api/status")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["phase"], "ap_active");
        assert_eq!(json["ap_mode"], true);
        assert_eq!(json["connected"], false);
    }

    #[tokio::test]
    async fn test_networks_serves_cached_scan() {
        let response = app(false)
            .oneshot(
                Request::builder()
                    .uri("/api/networks")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json[0]["ssid"], "home");
        assert_eq!(json[0]["signal"], 72);
    }

    #[tokio::test]
    async fn test_connect_accepted() {
        let response = app(false)
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/connect")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"ssid":"home","password":"12345678"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);
        let json = body_json(response).await;
        assert_eq!(json["result"], "accepted");
    }

    #[tokio::test]
    async fn test_connect_busy() {
        let response = app(true)
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/connect")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"ssid":"home","password":"12345678"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);
        let json = body_json(response).await;
        assert_eq!(json["result"], "busy");
    }

    #[tokio::test]
    async fn test_connect_rejects_short_password() {
        let response = app(false)
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/connect")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"ssid":"home","password":"short"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
