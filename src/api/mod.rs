//! Fedsearch HTTP API
//!
//! Serves the peer protocol on top of any registered backend, so a
//! fedsearch server can itself be a peer of another one.
//!
//! # Endpoints
//!
//! ## Search
//! - `GET /search` - Stream records, errors and statistics
//! - `GET /count` - Statistics only
//! - `GET /search/show` - Show previously found records
//! - `GET /pcap/search` - Packet capture search
//! - `GET /pcap/count` - Packet capture statistics
//!
//! ## Files
//! - `GET /files` - Directory listing
//!
//! ## Health
//! - `GET /health/live` - Liveness probe
//! - `GET /health/ready` - Readiness probe
//! - `GET /health` - Full health status
//!
//! # Example
//!
//! ```rust,ignore
//! use fedsearch::api::{serve, AppState};
//! use fedsearch::config::ApiConfig;
//! use fedsearch::search::registry;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let backend = registry::create("fake", &Default::default())?;
//!     let config = ApiConfig::default();
//!
//!     serve(AppState::new(backend, config.clone()), &config).await?;
//!     Ok(())
//! }
//! ```

pub mod dto;
pub mod error;
pub mod params;
pub mod routes;
pub mod state;
mod stream;

pub use error::{ApiError, ApiResult};
pub use state::AppState;

use axum::{http::HeaderValue, routing::get, Router};
use std::sync::Arc;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};

use crate::config::ApiConfig;

/// Build the API router with all routes and middleware
pub fn build_router(state: AppState) -> Router {
    let search_routes = Router::new()
        .route("/search", get(routes::search::search))
        .route("/search/show", get(routes::search::show))
        .route("/count", get(routes::search::count))
        .route("/pcap/search", get(routes::search::pcap_search))
        .route("/pcap/count", get(routes::search::pcap_count))
        .route("/files", get(routes::files::list_files));

    let health_routes = Router::new()
        .route("/live", get(routes::health::liveness))
        .route("/ready", get(routes::health::readiness))
        .route("/", get(routes::health::full_health));

    let cors = cors_layer(&state.config);
    let shared_state = Arc::new(state);

    Router::new()
        .merge(search_routes)
        .nest("/health", health_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(shared_state)
}

fn cors_layer(config: &ApiConfig) -> CorsLayer {
    if config.cors_origins.is_empty() {
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = config
        .cors_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(v) => Some(v),
            Err(_) => {
                tracing::warn!(origin = %origin, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(Any)
        .allow_headers(Any)
}

/// Start the API server
pub async fn serve(state: AppState, config: &ApiConfig) -> Result<(), ApiError> {
    let backend = state.backend.to_string();
    let router = build_router(state);

    let addr = config.addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!(backend = %backend, "Fedsearch API listening on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| ApiError::Internal(format!("Server error: {}", e)))?;

    tracing::info!("Fedsearch API shut down gracefully");
    Ok(())
}

/// Wait for shutdown signal
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{StreamDecoder, Tag, TextStreamDecoder, MIME_MSGPACK};
    use crate::fake::FakeBackend;
    use crate::peer::{PeerBackend, PeerOptions};
    use crate::search::{Backend, DirInfo, Record, SearchConfig, Stat};
    use axum::{
        body::Body,
        http::{header, Request, StatusCode},
        response::Response,
    };
    use serde_json::{json, Value};
    use tower::util::ServiceExt;

    fn create_test_app(fake: FakeBackend) -> Router {
        build_router(AppState::new(Arc::new(fake), ApiConfig::default()))
    }

    async fn get_uri(app: Router, uri: &str, accept: Option<&str>) -> Response {
        let mut request = Request::builder().uri(uri);
        if let Some(accept) = accept {
            request = request.header(header::ACCEPT, accept);
        }
        app.oneshot(request.body(Body::empty()).unwrap()).await.unwrap()
    }

    async fn body_bytes(response: Response) -> Vec<u8> {
        axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap()
            .to_vec()
    }

    #[tokio::test]
    async fn test_health_endpoints() {
        let app = create_test_app(FakeBackend::new(1, 0));
        for uri in ["/health/live", "/health/ready", "/health"] {
            let response = get_uri(app.clone(), uri, None).await;
            assert_eq!(response.status(), StatusCode::OK, "{}", uri);
        }

        let response = get_uri(app, "/health", None).await;
        let health: Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
        assert_eq!(health["status"], "healthy");
        assert_eq!(health["backend"], "fake{records:1, errors:0}");
    }

    #[tokio::test]
    async fn test_readiness_fails_with_backend() {
        let app = create_test_app(FakeBackend::new(0, 0).files_error("offline"));
        let response = get_uri(app, "/health/ready", None).await;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_search_text_stream() {
        let app = create_test_app(FakeBackend::new(20, 2));
        let response = get_uri(app, "/search?query=q&file=a.txt&stream=true", None).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/json");

        let body = body_bytes(response).await;
        let mut dec = TextStreamDecoder::new(body.as_slice());
        let (mut records, mut errors, mut stat) = (Vec::new(), Vec::new(), None);
        loop {
            match dec.next_tag().unwrap() {
                Tag::Rec => records.push(dec.next::<Record>().unwrap()),
                Tag::Err => errors.push(dec.next::<String>().unwrap()),
                Tag::Stat => stat = Some(dec.next::<Stat>().unwrap()),
                Tag::Eof => break,
            }
        }

        assert_eq!(records.len(), 20);
        assert_eq!(errors.len(), 2);
        assert_eq!(records[0].index.file, "a.txt");
        assert_eq!(stat.unwrap().matches, 20);
    }

    #[tokio::test]
    async fn test_search_simple_and_spark() {
        let app = create_test_app(FakeBackend::new(3, 1));

        let response = get_uri(app.clone(), "/search?query=q", None).await;
        let doc: Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
        assert_eq!(doc["results"].as_array().unwrap().len(), 3);
        assert_eq!(doc["errors"].as_array().unwrap().len(), 1);
        assert_eq!(doc["stats"]["matches"], 3);

        let response = get_uri(app.clone(), "/search?query=q&stats=false", None).await;
        let doc: Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
        assert!(doc.get("stats").is_none());

        let response = get_uri(app, "/search?query=q&spark=true", None).await;
        let doc: Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
        assert_eq!(doc.as_array().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_count_has_no_records() {
        let app = create_test_app(FakeBackend::new(5, 0));
        let response = get_uri(app, "/count?query=q&files=a.txt", None).await;
        let doc: Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
        assert_eq!(doc, json!({"results": [], "stats": doc["stats"].clone()}));
        assert_eq!(doc["stats"]["matches"], 5);
    }

    #[tokio::test]
    async fn test_msgpack_negotiation() {
        let app = create_test_app(FakeBackend::new(0, 0));
        let response = get_uri(app, "/search?query=q&stream=true&stats=false", Some("application/x-msgpack")).await;
        assert_eq!(response.headers()[header::CONTENT_TYPE], MIME_MSGPACK);
        assert_eq!(body_bytes(response).await, vec![0x00]);
    }

    #[tokio::test]
    async fn test_request_errors() {
        let app = create_test_app(FakeBackend::new(1, 0));
        let response = get_uri(app.clone(), "/search?query=q&limit=ten", None).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body: error::ErrorResponse = serde_json::from_slice(&body_bytes(response).await).unwrap();
        assert_eq!(body.error.code, "VALIDATION_ERROR");
        assert!(!body.request_id.is_empty());

        let response = get_uri(app, "/search?file=a.txt", None).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let app = create_test_app(FakeBackend::new(1, 0).start_error("busy"));
        let response = get_uri(app, "/search?query=q", None).await;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_search_outside_home() {
        let mut config = ApiConfig::default();
        config.home = Some("/data/home".into());
        let app = build_router(AppState::new(Arc::new(FakeBackend::new(3, 0)), config));

        let response = get_uri(app.clone(), "/search?query=q&file=/logs/a.txt&file=b.txt", None).await;
        assert_eq!(response.status(), StatusCode::OK);

        let response = get_uri(app, "/search?query=q&file=../../etc/passwd", None).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body: error::ErrorResponse = serde_json::from_slice(&body_bytes(response).await).unwrap();
        assert_eq!(body.error.code, "INVALID_REQUEST");
        assert!(body.error.message.contains("not relative to home"));
    }

    #[tokio::test]
    async fn test_files() {
        let app = create_test_app(FakeBackend::new(0, 0).listing(["1.txt"], ["logs"]));
        let response = get_uri(app, "/files?dir=/data/./x&hidden=true", None).await;
        assert_eq!(response.status(), StatusCode::OK);

        let info: DirInfo = serde_json::from_slice(&body_bytes(response).await).unwrap();
        assert_eq!(info.dir_path, "/data/x");
        assert!(info.files.contains("1.txt"));
        assert!(info.dirs.contains("logs"));
    }

    // a peer backend talking to this server over a real socket
    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_peer_round_trip() {
        let fake = FakeBackend::new(2000, 20).host("node-1").listing(["a.txt"], Vec::<String>::new());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, create_test_app(fake)).await.unwrap();
        });

        for format in ["msgpack", "json"] {
            let opts = json!({"server-url": format!("http://{}", addr), "format": format});
            let peer = PeerBackend::new(PeerOptions::from_options(opts.as_object().unwrap()).unwrap()).unwrap();

            let mut res = peer.search(&SearchConfig::new("q", ["a.txt"])).unwrap();
            let (records, errors) = res.drain().await;
            assert_eq!(records.len(), 2000, "{}", format);
            assert_eq!(errors.len(), 20);
            assert_eq!(records[1].data, b"node-1:record-1");
            assert_eq!(res.stat().unwrap().host.as_deref(), Some("node-1"));

            let mut res = peer.count(&SearchConfig::new("q", ["a.txt"])).unwrap();
            let (records, _) = res.drain().await;
            assert!(records.is_empty());
            assert_eq!(res.stat().unwrap().matches, 2000);

            let info = peer.files("/", false).await.unwrap();
            assert!(info.files.contains("a.txt"));
        }
    }
}
