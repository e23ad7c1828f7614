//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with all handlers
//! - Wire up middleware (tracing, timeouts, request ID, CORS on the stream)
//! - Bind server to listener
//! - Close live subscribers before graceful shutdown drains connections

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    http::{header, HeaderValue},
    routing::{any, get},
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    set_header::SetResponseHeaderLayer,
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::broadcast::BroadcastHub;
use crate::capture::IngestionPipeline;
use crate::config::BinConfig;
use crate::http::handlers::{capture_request, clear_requests, get_request, health, list_requests};
use crate::http::request::{MakeRequestUuidV4, X_REQUEST_ID};
use crate::http::stream::event_stream;
use crate::store::RequestStore;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: IngestionPipeline,
    pub config: Arc<BinConfig>,
}

/// HTTP server for the request bin.
pub struct HttpServer {
    router: Router,
    state: AppState,
}

impl HttpServer {
    /// Create a new HTTP server backed by `store`.
    ///
    /// The broadcast hub is created here and lives as long as the server.
    pub fn new(config: BinConfig, store: Arc<dyn RequestStore>) -> Self {
        let hub = Arc::new(BroadcastHub::new());
        let pipeline = IngestionPipeline::new(
            store,
            hub,
            Duration::from_millis(config.store.timeout_ms),
        );
        let state = AppState {
            pipeline,
            config: Arc::new(config),
        };

        let router = Self::build_router(state.clone());
        Self { router, state }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(state: AppState) -> Router {
        let request_timeout = Duration::from_secs(state.config.timeouts.request_secs);

        let events = get(event_stream)
            .layer::<_, Infallible>(SetResponseHeaderLayer::if_not_present(
                header::ACCESS_CONTROL_ALLOW_ORIGIN,
                HeaderValue::from_static("*"),
            ))
            .layer::<_, Infallible>(SetResponseHeaderLayer::if_not_present(
                header::ACCESS_CONTROL_ALLOW_HEADERS,
                HeaderValue::from_static("Cache-Control"),
            ));

        let api = Router::new()
            .route("/api/requests", get(list_requests).delete(clear_requests))
            .route("/api/requests/{id}", get(get_request))
            .route("/api/events", events)
            .route("/health", get(health))
            .layer(PropagateRequestIdLayer::new(X_REQUEST_ID))
            .layer(SetRequestIdLayer::new(X_REQUEST_ID, MakeRequestUuidV4));

        let capture = Router::new()
            .route("/api/echo", any(capture_request))
            .route("/api/echo/{*path}", any(capture_request));

        Router::new()
            .merge(api)
            .merge(capture)
            .with_state(state)
            .layer(TimeoutLayer::new(request_timeout))
            .layer(TraceLayer::new_for_http())
    }

    /// The fully layered router, for in-process use.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn hub(&self) -> Arc<BroadcastHub> {
        Arc::clone(self.state.pipeline.hub())
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Run the server until `shutdown` fires.
    ///
    /// Live subscribers are closed first, otherwise their open streams
    /// would hold graceful shutdown forever.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let hub = self.hub();
        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received, closing live subscribers");
                hub.close_all();
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}
