//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the egress and ingress handlers
//! - Wire up middleware (request id, tracing, timeout, body limit)
//! - Bind server to listener and stop on the shutdown broadcast
//! - Map pipeline outcomes to responses, logs and metrics

use axum::{
    body::Body,
    extract::State,
    http::Request,
    response::{IntoResponse, Response},
    routing::post,
    Router,
};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{limit::RequestBodyLimitLayer, timeout::TimeoutLayer, trace::TraceLayer};

use crate::config::{ConfigError, ProxyConfig};
use crate::http::error::ProxyError;
use crate::http::forward::{build_client, UpstreamResponse};
use crate::http::request::{buffer_request, propagate_request_id_layer, request_id, set_request_id_layer};
use crate::observability::metrics;
use crate::pipeline::{ProxyPipeline, EGRESS_PATH, INGRESS_PATHS};
use crate::signing::unix_now;

/// Metric/log label of the egress route.
const EGRESS_ROUTE: &str = "rsf";

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<ProxyPipeline>,
    pub max_body_size: usize,
}

/// HTTP server for the signing proxy.
pub struct HttpServer {
    router: Router,
    config: ProxyConfig,
}

impl HttpServer {
    /// Create a server with the pipeline described by `config`.
    pub fn new(config: ProxyConfig) -> Result<Self, ConfigError> {
        let client = build_client(Duration::from_secs(config.timeouts.upstream_secs))
            .map_err(|e| ConfigError::Client(e.to_string()))?;
        let pipeline = Arc::new(ProxyPipeline::from_config(&config, client)?);
        Ok(Self::with_pipeline(config, pipeline))
    }

    /// Create a server around an already built pipeline.
    pub fn with_pipeline(config: ProxyConfig, pipeline: Arc<ProxyPipeline>) -> Self {
        let state = AppState {
            pipeline,
            max_body_size: config.security.max_body_size,
        };
        let router = Self::build_router(&config, state);
        Self { router, config }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &ProxyConfig, state: AppState) -> Router {
        let mut router = Router::new().route(EGRESS_PATH, post(egress_handler));
        for path in INGRESS_PATHS {
            router = router.route(path, post(ingress_handler));
        }

        router
            .fallback(fallback_handler)
            .with_state(state)
            .layer(RequestBodyLimitLayer::new(config.security.max_body_size))
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(propagate_request_id_layer())
            .layer(TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                tracing::info_span!(
                    "request",
                    method = %request.method(),
                    path = %request.uri().path(),
                    request_id = %request_id(request.headers()),
                )
            }))
            .layer(set_request_id_layer())
    }

    /// Router with all layers, for serving in-process.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Run the server until `shutdown` fires, then drain in-flight requests.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }
}

async fn egress_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let start = Instant::now();
    let result = match buffer_request(request, state.max_body_size).await {
        Ok(request) => state.pipeline.egress(request, unix_now()).await,
        Err(e) => Err(e),
    };
    respond(EGRESS_ROUTE, start, result)
}

async fn ingress_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let start = Instant::now();
    let route = route_label(request.uri().path());
    let result = match buffer_request(request, state.max_body_size).await {
        Ok(request) => state.pipeline.ingress(request, unix_now()).await,
        Err(e) => Err(e),
    };
    respond(route, start, result)
}

async fn fallback_handler(request: Request<Body>) -> Response {
    let err = ProxyError::Route(format!("{} {}", request.method(), request.uri().path()));
    tracing::debug!(error = %err, "No route matched");
    err.into_response()
}

/// Static label for an ingress path.
fn route_label(path: &str) -> &'static str {
    INGRESS_PATHS
        .iter()
        .copied()
        .find(|p| *p == path)
        .map(|p| p.trim_start_matches('/'))
        .unwrap_or("ingress")
}

/// Log and count the outcome, then turn it into a response.
fn respond(route: &'static str, start: Instant, result: Result<UpstreamResponse, ProxyError>) -> Response {
    let response = match result {
        Ok(upstream) => {
            tracing::info!(route, status = upstream.status.as_u16(), "Request forwarded");
            upstream.into_response()
        }
        Err(err) => {
            match &err {
                ProxyError::Authentication(auth) => {
                    tracing::warn!(route, reason = auth.reason(), error = %auth, "Request rejected");
                    metrics::record_auth_failure(route, auth.reason());
                }
                ProxyError::Upstream(_) | ProxyError::Internal(_) => {
                    tracing::error!(route, error = %err, "Request failed");
                }
                _ => tracing::warn!(route, error = %err, "Request failed"),
            }
            err.into_response()
        }
    };

    metrics::record_request(route, response.status().as_u16(), start);
    response
}
