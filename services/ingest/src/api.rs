//! HTTP surface of the ingest service.

use crate::config::ApiConfig;
use crate::producer::{Producer, SubmitError, SubmitRequest, SubmitResponse};
use anyhow::{Context, Result};
use axum::{
    extract::{rejection::JsonRejection, MatchedPath, Request, State},
    http::{header, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub producer: Arc<Producer>,
    /// Prometheus handle; `None` when no recorder is installed
    pub metrics: Option<PrometheusHandle>,
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub detail: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub missing_fields: Vec<&'static str>,
}

impl ErrorResponse {
    fn new(detail: impl Into<String>) -> Self {
        Self {
            detail: detail.into(),
            missing_fields: Vec::new(),
        }
    }
}

impl IntoResponse for SubmitError {
    fn into_response(self) -> Response {
        match self {
            SubmitError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                Json(ErrorResponse::new(self.to_string())),
            )
                .into_response(),
            SubmitError::BadRequest(ref fields) => {
                let body = ErrorResponse {
                    detail: self.to_string(),
                    missing_fields: fields.clone(),
                };
                (StatusCode::BAD_REQUEST, Json(body)).into_response()
            }
            SubmitError::UpstreamUnavailable(_) => (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ErrorResponse::new("Failed to process email data")),
            )
                .into_response(),
        }
    }
}

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(metrics_handler))
        .route("/api/email", post(receive_email))
        .route_layer(middleware::from_fn(track_metrics))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint
async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "api-service",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Prometheus scrape endpoint
async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    let body = state
        .metrics
        .as_ref()
        .map(PrometheusHandle::render)
        .unwrap_or_default();

    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        body,
    )
}

/// Receive an email, validate it, and publish it to the queue
async fn receive_email(
    State(state): State<AppState>,
    payload: Result<Json<SubmitRequest>, JsonRejection>,
) -> Result<Json<SubmitResponse>, Response> {
    let Json(request) = payload.map_err(|rejection| {
        metrics::counter!("api_validation_errors_total", "error_type" => "malformed_request")
            .increment(1);
        warn!(error = %rejection.body_text(), "Malformed request body");
        (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(serde_json::json!({
                "detail": "Validation error",
                "errors": [rejection.body_text()],
            })),
        )
            .into_response()
    })?;

    let response = state
        .producer
        .submit(request)
        .await
        .map_err(IntoResponse::into_response)?;

    info!(subject = %response.email_subject, "Email data processed successfully");
    Ok(Json(response))
}

/// Record request count and latency per matched route
async fn track_metrics(req: Request, next: Next) -> impl IntoResponse {
    let start = Instant::now();
    let endpoint = req
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_owned())
        .unwrap_or_else(|| req.uri().path().to_owned());
    let method = req.method().to_string();

    let response = next.run(req).await;

    let status = response.status().as_u16().to_string();
    metrics::counter!(
        "api_requests_total",
        "method" => method.clone(),
        "endpoint" => endpoint.clone(),
        "status" => status
    )
    .increment(1);
    metrics::histogram!(
        "api_request_duration_seconds",
        "method" => method,
        "endpoint" => endpoint
    )
    .record(start.elapsed().as_secs_f64());

    response
}

/// Serve the API until `shutdown` resolves
pub async fn start_api_server(
    state: AppState,
    config: &ApiConfig,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<()> {
    let router = create_router(state);
    let addr = format!("{}:{}", config.host, config.port);

    info!(address = %addr, "Starting ingest API server");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await
        .context("API server error")?;

    Ok(())
}
