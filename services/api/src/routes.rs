use crate::infra::AppState;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Extension, Json};
use realty_crm::workflows::pipeline::{
    pipeline_router, LeadPipelineService, LeadRepository, PipelineNotifier,
};
use serde_json::json;
use std::sync::atomic::Ordering;
use std::sync::Arc;

/// Pipeline API plus the probes the load balancer and Prometheus scrape.
pub(crate) fn with_pipeline_routes<R, N>(service: Arc<LeadPipelineService<R, N>>) -> axum::Router
where
    R: LeadRepository + 'static,
    N: PipelineNotifier + 'static,
{
    pipeline_router(service)
        .route("/health", get(healthcheck))
        .route("/ready", get(readiness))
        .route("/metrics", get(metrics))
}

async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

// Not ready until the listener is bound; reports the board layout it will serve.
async fn readiness(Extension(state): Extension<AppState>) -> impl IntoResponse {
    if !state.readiness.load(Ordering::Acquire) {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "status": "starting" })),
        );
    }

    (
        StatusCode::OK,
        Json(json!({ "status": "ready", "stages": state.stage_count })),
    )
}

async fn metrics(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}
