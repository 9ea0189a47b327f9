use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Router,
};
use serde::Deserialize;
use serde_json::json;

use super::domain::{LeadId, LeadSubmission, LeadUpdate, StageReassignment};
use super::mutation::{MutationError, StageMutationService};
use super::repository::{LeadRepository, PipelineNotifier};
use super::service::{LeadPipelineService, PipelineError};
use super::stages::StageId;

/// Router builder exposing the lead pipeline over HTTP.
///
/// Every stage change request is its own client: it gets a fresh [`StageMutationService`], so
/// moves from different brokers never wait on each other's in-flight slot.
pub fn pipeline_router<R, N>(service: Arc<LeadPipelineService<R, N>>) -> Router
where
    R: LeadRepository + 'static,
    N: PipelineNotifier + 'static,
{
    Router::new()
        .route("/api/v1/pipeline/stages", get(board_handler::<R, N>))
        .route("/api/v1/pipeline/leads", post(create_handler::<R, N>))
        .route(
            "/api/v1/pipeline/leads/reassign",
            post(reassign_handler::<R, N>),
        )
        .route(
            "/api/v1/pipeline/leads/:lead_id",
            get(lead_handler::<R, N>).patch(update_handler::<R, N>),
        )
        .route(
            "/api/v1/pipeline/leads/:lead_id/stage",
            put(stage_handler::<R, N>),
        )
        .with_state(service)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct StageChangeRequest {
    pub(crate) new_stage_id: StageId,
}

pub(crate) async fn board_handler<R, N>(
    State(service): State<Arc<LeadPipelineService<R, N>>>,
) -> Response
where
    R: LeadRepository + 'static,
    N: PipelineNotifier + 'static,
{
    match service.grouped_view() {
        Ok(view) => (StatusCode::OK, axum::Json(view.as_ref())).into_response(),
        Err(err) => pipeline_error_response(err),
    }
}

pub(crate) async fn create_handler<R, N>(
    State(service): State<Arc<LeadPipelineService<R, N>>>,
    axum::Json(submission): axum::Json<LeadSubmission>,
) -> Response
where
    R: LeadRepository + 'static,
    N: PipelineNotifier + 'static,
{
    match service.create_lead(submission) {
        Ok(lead) => (StatusCode::CREATED, axum::Json(lead)).into_response(),
        Err(err) => pipeline_error_response(err),
    }
}

pub(crate) async fn lead_handler<R, N>(
    State(service): State<Arc<LeadPipelineService<R, N>>>,
    Path(lead_id): Path<i64>,
) -> Response
where
    R: LeadRepository + 'static,
    N: PipelineNotifier + 'static,
{
    match service.get_lead(LeadId(lead_id)) {
        Ok(lead) => (StatusCode::OK, axum::Json(lead)).into_response(),
        Err(err) => pipeline_error_response(err),
    }
}

pub(crate) async fn update_handler<R, N>(
    State(service): State<Arc<LeadPipelineService<R, N>>>,
    Path(lead_id): Path<i64>,
    axum::Json(update): axum::Json<LeadUpdate>,
) -> Response
where
    R: LeadRepository + 'static,
    N: PipelineNotifier + 'static,
{
    match service.update_lead(LeadId(lead_id), update) {
        Ok(lead) => (StatusCode::OK, axum::Json(lead)).into_response(),
        Err(err) => pipeline_error_response(err),
    }
}

pub(crate) async fn stage_handler<R, N>(
    State(service): State<Arc<LeadPipelineService<R, N>>>,
    Path(lead_id): Path<i64>,
    axum::Json(request): axum::Json<StageChangeRequest>,
) -> Response
where
    R: LeadRepository + 'static,
    N: PipelineNotifier + 'static,
{
    match client_session(&service).move_lead(LeadId(lead_id), request.new_stage_id) {
        Ok(lead) => (StatusCode::OK, axum::Json(lead)).into_response(),
        Err(err) => mutation_error_response(err),
    }
}

pub(crate) async fn reassign_handler<R, N>(
    State(service): State<Arc<LeadPipelineService<R, N>>>,
    axum::Json(request): axum::Json<StageReassignment>,
) -> Response
where
    R: LeadRepository + 'static,
    N: PipelineNotifier + 'static,
{
    match client_session(&service).move_lead(request.lead_id, request.new_stage_id) {
        Ok(lead) => (StatusCode::OK, axum::Json(lead)).into_response(),
        Err(err) => mutation_error_response(err),
    }
}

fn client_session<R, N>(service: &Arc<LeadPipelineService<R, N>>) -> StageMutationService<R, N>
where
    R: LeadRepository + 'static,
    N: PipelineNotifier + 'static,
{
    StageMutationService::new(Arc::clone(service))
}

fn pipeline_error_response(err: PipelineError) -> Response {
    let status = match &err {
        PipelineError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        PipelineError::LeadNotFound(_) | PipelineError::StageNotFound(_) => StatusCode::NOT_FOUND,
        PipelineError::Conflict(_) => StatusCode::CONFLICT,
        PipelineError::Transient(_) => StatusCode::SERVICE_UNAVAILABLE,
    };

    let payload = json!({
        "error": err.to_string(),
        "field": err.field(),
        "retryable": err.is_retryable(),
    });
    (status, axum::Json(payload)).into_response()
}

fn mutation_error_response(err: MutationError) -> Response {
    match err {
        MutationError::Pipeline(err) => pipeline_error_response(err),
        other => {
            let payload = json!({
                "error": other.to_string(),
                "retryable": true,
            });
            (StatusCode::CONFLICT, axum::Json(payload)).into_response()
        }
    }
}
