use axum::{
    extract::{Path, State},
    Extension, Json,
};
use serde::Serialize;
use trendcast_pipeline::{JobReport, JobStatus};

use crate::middleware::RequestId;

use super::{map_pipeline_error, ApiError, ApiResponse, AppState};

#[derive(Debug, Serialize)]
pub(super) struct SchedulerStatus {
    pub running: bool,
    pub jobs: Vec<JobStatus>,
}

async fn snapshot(state: &AppState) -> SchedulerStatus {
    SchedulerStatus {
        running: state.scheduler.is_running().await,
        jobs: state.scheduler.jobs().await,
    }
}

/// GET /api/v1/scheduler: lifecycle state and the job registry.
pub(super) async fn status(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> Json<ApiResponse<SchedulerStatus>> {
    ApiResponse::ok(&req_id, snapshot(&state).await)
}

pub(super) async fn start(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> Result<Json<ApiResponse<SchedulerStatus>>, ApiError> {
    state
        .scheduler
        .start()
        .await
        .map_err(|e| map_pipeline_error(&req_id, &e))?;
    Ok(ApiResponse::ok(&req_id, snapshot(&state).await))
}

pub(super) async fn stop(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> Result<Json<ApiResponse<SchedulerStatus>>, ApiError> {
    state
        .scheduler
        .stop()
        .await
        .map_err(|e| map_pipeline_error(&req_id, &e))?;
    Ok(ApiResponse::ok(&req_id, snapshot(&state).await))
}

/// POST /api/v1/scheduler/jobs/{job}/trigger: run a job now and wait for it.
pub(super) async fn trigger(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(job): Path<String>,
) -> Result<Json<ApiResponse<JobReport>>, ApiError> {
    let report = state
        .scheduler
        .trigger(&job)
        .await
        .map_err(|e| map_pipeline_error(&req_id, &e))?;
    Ok(ApiResponse::ok(&req_id, report))
}
