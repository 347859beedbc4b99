//! Publishing handlers: publish now, scheduling, unschedule, retry.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use trendcast_core::{Platform, Post, PublishSchedule};
use trendcast_pipeline::PublishOutcome;

use crate::middleware::RequestId;

use super::{map_pipeline_error, ApiError, ApiResponse, AppState};

#[derive(Debug, Default, Deserialize)]
pub(super) struct PublishRequest {
    /// Empty means the configured default platform.
    #[serde(default)]
    pub platforms: Vec<Platform>,
}

#[derive(Debug, Deserialize)]
pub(super) struct ScheduleRequest {
    pub platform: Platform,
    /// Falls back to the candidate's suggested posting time.
    pub at: Option<DateTime<Utc>>,
}

#[derive(Debug, Default, Deserialize)]
pub(super) struct SchedulePostRequest {
    /// Defaults to now, so the next auto-post run sends it.
    #[serde(default)]
    pub at: Option<DateTime<Utc>>,
}

/// POST /api/v1/candidates/{id}/publish: send on each platform now.
///
/// Per-platform failures are reported in the outcomes with a 200.
pub(super) async fn publish_now(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<i64>,
    Json(body): Json<PublishRequest>,
) -> Result<Json<ApiResponse<Vec<PublishOutcome>>>, ApiError> {
    let outcomes = state
        .pipeline
        .publish_now(id, &body.platforms)
        .await
        .map_err(|e| map_pipeline_error(&req_id, &e))?;
    Ok(ApiResponse::ok(&req_id, outcomes))
}

pub(super) async fn schedule(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<i64>,
    Json(body): Json<ScheduleRequest>,
) -> Result<(StatusCode, Json<ApiResponse<PublishSchedule>>), ApiError> {
    let schedule = state
        .pipeline
        .schedule(id, body.platform, body.at)
        .await
        .map_err(|e| map_pipeline_error(&req_id, &e))?;
    Ok((StatusCode::CREATED, ApiResponse::ok(&req_id, schedule)))
}

/// POST /api/v1/posts/{id}/schedule: schedule an existing draft attempt.
pub(super) async fn schedule_post(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<i64>,
    Json(body): Json<SchedulePostRequest>,
) -> Result<(StatusCode, Json<ApiResponse<PublishSchedule>>), ApiError> {
    let schedule = state
        .pipeline
        .schedule_post(id, body.at)
        .await
        .map_err(|e| map_pipeline_error(&req_id, &e))?;
    Ok((StatusCode::CREATED, ApiResponse::ok(&req_id, schedule)))
}

pub(super) async fn unschedule(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<Post>>, ApiError> {
    let post = state
        .pipeline
        .unschedule(id)
        .await
        .map_err(|e| map_pipeline_error(&req_id, &e))?;
    Ok(ApiResponse::ok(&req_id, post))
}

/// POST /api/v1/posts/{id}/retry: new draft attempt for a failed post.
pub(super) async fn retry(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<i64>,
) -> Result<(StatusCode, Json<ApiResponse<Post>>), ApiError> {
    let post = state
        .pipeline
        .retry(id)
        .await
        .map_err(|e| map_pipeline_error(&req_id, &e))?;
    Ok((StatusCode::CREATED, ApiResponse::ok(&req_id, post)))
}
